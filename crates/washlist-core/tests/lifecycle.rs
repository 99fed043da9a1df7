//! End-to-end lifecycle tests against the public API.

use std::collections::HashSet;

use proptest::prelude::*;
use washlist_core::storage::TimersConfig;
use washlist_core::{
    Controller, Event, Level, ManualClock, MemoryStore, RemovalReason, SqliteStore, TimerError,
    TimerRecord, TimerStore,
};

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(future)
}

proptest! {
    #[test]
    fn registry_sorted_after_every_add(
        adds in prop::collection::vec((3u8..=18, 1u32..=120, 0i64..600_000), 1..16)
    ) {
        block_on(async {
            let clock = ManualClock::new(0);
            let mut controller =
                Controller::new(MemoryStore::new(), clock.clone(), &TimersConfig::default());
            controller.reload_on_startup().await.unwrap();

            let mut seen = HashSet::new();
            for (level, minutes, gap) in adds {
                clock.advance(gap);
                let result = controller.add_timer(level, minutes).await;
                if seen.insert(level) {
                    let events = result.unwrap();
                    let Event::Inserted { index, .. } = &events[0] else {
                        panic!("expected insert first, got {events:?}");
                    };
                    assert_eq!(controller.registry().position(level), Some(*index));
                } else {
                    assert!(matches!(result, Err(TimerError::DuplicateKey { .. })));
                }

                let expiries: Vec<i64> = controller
                    .registry()
                    .entries()
                    .iter()
                    .map(|e| e.expires_at_ms())
                    .collect();
                assert!(expiries.windows(2).all(|w| w[0] <= w[1]));
                assert_eq!(controller.registry().len(), seen.len());
            }
        });
    }
}

#[tokio::test]
async fn restart_restores_timers_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("washlist.db");
    let clock = ManualClock::new(10_000_000);

    {
        let store = SqliteStore::open_at(&path).unwrap();
        let mut controller = Controller::new(store, clock.clone(), &TimersConfig::default());
        controller.reload_on_startup().await.unwrap();
        controller.add_timer(3, 1).await.unwrap();
        controller.add_timer(8, 3).await.unwrap();
        controller.add_timer(15, 60).await.unwrap();
    }

    // Two minutes later: level 3 is gone, level 8 is inside the window.
    clock.advance(2 * 60_000);

    let store = SqliteStore::open_at(&path).unwrap();
    let mut controller = Controller::new(store, clock.clone(), &TimersConfig::default());
    let events = controller.reload_on_startup().await.unwrap();
    assert_eq!(
        events,
        vec![
            Event::Inserted { level: 8, index: 0 },
            Event::MarkedImminent { level: 8 },
            Event::Inserted { level: 15, index: 1 },
        ]
    );

    let stored: Vec<Level> = controller
        .store()
        .list_all_sorted_by_expiry()
        .await
        .unwrap()
        .iter()
        .map(|r| r.level)
        .collect();
    assert_eq!(stored, vec![8, 15]);
    assert_eq!(controller.scheduler().pending_for(8).len(), 1);
    assert_eq!(controller.scheduler().pending_for(15).len(), 2);
}

#[tokio::test]
async fn store_and_registry_agree_after_each_operation() {
    let clock = ManualClock::new(0);
    let mut controller =
        Controller::new(MemoryStore::new(), clock.clone(), &TimersConfig::default());
    controller.reload_on_startup().await.unwrap();

    let agree = |controller: &Controller<MemoryStore, ManualClock>| {
        let mut from_registry = controller.registry().records();
        from_registry.sort_by_key(|r| r.level);
        assert_eq!(from_registry, controller.store().snapshot());
    };

    controller.add_timer(4, 30).await.unwrap();
    agree(&controller);
    controller.add_timer(6, 5).await.unwrap();
    agree(&controller);
    let _ = controller.add_timer(6, 9).await;
    agree(&controller);
    controller.dismiss_early(4).await.unwrap();
    agree(&controller);

    clock.set(5 * 60_000);
    let events = controller.tick().await;
    assert!(events.contains(&Event::Removed {
        level: 6,
        reason: RemovalReason::Expired
    }));
    agree(&controller);
    assert_eq!(controller.store().snapshot(), Vec::<TimerRecord>::new());
}
