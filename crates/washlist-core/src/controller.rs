//! Timer lifecycle controller.
//!
//! Orchestrates the store, the scheduler and the registry so that they agree
//! after every operation.
//!
//! ## State Transitions
//!
//! ```text
//! Pending -> Imminent -> (Expired | DismissedEarly)
//! ```
//!
//! Both terminal states remove the timer from the registry and the store.
//!
//! ## Races
//!
//! Callbacks and user commands never interleave mid-operation. A callback
//! that arrives for a level which is no longer registered (because an early
//! dismissal won) is a silent no-op: every handler checks membership before
//! acting, and every removal cancels the level's pending callbacks before it
//! touches the store.
//!
//! ## Usage
//!
//! ```ignore
//! let mut controller = Controller::new(store, SystemClock, &config.timers);
//! controller.reload_on_startup().await?;
//! controller.add_timer(5, 90).await?;
//! // Whenever controller.next_deadline() passes:
//! let events = controller.tick().await;
//! ```

use std::collections::BTreeSet;

use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::error::{Result, TimerError, ValidationError};
use crate::events::{Event, RemovalReason};
use crate::model::{Level, RegistryEntry, TimerRecord, MS_PER_MINUTE};
use crate::registry::TimerRegistry;
use crate::scheduler::{CallbackKind, EventScheduler};
use crate::storage::{TimerStore, TimersConfig};

pub struct Controller<S, C = SystemClock> {
    store: S,
    clock: C,
    registry: TimerRegistry,
    scheduler: EventScheduler,
    imminent_window_ms: i64,
    loaded: bool,
    /// Expired levels whose store row could not be deleted yet.
    unpurged: BTreeSet<Level>,
}

impl<S: TimerStore, C: Clock> Controller<S, C> {
    pub fn new(store: S, clock: C, config: &TimersConfig) -> Self {
        Self {
            store,
            clock,
            registry: TimerRegistry::from_config(config),
            scheduler: EventScheduler::new(),
            imminent_window_ms: config.imminent_window_ms(),
            loaded: false,
            unpurged: BTreeSet::new(),
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn registry(&self) -> &TimerRegistry {
        &self.registry
    }

    pub fn scheduler(&self) -> &EventScheduler {
        &self.scheduler
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    pub fn imminent_window_ms(&self) -> i64 {
        self.imminent_window_ms
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Expired levels still waiting for their store row to be deleted.
    pub fn unpurged(&self) -> impl Iterator<Item = Level> + '_ {
        self.unpurged.iter().copied()
    }

    /// When the next callback is due, if any.
    pub fn next_deadline(&self) -> Option<i64> {
        self.scheduler.next_deadline()
    }

    /// Check a level before asking the user for a duration.
    ///
    /// # Errors
    /// `Validation` when out of range, `DuplicateKey` when already running.
    pub fn validate_new_level(&self, level: Level) -> Result<()> {
        if !self.registry.level_in_range(level) {
            let (min, max) = self.registry.level_range();
            return Err(ValidationError::LevelOutOfRange { level, min, max }.into());
        }
        if self.registry.contains(level) {
            return Err(TimerError::DuplicateKey { level });
        }
        Ok(())
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Rebuild the registry from the store. Must run once, before any
    /// user operation.
    ///
    /// Expired records are purged and never rendered; the rest are inserted
    /// and armed as if just added, with the imminent threshold checked
    /// against the current time.
    ///
    /// # Errors
    /// `AlreadyLoaded` on a second call; `StorageUnavailable` if the store
    /// cannot be listed (nothing is loaded in that case).
    pub async fn reload_on_startup(&mut self) -> Result<Vec<Event>> {
        if self.loaded {
            return Err(TimerError::AlreadyLoaded);
        }

        let records = self.store.list_all_sorted_by_expiry().await?;
        let now = self.clock.now_ms();
        let mut events = Vec::new();
        let mut purged = 0;

        for record in records {
            if record.is_expired(now) {
                // A failed purge is retried on the next startup.
                if let Err(e) = self.store.delete_record(record.level).await {
                    warn!(level = record.level, "failed to purge expired timer: {e}");
                }
                purged += 1;
                continue;
            }
            events.extend(self.register(record, now));
        }

        self.loaded = true;
        info!(live = self.registry.len(), purged, "timers reloaded");
        Ok(events)
    }

    /// Start a timer for `level` running `minutes` from now.
    ///
    /// # Errors
    /// `Validation` for a bad level or zero minutes, `DuplicateKey` when the
    /// level is taken, `StorageUnavailable` when the write fails or the
    /// level's expired row still cannot be purged. No state changes on error.
    pub async fn add_timer(&mut self, level: Level, minutes: u32) -> Result<Vec<Event>> {
        self.ensure_loaded()?;
        self.validate_new_level(level)?;
        if minutes == 0 {
            return Err(ValidationError::ZeroMinutes.into());
        }
        if self.unpurged.contains(&level) {
            self.store.delete_record(level).await?;
            self.unpurged.remove(&level);
            debug!(level, "expired timer purged before re-adding");
        }

        let now = self.clock.now_ms();
        let record = TimerRecord::new(level, now + i64::from(minutes) * MS_PER_MINUTE);
        self.store.put_record(record).await?;

        info!(level, minutes, expires_at = %record.expires_at(), "timer added");
        Ok(self.register(record, now))
    }

    /// Remove a timer before it runs out.
    ///
    /// # Errors
    /// `NotFound` if the level is not registered, `StorageUnavailable` if the
    /// delete fails (the timer then stays live with its callbacks re-armed).
    pub async fn dismiss_early(&mut self, level: Level) -> Result<Vec<Event>> {
        self.ensure_loaded()?;
        let Some(entry) = self.registry.get(level).cloned() else {
            return Err(TimerError::NotFound { level });
        };

        self.scheduler.cancel_all(level);
        if let Err(e) = self.store.delete_record(level).await {
            self.rearm(&entry);
            return Err(e);
        }
        self.registry.remove(level);

        info!(level, "timer dismissed early");
        Ok(vec![Event::Removed {
            level,
            reason: RemovalReason::Dismissed,
        }])
    }

    /// Record that a dismissal gesture started on `level`.
    ///
    /// # Errors
    /// `NotFound` if the level is not registered.
    pub fn begin_dismiss(&mut self, level: Level) -> Result<Vec<Event>> {
        self.ensure_loaded()?;
        if !self.registry.contains(level) {
            return Err(TimerError::NotFound { level });
        }
        Ok(if self.registry.begin_dismiss(level) {
            vec![Event::DismissStarted { level }]
        } else {
            Vec::new()
        })
    }

    /// Record that a dismissal gesture was released without dismissing.
    ///
    /// # Errors
    /// `NotFound` if the level is not registered.
    pub fn cancel_dismiss(&mut self, level: Level) -> Result<Vec<Event>> {
        self.ensure_loaded()?;
        if !self.registry.contains(level) {
            return Err(TimerError::NotFound { level });
        }
        Ok(if self.registry.cancel_dismiss(level) {
            vec![Event::DismissCanceled { level }]
        } else {
            Vec::new()
        })
    }

    /// Deliver every callback that is due and return the resulting events.
    ///
    /// Handler failures are logged, never returned.
    pub async fn tick(&mut self) -> Vec<Event> {
        if !self.loaded {
            return Vec::new();
        }
        self.retry_purges().await;
        let now = self.clock.now_ms();
        let mut events = Vec::new();
        for callback in self.scheduler.take_due(now) {
            match callback.kind {
                CallbackKind::Imminent => {
                    events.extend(self.handle_imminent_fire(callback.level));
                }
                CallbackKind::Expire => {
                    events.extend(self.handle_expire_fire(callback.level).await);
                }
            }
        }
        events
    }

    /// The imminent window was reached for `level`.
    pub fn handle_imminent_fire(&mut self, level: Level) -> Vec<Event> {
        let Some(entry) = self.registry.get(level) else {
            debug!(level, "imminent callback for removed timer ignored");
            return Vec::new();
        };
        let minutes_remaining = entry.record.remaining_minutes(self.clock.now_ms());

        if !self.registry.mark_imminent(level) {
            return Vec::new();
        }
        info!(level, minutes_remaining, "timer imminent");
        vec![
            Event::MarkedImminent { level },
            Event::Notification {
                level,
                minutes_remaining,
            },
        ]
    }

    /// `level` ran out.
    pub async fn handle_expire_fire(&mut self, level: Level) -> Vec<Event> {
        if !self.registry.contains(level) {
            debug!(level, "expire callback for removed timer ignored");
            return Vec::new();
        }

        self.scheduler.cancel_all(level);
        // Retried on the next tick, before re-adding the level, and on reload.
        if let Err(e) = self.store.delete_record(level).await {
            warn!(level, "failed to delete expired timer: {e}");
            self.unpurged.insert(level);
        }
        self.registry.remove(level);

        info!(level, "timer expired");
        vec![Event::Removed {
            level,
            reason: RemovalReason::Expired,
        }]
    }

    // ── Internal ─────────────────────────────────────────────────────

    async fn retry_purges(&mut self) {
        let pending: Vec<Level> = self.unpurged.iter().copied().collect();
        for level in pending {
            match self.store.delete_record(level).await {
                Ok(()) => {
                    self.unpurged.remove(&level);
                    debug!(level, "expired timer purged");
                }
                Err(e) => debug!(level, "expired timer still not purged: {e}"),
            }
        }
    }

    fn ensure_loaded(&self) -> Result<()> {
        if self.loaded {
            Ok(())
        } else {
            Err(TimerError::NotLoaded)
        }
    }

    /// Insert a stored record into the registry and arm its callbacks.
    fn register(&mut self, record: TimerRecord, now: i64) -> Vec<Event> {
        let level = record.level;
        let index = self.registry.insert_sorted(RegistryEntry::new(record));
        let mut events = vec![Event::Inserted { level, index }];

        self.scheduler
            .schedule(level, CallbackKind::Expire, record.expires_at_ms);
        if record.expires_at_ms - now > self.imminent_window_ms {
            self.scheduler.schedule(
                level,
                CallbackKind::Imminent,
                record.expires_at_ms - self.imminent_window_ms,
            );
        } else if self.registry.mark_imminent(level) {
            events.push(Event::MarkedImminent { level });
        }
        events
    }

    /// Restore the callbacks of an entry whose removal failed.
    fn rearm(&mut self, entry: &RegistryEntry) {
        let level = entry.level();
        self.scheduler
            .schedule(level, CallbackKind::Expire, entry.expires_at_ms());
        if !entry.is_imminent {
            self.scheduler.schedule(
                level,
                CallbackKind::Imminent,
                entry.expires_at_ms() - self.imminent_window_ms,
            );
        }
    }
}
