//! Process-local store, for ephemeral sessions and tests.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use super::TimerStore;
use crate::error::{Result, StorageError, TimerError};
use crate::model::{Level, TimerRecord};

/// In-memory [`TimerStore`].
///
/// Can be switched offline to exercise storage failure paths.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<BTreeMap<Level, i64>>,
    offline: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: impl IntoIterator<Item = TimerRecord>) -> Self {
        let map = records
            .into_iter()
            .map(|r| (r.level, r.expires_at_ms))
            .collect();
        Self {
            records: Mutex::new(map),
            offline: AtomicBool::new(false),
        }
    }

    /// While offline every operation fails with `StorageUnavailable`.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Current contents, ascending by level.
    pub fn snapshot(&self) -> Vec<TimerRecord> {
        self.records
            .lock()
            .map(|map| {
                map.iter()
                    .map(|(&level, &expires_at_ms)| TimerRecord::new(level, expires_at_ms))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn records(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<Level, i64>>> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StorageError::Offline.into());
        }
        self.records.lock().map_err(|_| StorageError::Locked.into())
    }
}

impl TimerStore for MemoryStore {
    async fn put_record(&self, record: TimerRecord) -> Result<()> {
        let mut records = self.records()?;
        if records.contains_key(&record.level) {
            return Err(TimerError::DuplicateKey {
                level: record.level,
            });
        }
        records.insert(record.level, record.expires_at_ms);
        Ok(())
    }

    async fn delete_record(&self, level: Level) -> Result<()> {
        self.records()?.remove(&level);
        Ok(())
    }

    async fn list_all_sorted_by_expiry(&self) -> Result<Vec<TimerRecord>> {
        let mut list: Vec<TimerRecord> = self
            .records()?
            .iter()
            .map(|(&level, &expires_at_ms)| TimerRecord::new(level, expires_at_ms))
            .collect();
        list.sort_by_key(|r| (r.expires_at_ms, r.level));
        Ok(list)
    }
}
