//! Timer records and their registry view.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Machine slot identifier. Unique among live timers.
pub type Level = u8;

pub const MS_PER_MINUTE: i64 = 60 * 1000;

/// Durable timer record, owned by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimerRecord {
    pub level: Level,
    /// Absolute expiry in milliseconds since the Unix epoch.
    pub expires_at_ms: i64,
}

impl TimerRecord {
    pub fn new(level: Level, expires_at_ms: i64) -> Self {
        Self {
            level,
            expires_at_ms,
        }
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.expires_at_ms).unwrap_or_default()
    }

    pub fn is_expired(&self, now_ms: i64) -> bool {
        self.expires_at_ms <= now_ms
    }

    pub fn remaining_ms(&self, now_ms: i64) -> i64 {
        (self.expires_at_ms - now_ms).max(0)
    }

    /// Whole minutes left, rounded up.
    pub fn remaining_minutes(&self, now_ms: i64) -> u32 {
        let remaining = self.remaining_ms(now_ms);
        ((remaining + MS_PER_MINUTE - 1) / MS_PER_MINUTE) as u32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerState {
    Pending,
    /// Inside the imminent window; highlighted.
    Imminent,
}

/// A live timer as the presentation sees it.
///
/// The transient flags replace state that would otherwise live in rendered
/// markup: the adapter reads them to decide how to draw the row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    #[serde(flatten)]
    pub record: TimerRecord,
    pub is_imminent: bool,
    pub is_being_dismissed: bool,
}

impl RegistryEntry {
    pub fn new(record: TimerRecord) -> Self {
        Self {
            record,
            is_imminent: false,
            is_being_dismissed: false,
        }
    }

    pub fn level(&self) -> Level {
        self.record.level
    }

    pub fn expires_at_ms(&self) -> i64 {
        self.record.expires_at_ms
    }

    pub fn state(&self) -> TimerState {
        if self.is_imminent {
            TimerState::Imminent
        } else {
            TimerState::Pending
        }
    }
}

impl From<TimerRecord> for RegistryEntry {
    fn from(record: TimerRecord) -> Self {
        Self::new(record)
    }
}
