mod config;
pub mod database;
mod memory;
pub mod migrations;

pub use config::{Config, NotificationsConfig, StorageConfig, TimersConfig};
pub use database::SqliteStore;
pub use memory::MemoryStore;

use std::path::PathBuf;

use crate::error::Result;
use crate::model::{Level, TimerRecord};

/// Durable table of timer records keyed by level.
///
/// Each single-record write is atomic on its own; nothing is promised across
/// several records. Every I/O failure surfaces as
/// [`TimerError::StorageUnavailable`](crate::TimerError::StorageUnavailable).
#[allow(async_fn_in_trait)]
pub trait TimerStore {
    /// Insert a new record.
    ///
    /// # Errors
    /// [`TimerError::DuplicateKey`](crate::TimerError::DuplicateKey) if the
    /// level is already stored.
    async fn put_record(&self, record: TimerRecord) -> Result<()>;

    /// Remove the record for `level`. Absent levels are not an error.
    async fn delete_record(&self, level: Level) -> Result<()>;

    /// Every record, ascending by expiry. Freshly read on each call.
    async fn list_all_sorted_by_expiry(&self) -> Result<Vec<TimerRecord>>;
}

/// Returns `~/.config/washlist[-dev]/` based on WASHLIST_ENV.
///
/// Set WASHLIST_ENV=dev to use development data directory.
///
/// # Errors
/// Returns an error if creating the data directory fails.
pub fn data_dir() -> std::io::Result<PathBuf> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("WASHLIST_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("washlist-dev")
    } else {
        base_dir.join("washlist")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
