pub mod config;
pub mod session;
pub mod timer;

use std::path::PathBuf;

use chrono::Local;
use washlist_core::{Config, Event, RegistryEntry, SqliteStore, TimerState};

/// Open the timer database: `--db` first, then `storage.database_path`,
/// then the default data directory.
pub fn open_store(db: Option<PathBuf>, config: &Config) -> washlist_core::Result<SqliteStore> {
    match db.or_else(|| config.storage.database_path.clone()) {
        Some(path) => SqliteStore::open_at(&path),
        None => SqliteStore::open(),
    }
}

/// One JSON object per line.
pub fn print_events(events: &[Event]) -> Result<(), serde_json::Error> {
    for event in events {
        println!("{}", serde_json::to_string(event)?);
    }
    Ok(())
}

/// `"12. – 14:35"`, with a trailing `!` once the machine is nearly done.
pub fn render_entry(entry: &RegistryEntry) -> String {
    let at = entry.record.expires_at().with_timezone(&Local);
    let marker = match entry.state() {
        TimerState::Imminent => " !",
        TimerState::Pending => "",
    };
    format!("{}. – {}{marker}", entry.level(), at.format("%H:%M"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use washlist_core::TimerRecord;

    #[test]
    fn imminent_rows_are_marked() {
        let mut entry = RegistryEntry::new(TimerRecord::new(12, 0));
        assert!(render_entry(&entry).starts_with("12. – "));
        assert!(!render_entry(&entry).ends_with('!'));

        entry.is_imminent = true;
        assert!(render_entry(&entry).ends_with(" !"));
    }
}
