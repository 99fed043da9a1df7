//! SQLite-based timer storage.
//!
//! One row per machine in the `machines` table, keyed by level with an index
//! on `expires_at` so listings come back in expiry order.

use std::path::Path;

use rusqlite::{params, Connection, ErrorCode};
use tracing::warn;

use super::{data_dir, migrations, TimerStore};
use crate::error::{Result, StorageError, TimerError};
use crate::model::{Level, TimerRecord};

/// SQLite database for timer records.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open the database at `~/.config/washlist/washlist.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self> {
        let path = data_dir().map_err(StorageError::from)?.join("washlist.db");
        Self::open_at(&path)
    }

    /// Open (or create) the database at an explicit path.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open_at(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(StorageError::from)?;
            }
        }
        let conn = Connection::open(path).map_err(|source| StorageError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::with_connection(conn)
    }

    /// Open an in-memory database.
    ///
    /// # Errors
    /// Returns an error if the schema cannot be created.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        migrations::migrate(&conn)
            .map_err(|e| StorageError::MigrationFailed(e.to_string()))?;
        Ok(Self { conn })
    }
}

impl TimerStore for SqliteStore {
    async fn put_record(&self, record: TimerRecord) -> Result<()> {
        let inserted = self.conn.execute(
            "INSERT INTO machines (level, expires_at) VALUES (?1, ?2)",
            params![record.level, record.expires_at_ms],
        );
        match inserted {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == ErrorCode::ConstraintViolation =>
            {
                Err(TimerError::DuplicateKey {
                    level: record.level,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_record(&self, level: Level) -> Result<()> {
        self.conn
            .execute("DELETE FROM machines WHERE level = ?1", params![level])?;
        Ok(())
    }

    async fn list_all_sorted_by_expiry(&self) -> Result<Vec<TimerRecord>> {
        let mut records = Vec::new();
        let mut corrupt = Vec::new();
        {
            let mut stmt = self.conn.prepare(
                "SELECT level, expires_at FROM machines ORDER BY expires_at ASC, level ASC",
            )?;
            let rows = stmt.query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)))?;
            for row in rows {
                let (level, expires_at_ms) = row?;
                match Level::try_from(level) {
                    Ok(level) => records.push(TimerRecord::new(level, expires_at_ms)),
                    Err(_) => corrupt.push(level),
                }
            }
        }

        for level in corrupt {
            warn!(level, "dropping stored timer with invalid level");
            self.conn
                .execute("DELETE FROM machines WHERE level = ?1", params![level])?;
        }
        Ok(records)
    }
}
