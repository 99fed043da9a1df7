//! Core error types for washlist-core.
//!
//! Every fallible controller operation reports a [`TimerError`]. Validation
//! failures are user-correctable and never mutate state; storage failures
//! abort the attempted operation before the registry is touched.

use std::path::PathBuf;
use thiserror::Error;

use crate::model::Level;

/// Core error type for washlist-core.
#[derive(Error, Debug)]
pub enum TimerError {
    /// Bad level or duration supplied by the user
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A timer for this level already exists
    #[error("Level {level} already has a running timer")]
    DuplicateKey { level: Level },

    /// Persistent store could not be reached
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(#[from] StorageError),

    /// No live timer for this level
    #[error("No timer registered for level {level}")]
    NotFound { level: Level },

    /// A user operation arrived before the startup reload
    #[error("Timers have not been loaded yet")]
    NotLoaded,

    /// The startup reload ran twice
    #[error("Timers were already loaded for this process")]
    AlreadyLoaded,

    /// The runtime loop is no longer accepting commands
    #[error("Timer runtime has stopped")]
    RuntimeStopped,
}

/// Validation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Level outside the configured range
    #[error("Level {level} is outside the valid range {min}..={max}")]
    LevelOutOfRange { level: Level, min: Level, max: Level },

    /// Timers must run for at least one minute
    #[error("Duration must be at least one minute")]
    ZeroMinutes,
}

/// Storage-specific errors.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,

    /// Store was taken offline
    #[error("Store is offline")]
    Offline,

    /// Data directory could not be prepared
    #[error("Data directory error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Key does not name a configuration value
    #[error("Unknown config key: {0}")]
    UnknownKey(String),

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(err, _msg) => {
                if err.code == rusqlite::ErrorCode::DatabaseLocked
                    || err.code == rusqlite::ErrorCode::DatabaseBusy
                {
                    StorageError::Locked
                } else {
                    StorageError::QueryFailed(err.to_string())
                }
            }
            _ => StorageError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for TimerError {
    fn from(err: rusqlite::Error) -> Self {
        TimerError::StorageUnavailable(err.into())
    }
}

/// Result type alias for TimerError
pub type Result<T, E = TimerError> = std::result::Result<T, E>;
