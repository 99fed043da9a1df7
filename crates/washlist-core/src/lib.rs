//! # Washlist Core Library
//!
//! This library provides the timer lifecycle engine behind washlist, a
//! laundry-room countdown board. Each machine is keyed by its level number,
//! persisted locally, highlighted shortly before it finishes and removed on
//! expiry or when the user dismisses it early.
//!
//! ## Architecture
//!
//! - **Storage**: SQLite-backed [`TimerStore`] plus TOML configuration
//! - **Scheduler**: wall-clock driven queue of cancelable one-shot callbacks
//! - **Registry**: the in-memory, expiry-ordered view the presentation reads
//! - **Controller**: keeps store, scheduler and registry consistent
//! - **Runtime**: async driver that sleeps until the next deadline and
//!   serializes user commands
//!
//! ## Key Components
//!
//! - [`Controller`]: add, dismiss, expire and reload flows
//! - [`TimerRegistry`]: sorted registry of live timers
//! - [`EventScheduler`]: pending expire/imminent callbacks
//! - [`SqliteStore`]: durable timer records
//! - [`Runtime`]: tokio event loop around the controller

pub mod clock;
pub mod controller;
pub mod error;
pub mod events;
pub mod model;
pub mod registry;
pub mod runtime;
pub mod scheduler;
pub mod storage;

pub use clock::{Clock, ManualClock, SystemClock, TokioClock};
pub use controller::Controller;
pub use error::{ConfigError, Result, StorageError, TimerError, ValidationError};
pub use events::{Event, Notifier, Presenter, RemovalReason};
pub use model::{Level, RegistryEntry, TimerRecord, TimerState};
pub use registry::TimerRegistry;
pub use runtime::{Runtime, RuntimeHandle};
pub use scheduler::{CallbackId, CallbackKind, EventScheduler, ScheduledCallback};
pub use storage::{Config, MemoryStore, SqliteStore, TimerStore};
