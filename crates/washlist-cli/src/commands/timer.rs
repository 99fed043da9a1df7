//! One-shot timer commands.
//!
//! Each invocation reloads the stored timers, applies a single operation and
//! exits. Nothing stays behind to fire callbacks; `washlist run` does that.

use std::path::PathBuf;

use washlist_core::{Config, Controller, Level, SqliteStore, SystemClock};

use super::{open_store, print_events, render_entry};

async fn load_controller(
    db: Option<PathBuf>,
) -> Result<Controller<SqliteStore>, Box<dyn std::error::Error>> {
    let config = Config::load_or_default();
    let store = open_store(db, &config)?;
    let mut controller = Controller::new(store, SystemClock, &config.timers);
    controller.reload_on_startup().await?;
    Ok(controller)
}

pub async fn add(
    db: Option<PathBuf>,
    level: Level,
    minutes: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut controller = load_controller(db).await?;
    let events = controller.add_timer(level, minutes).await?;
    print_events(&events)?;
    Ok(())
}

pub async fn dismiss(db: Option<PathBuf>, level: Level) -> Result<(), Box<dyn std::error::Error>> {
    let mut controller = load_controller(db).await?;
    let events = controller.dismiss_early(level).await?;
    print_events(&events)?;
    Ok(())
}

pub async fn list(db: Option<PathBuf>, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let controller = load_controller(db).await?;
    let entries = controller.registry().entries();

    if json {
        println!("{}", serde_json::to_string_pretty(entries)?);
    } else if entries.is_empty() {
        println!("no timers running");
    } else {
        for entry in entries {
            println!("{}", render_entry(entry));
        }
    }
    Ok(())
}
