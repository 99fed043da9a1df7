//! Interactive session.
//!
//! Reads one command per line from stdin and prints every board event as a
//! JSON line on stdout. Expiry and imminent callbacks fire on their own while
//! the session is open.
//!
//! ```text
//! add <level> <minutes>   start a timer
//! dismiss <level>         remove a timer early
//! grab <level>            start dragging a row
//! release <level>         let go of a row short of the threshold
//! list                    print the board
//! quit                    stop the session
//! ```

use std::path::PathBuf;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use washlist_core::{
    Config, Controller, Event, Level, MemoryStore, Runtime, RuntimeHandle, TimerStore, TokioClock,
};

use super::{open_store, render_entry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Input {
    Add { level: Level, minutes: u32 },
    Dismiss(Level),
    Grab(Level),
    Release(Level),
    List,
    Quit,
}

fn number<'a>(words: &mut impl Iterator<Item = &'a str>, what: &str) -> Result<u32, String> {
    let word = words.next().ok_or_else(|| format!("missing {what}"))?;
    word.parse().map_err(|_| format!("invalid {what}: {word}"))
}

fn level<'a>(words: &mut impl Iterator<Item = &'a str>) -> Result<Level, String> {
    let value = number(words, "level")?;
    Level::try_from(value).map_err(|_| format!("invalid level: {value}"))
}

fn parse_line(line: &str) -> Result<Option<Input>, String> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };

    let input = match verb {
        "add" | "a" => {
            let level = level(&mut words)?;
            let minutes = number(&mut words, "minutes")?;
            Input::Add { level, minutes }
        }
        "dismiss" | "d" => Input::Dismiss(level(&mut words)?),
        "grab" => Input::Grab(level(&mut words)?),
        "release" => Input::Release(level(&mut words)?),
        "list" | "ls" => Input::List,
        "quit" | "exit" | "q" => Input::Quit,
        other => return Err(format!("unknown command: {other}")),
    };
    Ok(Some(input))
}

pub async fn run(db: Option<PathBuf>, ephemeral: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load_or_default();
    if ephemeral {
        serve(MemoryStore::new(), &config).await
    } else {
        let store = open_store(db, &config)?;
        serve(store, &config).await
    }
}

async fn serve<S: TimerStore>(store: S, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let controller = Controller::new(store, TokioClock::new(), &config.timers);
    let notifications = config.notifications.enabled;

    let (runtime, handle) = Runtime::new(
        controller,
        |event: &Event| match serde_json::to_string(event) {
            Ok(line) => println!("{line}"),
            Err(e) => warn!("could not serialize event: {e}"),
        },
        move |level: Level, minutes: u32| {
            info!(level, minutes, "machine almost done");
            if notifications {
                eprintln!("Level {level} will be ready in {minutes} min");
            }
        },
    );

    let input = tokio::spawn(read_commands(handle));
    let result = runtime.run().await;
    input.abort();
    result?;
    Ok(())
}

async fn read_commands(handle: RuntimeHandle) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!("stdin closed: {e}");
                break;
            }
        };

        let input = match parse_line(&line) {
            Ok(Some(input)) => input,
            Ok(None) => continue,
            Err(message) => {
                eprintln!("error: {message}");
                continue;
            }
        };

        // Events reach stdout through the presenter; only failures are
        // reported here.
        let outcome = match input {
            Input::Add { level, minutes } => handle.add_timer(level, minutes).await.map(drop),
            Input::Dismiss(level) => handle.dismiss_early(level).await.map(drop),
            Input::Grab(level) => handle.begin_dismiss(level).await.map(drop),
            Input::Release(level) => handle.cancel_dismiss(level).await.map(drop),
            Input::List => handle.snapshot().await.map(|entries| {
                for entry in &entries {
                    println!("{}", render_entry(entry));
                }
            }),
            Input::Quit => break,
        };

        if let Err(e) = outcome {
            eprintln!("error: {e}");
        }
    }

    handle.shutdown().await;
}
