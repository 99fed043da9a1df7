use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use washlist_core::Level;

mod commands;

#[derive(Parser)]
#[command(name = "washlist", version, about = "Laundry machine countdown board")]
struct Cli {
    /// Database file (overrides storage.database_path)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive session with live expiry and notifications
    Run {
        /// Keep timers in memory only
        #[arg(long)]
        ephemeral: bool,
    },
    /// Start a timer for a machine
    Add {
        /// Machine level
        level: Level,
        /// Minutes until the machine finishes
        minutes: u32,
    },
    /// Dismiss a timer before it finishes
    Dismiss {
        /// Machine level
        level: Level,
    },
    /// List running timers
    List {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("WASHLIST_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    init_logging();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Run { ephemeral } => commands::session::run(cli.db, ephemeral).await,
        Commands::Add { level, minutes } => commands::timer::add(cli.db, level, minutes).await,
        Commands::Dismiss { level } => commands::timer::dismiss(cli.db, level).await,
        Commands::List { json } => commands::timer::list(cli.db, json).await,
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
