//! # trickline
//!
//! CLI tool for running and inspecting Trickline game sessions.
//!
//! ## Commands
//!
//! - `simulate`: Play a full game between in-process peers
//! - `replay`: Rebuild a session's state from the action log
//! - `reset`: Delete a session's actions and reset its counter
//!
//! ## Example
//!
//! ```bash
//! # Four bots, two rounds, reproducible deal
//! trickline simulate --players 4 --rounds 2 --seed 7 --db ./game.db
//!
//! # Rebuild the state of the simulated session from the log
//! trickline replay --session 6f1c... --db ./game.db
//!
//! # Start over
//! trickline reset --session 6f1c... --db ./game.db
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use trick_log::SqliteActionLog;
use trick_session::SessionConfig;
use trick_types::{SessionId, TrumpMode};

mod commands;

use commands::{replay, reset, simulate};

/// CLI tool for running and inspecting Trickline game sessions.
#[derive(Parser, Debug)]
#[command(name = "trickline")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Session configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// SQLite action log, overrides the configured database
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Play a full game between in-process peers
    Simulate {
        /// Number of seats
        #[arg(long, default_value = "3", value_parser = clap::value_parser!(u8).range(2..=6))]
        players: u8,

        /// Rounds to play
        #[arg(long, default_value = "1", value_parser = clap::value_parser!(u8).range(1..))]
        rounds: u8,

        /// Seed for shuffling the decks
        #[arg(long, default_value = "0")]
        seed: u64,

        /// How trump is picked
        #[arg(long, value_enum, default_value = "declared")]
        trump: TrumpArg,

        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
    },

    /// Rebuild a session's state from the action log
    Replay {
        /// Session id
        #[arg(long)]
        session: SessionId,

        /// Print the rebuilt state as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete a session's actions and reset its sequence counter
    Reset {
        /// Session id
        #[arg(long)]
        session: SessionId,
    },
}

/// Trump rule for simulated games.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum TrumpArg {
    /// The declarer names trump after betting
    Declared,
    /// The first undealt card sets trump
    TurnUp,
}

impl From<TrumpArg> for TrumpMode {
    fn from(arg: TrumpArg) -> Self {
        match arg {
            TrumpArg::Declared => TrumpMode::Declared,
            TrumpArg::TurnUp => TrumpMode::TurnUp,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => SessionConfig::from_file(path)?,
        None => {
            let mut config = SessionConfig::default();
            config.log.database = default_data_dir()?.join("trickline.db");
            config
        }
    };
    if let Some(db) = cli.db {
        config.log.database = db;
    }
    let log = open_log(&config).await?;

    match cli.command {
        Commands::Simulate {
            players,
            rounds,
            seed,
            trump,
            json,
        } => {
            let options = simulate::Options {
                players: players as usize,
                rounds,
                seed,
                mode: trump.into(),
                json,
            };
            simulate::run(log, config, options).await?;
        }
        Commands::Replay { session, json } => {
            replay::run(log, config, session, json).await?;
        }
        Commands::Reset { session } => {
            reset::run(log, config, session).await?;
        }
    }

    Ok(())
}

/// Open the SQLite log, creating its directory if needed.
async fn open_log(config: &SessionConfig) -> Result<Arc<SqliteActionLog>> {
    let path = &config.log.database;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let log = SqliteActionLog::new(path, config.log.max_connections)
        .await
        .with_context(|| format!("Failed to open action log {}", path.display()))?;
    Ok(Arc::new(log))
}

/// Get the default data directory for trickline.
fn default_data_dir() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("io", "ydun", "trickline")
        .context("Could not determine home directory")?;
    Ok(dirs.data_dir().to_path_buf())
}
