//! CLI command definitions and dispatch.
//!
//! Each subcommand is implemented in its own submodule:
//! - `monitor`: Player monitoring and scrobbling (the default command)
//! - `scan`: Library ingestion
//! - `library`: Library and listening-history queries

mod library;
mod monitor;
mod scan;

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use sqlx::SqlitePool;
use tokio::runtime::Runtime;

use crate::config;
use crate::db;
use crate::library::IngestMode;

pub use library::{cmd_listens, cmd_top, cmd_tracks};
pub use monitor::cmd_monitor;
pub use scan::cmd_scan;

/// Media Minder CLI
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file (default: <config dir>/media-minder/config.toml)
    #[arg(long, global = true, env = "MEDIA_MINDER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Database file (overrides the config)
    #[arg(long, global = true, env = "MEDIA_MINDER_DB")]
    pub db: Option<PathBuf>,

    /// Also write logs to <data dir>/media-minder/media-minder.log
    #[arg(long, global = true)]
    pub log_file: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand, Clone, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Watch media players and scrobble what they play (default)
    Monitor {
        /// Skip ingesting the configured library paths first
        #[arg(long)]
        no_scan: bool,
    },
    /// Ingest a directory into the library
    Scan {
        /// Path to the directory to scan
        path: PathBuf,
        /// How discovered tracks are written
        #[arg(long, value_enum, default_value_t = ScanMode::AddNew)]
        mode: ScanMode,
    },
    /// List library tracks
    Tracks {
        /// Only tracks whose title or lyrics contain this text
        #[arg(short, long)]
        search: Option<String>,
    },
    /// Show recent listens
    Listens {
        #[arg(short, long, default_value_t = 20)]
        limit: i64,
    },
    /// Show the most listened tracks
    Top {
        #[arg(short, long, default_value_t = 10)]
        limit: i64,
    },
    /// Write a default config file
    InitConfig,
}

/// `--mode` values for `scan`
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScanMode {
    /// Insert files not yet in the library
    AddNew,
    /// Update tracks with the same title
    UpdateTitle,
    /// Update tracks with the same file path
    UpdatePath,
    /// Update tracks with the same content digest
    UpdateDigest,
}

impl From<ScanMode> for IngestMode {
    fn from(mode: ScanMode) -> Self {
        match mode {
            ScanMode::AddNew => IngestMode::AddNew,
            ScanMode::UpdateTitle => IngestMode::UpdateByTitle,
            ScanMode::UpdatePath => IngestMode::UpdateByPath,
            ScanMode::UpdateDigest => IngestMode::UpdateByDigest,
        }
    }
}

/// Run the specified CLI command, defaulting to `monitor`.
pub fn run_command(cli: &Cli) -> anyhow::Result<()> {
    let command = cli
        .command
        .clone()
        .unwrap_or(Commands::Monitor { no_scan: false });

    if command == Commands::InitConfig {
        return cmd_init_config(cli.config.as_deref());
    }

    let config = match &cli.config {
        Some(path) => config::load_from(path),
        None => config::load(),
    };
    let db_path = cli
        .db
        .clone()
        .or_else(|| config.database_path())
        .context("Could not determine the database location, pass --db")?;

    let rt = Runtime::new()?;

    match command {
        Commands::Monitor { no_scan } => {
            let scan = !no_scan && config.library.scan_on_startup;
            cmd_monitor(&rt, &config, &db_path, scan)
        }
        Commands::Scan { path, mode } => cmd_scan(&rt, &db_path, &path, mode.into()),
        Commands::Tracks { search } => cmd_tracks(&rt, &db_path, search.as_deref()),
        Commands::Listens { limit } => cmd_listens(&rt, &db_path, config.monitor.user_id, limit),
        Commands::Top { limit } => cmd_top(&rt, &db_path, limit),
        Commands::InitConfig => cmd_init_config(cli.config.as_deref()),
    }
}

/// Write a default config file at `path` (or the default location).
pub fn cmd_init_config(path: Option<&Path>) -> anyhow::Result<()> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => config::config_path().context("Could not determine config directory")?,
    };

    if config::write_default(&path)? {
        println!("Wrote default config to {}", path.display());
    } else {
        println!("Config already exists at {}", path.display());
    }
    Ok(())
}

// ============================================================================
// Shared helper functions
// ============================================================================

/// Open the library database, creating it if needed.
pub(crate) async fn open_db(path: &Path) -> anyhow::Result<SqlitePool> {
    db::open(path)
        .await
        .with_context(|| format!("Failed to open database {}", path.display()))
}
