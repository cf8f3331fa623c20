//! Media Minder - listening history and scrobbling for local media players.
//!
//! Ingests a music library into SQLite, follows MPRIS players on the session
//! bus, records a Listen whenever a library track stops playing, and scrobbles
//! listens past the halfway mark to Last.fm.

pub mod cli;
pub mod config;
pub mod db;
pub mod enrichment;
pub mod error;
pub mod library;
pub mod metadata;
pub mod model;
pub mod monitor;
pub mod scanner;
pub mod scrobble;
#[cfg(test)]
pub mod test_utils;

use std::fs::{File, OpenOptions};
use std::sync::Mutex;

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Log file name under the data directory
const LOG_FILE_NAME: &str = "media-minder.log";

fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    // Initialize logging
    let log_file = if args.log_file { open_log_file() } else { None };
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(log_file.map(|file| {
            fmt::layer()
                .with_target(true)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
        }))
        .with(EnvFilter::from_default_env().add_directive("media_minder=info".parse()?))
        .init();

    cli::run_command(&args)
}

/// Open the log file for appending, `None` (with a warning) if that fails.
fn open_log_file() -> Option<File> {
    let dir = config::data_dir()?;
    let path = dir.join(LOG_FILE_NAME);
    let opened = std::fs::create_dir_all(&dir)
        .and_then(|_| OpenOptions::new().create(true).append(true).open(&path));

    match opened {
        Ok(file) => Some(file),
        Err(e) => {
            eprintln!("Warning: cannot open log file {}: {}", path.display(), e);
            None
        }
    }
}
