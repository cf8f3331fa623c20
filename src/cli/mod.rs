//! Command-line interface for media-minder.
//!
//! This module provides the monitor (the default command) plus commands for
//! ingesting a library and querying tracks and listening history.

mod commands;

pub use commands::{Cli, Commands, run_command};
