//! Configuration system using TOML files.
//!
//! Config is stored in the OS-standard config directory:
//! - Windows: %APPDATA%\media-minder\config.toml
//! - macOS: ~/Library/Application Support/media-minder/config.toml
//! - Linux: ~/.config/media-minder/config.toml
//!
//! The config file is human-readable and editable. Settings are loaded once
//! at startup; a missing or broken file falls back to defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application directory name under the OS config/data dirs.
const APP_DIR: &str = "media-minder";

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Library settings
    pub library: LibraryConfig,

    /// Player monitoring settings
    pub monitor: MonitorConfig,

    /// Last.fm credentials (keep separate for potential future encryption)
    pub lastfm: LastFmCredentials,

    /// Database settings
    pub database: DatabaseConfig,
}

/// Library management settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// Directories ingested at startup
    pub paths: Vec<PathBuf>,

    /// Whether `monitor` ingests `paths` before listening
    pub scan_on_startup: bool,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            paths: Vec::new(),
            scan_on_startup: true,
        }
    }
}

/// Player monitoring settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Allow-listed players, either the short name (`spotify`) or the full
    /// bus name (`org.mpris.MediaPlayer2.spotify`)
    pub players: Vec<String>,

    /// User that listens are recorded for
    pub user_id: i64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            players: Vec::new(),
            user_id: 1,
        }
    }
}

/// Last.fm API credentials
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LastFmCredentials {
    pub username: String,
    pub password: String,
    pub api_key: String,
    pub api_secret: String,
}

impl LastFmCredentials {
    /// Whether every field needed for authentication is present.
    pub fn is_complete(&self) -> bool {
        !self.username.is_empty()
            && !self.password.is_empty()
            && !self.api_key.is_empty()
            && !self.api_secret.is_empty()
    }
}

/// Shown in logs, so the secrets only report whether they are set.
impl std::fmt::Debug for LastFmCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |secret: &str| if secret.is_empty() { "" } else { "<redacted>" };
        f.debug_struct("LastFmCredentials")
            .field("username", &self.username)
            .field("password", &redact(&self.password))
            .field("api_key", &self.api_key)
            .field("api_secret", &redact(&self.api_secret))
            .finish()
    }
}

/// Database settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite file (None = `<data dir>/media-minder/data.db`)
    pub path: Option<PathBuf>,
}

impl Config {
    /// Resolve the database file location.
    pub fn database_path(&self) -> Option<PathBuf> {
        self.database
            .path
            .clone()
            .or_else(|| data_dir().map(|d| d.join("data.db")))
    }
}

// ============================================================================
// Config File Operations
// ============================================================================

/// Get the config directory path
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_DIR))
}

/// Get the data directory path (database, log file)
pub fn data_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|d| d.join(APP_DIR))
}

/// Get the full path to the config file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("config.toml"))
}

/// Load configuration from the default location.
pub fn load() -> Config {
    match config_path() {
        Some(path) => load_from(&path),
        None => {
            tracing::warn!("Could not determine config directory, using defaults");
            Config::default()
        }
    }
}

/// Load configuration from disk
///
/// Returns default config if file doesn't exist or can't be parsed.
/// Logs warnings but doesn't fail - we always return a usable config.
pub fn load_from(path: &Path) -> Config {
    if !path.exists() {
        tracing::info!("No config file found at {:?}, using defaults", path);
        return Config::default();
    }

    match std::fs::read_to_string(path) {
        Ok(contents) => match toml::from_str(&contents) {
            Ok(config) => {
                tracing::info!("Loaded config from {:?}", path);
                config
            }
            Err(e) => {
                tracing::error!("Failed to parse config file {:?}: {}", path, e);
                tracing::warn!("Using default configuration");
                Config::default()
            }
        },
        Err(e) => {
            tracing::error!("Failed to read config file {:?}: {}", path, e);
            Config::default()
        }
    }
}

/// Save configuration to disk
///
/// Creates the parent directory if it doesn't exist.
pub fn save_to(config: &Config, path: &Path) -> Result<(), ConfigError> {
    let dir = path.parent().ok_or(ConfigError::NoConfigDir)?;

    std::fs::create_dir_all(dir).map_err(|e| ConfigError::CreateDir(dir.to_path_buf(), e))?;

    let contents = toml::to_string_pretty(config).map_err(ConfigError::Serialize)?;

    // Write atomically (write to temp, then rename)
    let temp_path = path.with_extension("toml.tmp");
    std::fs::write(&temp_path, &contents).map_err(|e| ConfigError::Write(temp_path.clone(), e))?;
    std::fs::rename(&temp_path, path)
        .map_err(|e| ConfigError::Rename(temp_path, path.to_path_buf(), e))?;

    tracing::info!("Saved config to {:?}", path);
    Ok(())
}

/// Write a default config file unless one already exists.
///
/// Returns `true` when a new file was written.
pub fn write_default(path: &Path) -> Result<bool, ConfigError> {
    if path.exists() {
        return Ok(false);
    }
    save_to(&Config::default(), path)?;
    Ok(true)
}

// ============================================================================
// Error Types
// ============================================================================

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to create config directory {0}: {1}")]
    CreateDir(PathBuf, std::io::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(toml::ser::Error),

    #[error("Failed to write config to {0}: {1}")]
    Write(PathBuf, std::io::Error),

    #[error("Failed to rename temp file {0} to {1}: {2}")]
    Rename(PathBuf, PathBuf, std::io::Error),
}

// ============================================================================
// Tests
// ============================================================================
