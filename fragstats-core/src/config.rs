//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/fragstats/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/fragstats/` (~/.config/fragstats/)
//! - Data: `$XDG_DATA_HOME/fragstats/` (~/.local/share/fragstats/)
//! - State/Logs: `$XDG_STATE_HOME/fragstats/` (~/.local/state/fragstats/)

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::PathBuf;

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_DATA_HOME or ~/.local/share
fn xdg_data_home() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/share"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Database overrides
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Log ingestion configuration
    #[serde(default)]
    pub ingest: IngestConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Kill feed configuration (optional)
    #[serde(default)]
    pub feed: FeedConfig,
}

/// Database configuration
#[derive(Debug, Deserialize, Default)]
pub struct DatabaseConfig {
    /// Override path for the SQLite database file
    pub path: Option<PathBuf>,
}

/// Log ingestion configuration
#[derive(Debug, Deserialize, Default)]
pub struct IngestConfig {
    /// Override directory holding server log files
    pub log_dir: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

/// Kill feed configuration
///
/// When enabled, fragstats pushes kill feed events to a broadcast endpoint
/// in addition to storing frags locally in SQLite.
#[derive(Debug, Deserialize, Clone)]
pub struct FeedConfig {
    /// Enable/disable feed delivery
    #[serde(default)]
    pub enabled: bool,

    /// Feed endpoint URL (e.g., `https://feed.example.com`)
    pub server_url: Option<String>,

    /// API key (format: "fs_live_xxxx")
    pub api_key: Option<String>,

    /// Events per API call (max 50, default 20)
    #[serde(default = "default_feed_batch_size")]
    pub batch_size: usize,

    /// HTTP request timeout in seconds
    #[serde(default = "default_feed_timeout")]
    pub timeout_secs: u64,

    /// Max retry attempts for transient failures
    #[serde(default = "default_feed_max_retries")]
    pub max_retries: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            server_url: None,
            api_key: None,
            batch_size: default_feed_batch_size(),
            timeout_secs: default_feed_timeout(),
            max_retries: default_feed_max_retries(),
        }
    }
}

impl FeedConfig {
    /// Check if the feed is properly configured and enabled
    pub fn is_ready(&self) -> bool {
        self.enabled && self.server_url.is_some()
    }

    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }

        if self.server_url.is_none() {
            return Err(Error::Config(
                "feed.server_url is required when feed is enabled".to_string(),
            ));
        }
        if self.batch_size == 0 || self.batch_size > 50 {
            return Err(Error::Config(
                "feed.batch_size must be between 1 and 50".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_feed_batch_size() -> usize {
    20
}

fn default_feed_timeout() -> u64 {
    30
}

fn default_feed_max_retries() -> usize {
    3
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/fragstats/config.toml` (~/.config/fragstats/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("fragstats").join("config.toml")
    }

    /// Returns the data directory path (for the SQLite database)
    ///
    /// `$XDG_DATA_HOME/fragstats/` (~/.local/share/fragstats/)
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join("fragstats")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/fragstats/` (~/.local/state/fragstats/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("fragstats")
    }

    /// Returns the default database file path
    ///
    /// `$XDG_DATA_HOME/fragstats/data.db` (~/.local/share/fragstats/data.db)
    pub fn database_path() -> PathBuf {
        Self::data_dir().join("data.db")
    }

    /// Database path honoring the `[database].path` override
    pub fn resolved_database_path(&self) -> PathBuf {
        self.database
            .path
            .clone()
            .unwrap_or_else(Self::database_path)
    }

    /// Returns the log file path
    ///
    /// `$XDG_STATE_HOME/fragstats/fragstats.log` (~/.local/state/fragstats/fragstats.log)
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("fragstats.log")
    }

    /// Ensure XDG base directory environment variables are set.
    ///
    /// This is mainly for CLI binaries that want explicit, stable path behavior
    /// before invoking other components that read these env vars.
    pub fn ensure_xdg_env() {
        let home = home_dir();

        if std::env::var("XDG_DATA_HOME").is_err() {
            std::env::set_var("XDG_DATA_HOME", home.join(".local/share"));
        }

        if std::env::var("XDG_STATE_HOME").is_err() {
            std::env::set_var("XDG_STATE_HOME", home.join(".local/state"));
        }

        if std::env::var("XDG_CONFIG_HOME").is_err() {
            std::env::set_var("XDG_CONFIG_HOME", home.join(".config"));
        }
    }
}
