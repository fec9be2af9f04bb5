//! Configuration loading for trick-session.
//!
//! Configuration is loaded from a TOML file (default: `trickline.toml`).
//! Every section and field is optional.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration for a session.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionConfig {
    /// Action log configuration.
    #[serde(default)]
    pub log: LogConfig,
    /// Sequencer retry configuration.
    #[serde(default)]
    pub sequencer: SequencerConfig,
    /// Catch-up configuration.
    #[serde(default)]
    pub catch_up: CatchUpConfig,
    /// Worker configuration.
    #[serde(default)]
    pub session: WorkerConfig,
}

/// Action log configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// Path to SQLite database file.
    #[serde(default = "default_database_path")]
    pub database: PathBuf,
    /// Rows removed per batch by a session reset (default: 500).
    #[serde(default = "default_delete_batch_size")]
    pub delete_batch_size: u32,
    /// Pool size for the SQLite backend (default: 5).
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

/// Sequencer retry configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SequencerConfig {
    /// Retries after a counter conflict before giving up (default: 5).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base backoff between retries in milliseconds, multiplied by the
    /// attempt number (default: 20).
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

/// Catch-up configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CatchUpConfig {
    /// Run a catch-up from sequence 1 when the session starts (default: true).
    #[serde(default = "default_true")]
    pub on_start: bool,
    /// Run a catch-up when a sequence gap outlives the grace period
    /// (default: true).
    #[serde(default = "default_true")]
    pub auto_on_gap: bool,
    /// How long a gap may stay open before catch-up, in milliseconds
    /// (default: 250).
    #[serde(default = "default_gap_grace_ms")]
    pub gap_grace_ms: u64,
}

/// Worker configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkerConfig {
    /// Capacity of the event broadcast channel (default: 256).
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
    /// Maximum actions parked for a later phase (default: 1024).
    #[serde(default = "default_pending_capacity")]
    pub pending_capacity: usize,
}

// Default value functions
fn default_database_path() -> PathBuf {
    PathBuf::from("trickline.db")
}

fn default_delete_batch_size() -> u32 {
    trick_log::DEFAULT_DELETE_BATCH
}

fn default_max_connections() -> u32 {
    5
}

fn default_max_retries() -> u32 {
    5
}

fn default_retry_backoff_ms() -> u64 {
    20
}

fn default_true() -> bool {
    true
}

fn default_gap_grace_ms() -> u64 {
    250
}

fn default_event_capacity() -> usize {
    256
}

fn default_pending_capacity() -> usize {
    trick_core::DEFAULT_PENDING_CAPACITY
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            database: default_database_path(),
            delete_batch_size: default_delete_batch_size(),
            max_connections: default_max_connections(),
        }
    }
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

impl SequencerConfig {
    /// Base backoff as a duration.
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

impl Default for CatchUpConfig {
    fn default() -> Self {
        Self {
            on_start: true,
            auto_on_gap: true,
            gap_grace_ms: default_gap_grace_ms(),
        }
    }
}

impl CatchUpConfig {
    /// Gap grace period as a duration.
    pub fn gap_grace(&self) -> Duration {
        Duration::from_millis(self.gap_grace_ms)
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            event_capacity: default_event_capacity(),
            pending_capacity: default_pending_capacity(),
        }
    }
}

impl SessionConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
}
