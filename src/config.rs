//! Backend and client configuration with TOML loading.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for config loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// TOML syntax or shape error.
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    /// Could not read the config file.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Tuning for the backend command loop and its persistence worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Flush the journal immediately after every create.
    pub flush_on_create: bool,
    /// Flush once this many ops are buffered.
    pub batch_max_ops: usize,
    /// Flush buffered ops after this many milliseconds.
    pub batch_max_latency_ms: u64,
    /// Bound of the queue between the command loop and the journal worker.
    pub persist_queue_bound: usize,
    /// Write a store snapshot every N mutations; 0 disables.
    pub snapshot_every_ops: usize,
    /// Delete journaled ops covered by a fresh snapshot.
    pub compact_after_snapshot: bool,
    /// Bound of the command channel into the backend loop.
    pub command_queue_bound: usize,
    /// Capacity of the backend change-feed broadcast.
    pub event_queue_bound: usize,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            flush_on_create: true,
            batch_max_ops: 32,
            batch_max_latency_ms: 75,
            persist_queue_bound: 64,
            snapshot_every_ops: 2000,
            compact_after_snapshot: false,
            command_queue_bound: 256,
            event_queue_bound: 1024,
        }
    }
}

/// Application-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Backend loop tuning.
    pub backend: BackendConfig,
    /// SQLite journal location; `None` keeps everything in memory.
    pub database_path: Option<PathBuf>,
    /// Capacity of the notice broadcast channel.
    pub notice_capacity: usize,
    /// Auto-hide delay for transient messages and animations.
    pub transient_message_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            database_path: None,
            notice_capacity: 64,
            transient_message_ms: 5_000,
        }
    }
}

impl SyncConfig {
    /// Parses a TOML document; missing keys keep their defaults.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Reads and parses a TOML file.
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }
}
