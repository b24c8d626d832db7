use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::blueprint::DepthTable;

/// Main configuration structure for the percolator
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Percolation engine configuration
    #[serde(default)]
    pub percolation: PercolationConfig,

    /// Content and patch size limits
    #[serde(default)]
    pub limits: LimitsConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseConfig {
    /// Path to `SQLite` database file
    #[serde(default = "default_database_path")]
    pub path: String,

    /// Maximum number of database connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> String {
    ".percolator/percolator.db".to_string()
}

const fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

impl DatabaseConfig {
    /// `sqlx` connection URL for the configured path.
    pub fn url(&self) -> String {
        format!("sqlite:{}", self.path)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rotated JSON log files (stderr only when unset)
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
        }
    }
}

/// Percolation engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PercolationConfig {
    /// Maximum number of percolations running at once
    #[serde(default = "default_max_concurrent_percolations")]
    pub max_concurrent_percolations: usize,

    /// Wall-clock limit for one percolation loop, in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Capacity of the lifecycle event channel
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,

    /// Budget, iteration and research presets per depth
    #[serde(default)]
    pub depths: DepthTable,
}

const fn default_max_concurrent_percolations() -> usize {
    5
}

const fn default_timeout_ms() -> u64 {
    300_000
}

const fn default_event_channel_capacity() -> usize {
    1024
}

impl Default for PercolationConfig {
    fn default() -> Self {
        Self {
            max_concurrent_percolations: default_max_concurrent_percolations(),
            timeout_ms: default_timeout_ms(),
            event_channel_capacity: default_event_channel_capacity(),
            depths: DepthTable::default(),
        }
    }
}

/// Size limits applied when content is appended to a blueprint
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LimitsConfig {
    /// Maximum size of a blueprint's current content, in bytes
    #[serde(default = "default_max_content_bytes")]
    pub max_content_bytes: usize,

    /// Maximum size of a single patch, in bytes
    #[serde(default = "default_max_patch_bytes")]
    pub max_patch_bytes: usize,
}

const fn default_max_content_bytes() -> usize {
    1_000_000
}

const fn default_max_patch_bytes() -> usize {
    50_000
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_content_bytes: default_max_content_bytes(),
            max_patch_bytes: default_max_patch_bytes(),
        }
    }
}
