//! Configuration management infrastructure
//!
//! Hierarchical configuration using figment:
//! - Serialized defaults
//! - `.percolator/config.yaml` and `.percolator/local.yaml`
//! - `PERCOLATOR_` environment variable overrides
//! - Validation after extraction

pub mod loader;

pub use loader::{ConfigError, ConfigLoader, CONFIG_DIR};
