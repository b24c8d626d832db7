//! Infrastructure layer module
//!
//! Process-level concerns that sit outside the domain:
//! - Configuration management
//! - Logging
pub mod config;
pub mod logging;
