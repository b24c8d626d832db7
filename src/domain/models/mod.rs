//! Domain models for the percolator.

pub mod blueprint;
pub mod config;
pub mod hole;
pub mod optimization;

pub use blueprint::{
    token_cost, Blueprint, BlueprintStatus, DepthProfile, DepthTable, PercolationDepth,
};
pub use config::{Config, DatabaseConfig, LimitsConfig, LoggingConfig, PercolationConfig};
pub use hole::{Hole, HoleCandidate, HoleSeverity, HoleStatus, HoleType};
pub use optimization::{Optimization, PercolationLogEntry};
pub use stress_test::{StressTestRun, TestCategory, MAX_INTENSITY, MIN_INTENSITY};
