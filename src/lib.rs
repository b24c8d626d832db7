//! Percolator - iterative blueprint hardening
//!
//! A blueprint is a free-text design document. Percolation runs it through
//! rounds of stress tests and static analysis, patches the holes it finds
//! within a token budget, and reports a confidence score.
//!
//! # Architecture
//!
//! This crate follows Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): models, errors and the storage port
//! - **Adapters** (`adapters`): SQLite implementation of the storage port
//! - **Service Layer** (`services`): analyzers, stress tester, hole finder,
//!   optimizer, confidence scorer and the percolation engine
//! - **Infrastructure Layer** (`infrastructure`): configuration and logging
//! - **CLI Layer** (`cli`): Command-line interface
//!
//! # Example
//!
//! ```ignore
//! use percolator::adapters::sqlite::{initialize_database, SqliteBlueprintStore};
//! use percolator::services::{BlueprintService, EventBus, PercolationEngine};
//!
//! let pool = initialize_database(&config.database).await?;
//! let store = Arc::new(SqliteBlueprintStore::new(pool));
//! let blueprint = BlueprintService::new(store.clone(), config.percolation.depths.clone(), config.limits)
//!     .submit(content, PercolationDepth::Standard)
//!     .await?;
//! let engine = PercolationEngine::new(store, Arc::new(EventBus::default()), config.percolation, config.limits);
//! let outcome = engine.percolate(blueprint.id).await?;
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{DomainError, DomainResult, ErrorKind};
pub use domain::models::{
    Blueprint, BlueprintStatus, Config, DatabaseConfig, Hole, HoleSeverity, HoleStatus, HoleType,
    LimitsConfig, LoggingConfig, Optimization, PercolationConfig, PercolationDepth, StressTestRun,
    TestCategory,
};
pub use domain::ports::BlueprintStore;
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{BlueprintService, ConfidenceScorer, EventBus, PercolationEngine, PercolationOutcome};
