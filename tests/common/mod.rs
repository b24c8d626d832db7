//! Common test utilities for integration tests
//!
//! Provides a fully wired engine over an in-memory database so each test
//! starts from an empty store.

#![allow(dead_code)]

use std::sync::Arc;

use percolator::adapters::sqlite::{create_migrated_test_pool, SqliteBlueprintStore};
use percolator::domain::models::{Blueprint, DepthTable, LimitsConfig, PercolationConfig, PercolationDepth};
use percolator::services::{BlueprintService, EventBus, EventBusConfig, PercolationEngine};

/// Setup test logging
///
/// Call this at the beginning of tests that need logging.
pub fn setup_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

pub fn percolation_config(timeout_ms: u64, max_concurrent: usize) -> PercolationConfig {
    PercolationConfig {
        max_concurrent_percolations: max_concurrent,
        timeout_ms,
        event_channel_capacity: 4096,
        depths: DepthTable::default(),
    }
}

pub struct Harness {
    pub store: Arc<SqliteBlueprintStore>,
    pub events: Arc<EventBus>,
    pub engine: Arc<PercolationEngine<SqliteBlueprintStore>>,
    pub service: BlueprintService<SqliteBlueprintStore>,
}

impl Harness {
    pub async fn new(config: PercolationConfig) -> Self {
        setup_test_logging();
        let pool = create_migrated_test_pool().await.expect("Failed to create test pool");
        let store = Arc::new(SqliteBlueprintStore::new(pool));
        let events = Arc::new(EventBus::new(EventBusConfig {
            channel_capacity: config.event_channel_capacity,
        }));
        let service = BlueprintService::new(store.clone(), config.depths.clone(), LimitsConfig::default());
        let engine = Arc::new(PercolationEngine::new(
            store.clone(),
            events.clone(),
            config,
            LimitsConfig::default(),
        ));
        Self {
            store,
            events,
            engine,
            service,
        }
    }

    pub async fn submit(&self, content: &str, depth: PercolationDepth) -> Blueprint {
        self.service.submit(content, depth).await.expect("Failed to submit blueprint")
    }
}

/// A hedged plan with an open marker and no failure handling.
pub const LEAKY_PLAN: &str = "# Plan\nTODO: pick a store. Maybe cache results, etc.";
