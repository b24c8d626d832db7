//! Blueprint store port.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{
    Blueprint, BlueprintStatus, Hole, HoleStatus, Optimization, PercolationLogEntry,
    StressTestRun,
};

/// Persistence interface for blueprints and everything recorded against them.
///
/// Individual operations are serialized by the implementation; there is no
/// cross-operation transaction. Callers that read-then-write the same
/// blueprint must make sure nobody else mutates it concurrently.
#[async_trait]
pub trait BlueprintStore: Send + Sync {
    /// Persist a new blueprint.
    async fn create_blueprint(&self, blueprint: &Blueprint) -> DomainResult<()>;

    /// Get a blueprint by ID.
    async fn get_blueprint(&self, id: Uuid) -> DomainResult<Option<Blueprint>>;

    /// Replace the current content and add `tokens_delta` to `tokens_used`.
    async fn update_content(&self, id: Uuid, content: &str, tokens_delta: u64) -> DomainResult<()>;

    /// Set the status, and the confidence score when one is given.
    ///
    /// Terminal statuses stamp `completed_at`.
    async fn update_status(
        &self,
        id: Uuid,
        status: BlueprintStatus,
        confidence: Option<f64>,
    ) -> DomainResult<()>;

    /// List blueprints, newest first.
    async fn list_blueprints(
        &self,
        status: Option<BlueprintStatus>,
        limit: usize,
    ) -> DomainResult<Vec<Blueprint>>;

    async fn create_hole(&self, hole: &Hole) -> DomainResult<()>;

    async fn get_hole(&self, id: Uuid) -> DomainResult<Option<Hole>>;

    /// Set a hole's status; `patched` stamps `patched_at`.
    async fn update_hole_status(&self, id: Uuid, status: HoleStatus) -> DomainResult<()>;

    /// Holes of a blueprint in identification order, optionally by status.
    async fn get_holes_for_blueprint(
        &self,
        blueprint_id: Uuid,
        status: Option<HoleStatus>,
    ) -> DomainResult<Vec<Hole>>;

    async fn count_open_holes(&self, blueprint_id: Uuid) -> DomainResult<u64>;

    async fn create_stress_test(&self, run: &StressTestRun) -> DomainResult<()>;

    async fn get_stress_tests_for_blueprint(&self, blueprint_id: Uuid) -> DomainResult<Vec<StressTestRun>>;

    async fn create_optimization(&self, optimization: &Optimization) -> DomainResult<()>;

    async fn get_optimizations_for_blueprint(&self, blueprint_id: Uuid) -> DomainResult<Vec<Optimization>>;

    /// Append an audit entry.
    async fn log(&self, blueprint_id: Uuid, action: &str, details: serde_json::Value) -> DomainResult<()>;

    /// Audit entries of a blueprint in insertion order.
    async fn get_logs_for_blueprint(&self, blueprint_id: Uuid) -> DomainResult<Vec<PercolationLogEntry>>;
}
