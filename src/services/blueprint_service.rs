//! Blueprint submission and read-side queries.

use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    Blueprint, BlueprintStatus, DepthTable, Hole, HoleStatus, LimitsConfig, Optimization,
    PercolationDepth, PercolationLogEntry, StressTestRun,
};
use crate::domain::ports::BlueprintStore;
use crate::services::confidence::{ConfidenceBreakdown, ConfidenceScorer};

/// A blueprint together with its recomputed confidence breakdown.
#[derive(Debug, Clone, Serialize)]
pub struct BlueprintReport {
    pub blueprint: Blueprint,
    pub breakdown: ConfidenceBreakdown,
}

pub struct BlueprintService<S: BlueprintStore> {
    store: Arc<S>,
    depths: DepthTable,
    limits: LimitsConfig,
}

impl<S: BlueprintStore> BlueprintService<S> {
    pub fn new(store: Arc<S>, depths: DepthTable, limits: LimitsConfig) -> Self {
        Self {
            store,
            depths,
            limits,
        }
    }

    /// Submit new content as a pending blueprint.
    pub async fn submit(&self, content: &str, depth: PercolationDepth) -> DomainResult<Blueprint> {
        if content.trim().is_empty() {
            return Err(DomainError::ValidationFailed(
                "blueprint content cannot be empty".to_string(),
            ));
        }
        if content.len() > self.limits.max_content_bytes {
            return Err(DomainError::ValidationFailed(format!(
                "blueprint content is {} bytes, limit is {}",
                content.len(),
                self.limits.max_content_bytes
            )));
        }

        let profile = self.depths.profile(depth);
        let blueprint = Blueprint::new(content, depth, profile.budget_tokens);
        self.store.create_blueprint(&blueprint).await?;
        self.store
            .log(
                blueprint.id,
                "blueprint_submitted",
                json!({
                    "depth": depth.as_str(),
                    "budget_tokens": blueprint.budget_tokens,
                    "content_bytes": content.len(),
                }),
            )
            .await?;

        info!(blueprint_id = %blueprint.id, depth = %depth, "blueprint submitted");
        Ok(blueprint)
    }

    pub async fn get(&self, id: Uuid) -> DomainResult<Blueprint> {
        self.store
            .get_blueprint(id)
            .await?
            .ok_or(DomainError::BlueprintNotFound(id))
    }

    pub async fn list(&self, status: Option<BlueprintStatus>, limit: usize) -> DomainResult<Vec<Blueprint>> {
        self.store.list_blueprints(status, limit).await
    }

    pub async fn holes(&self, id: Uuid, status: Option<HoleStatus>) -> DomainResult<Vec<Hole>> {
        self.get(id).await?;
        self.store.get_holes_for_blueprint(id, status).await
    }

    pub async fn stress_tests(&self, id: Uuid) -> DomainResult<Vec<StressTestRun>> {
        self.get(id).await?;
        self.store.get_stress_tests_for_blueprint(id).await
    }

    pub async fn optimizations(&self, id: Uuid) -> DomainResult<Vec<Optimization>> {
        self.get(id).await?;
        self.store.get_optimizations_for_blueprint(id).await
    }

    pub async fn logs(&self, id: Uuid) -> DomainResult<Vec<PercolationLogEntry>> {
        self.get(id).await?;
        self.store.get_logs_for_blueprint(id).await
    }

    /// Blueprint plus a confidence breakdown recomputed from its history.
    pub async fn report(&self, id: Uuid) -> DomainResult<BlueprintReport> {
        let blueprint = self.get(id).await?;
        let holes = self.store.get_holes_for_blueprint(id, None).await?;
        let tests = self.store.get_stress_tests_for_blueprint(id).await?;
        let optimizations = self.store.get_optimizations_for_blueprint(id).await?;
        let breakdown = ConfidenceScorer::new().breakdown(&holes, &tests, &optimizations);
        Ok(BlueprintReport {
            blueprint,
            breakdown,
        })
    }
}
