//! Hole finder: runs the graded battery and persists what it finds.

use std::sync::Arc;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::Hole;
use crate::domain::ports::BlueprintStore;
use crate::services::analyzers::{run_battery, AnalysisDepth};

pub struct HoleFinder<S: BlueprintStore> {
    store: Arc<S>,
}

impl<S: BlueprintStore> HoleFinder<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Analyze the blueprint's current content and persist every hole found.
    ///
    /// Repeated calls on unchanged content create duplicate holes.
    #[instrument(skip(self))]
    pub async fn analyze(&self, blueprint_id: Uuid, depth: AnalysisDepth) -> DomainResult<Vec<Hole>> {
        let blueprint = self
            .store
            .get_blueprint(blueprint_id)
            .await?
            .ok_or(DomainError::BlueprintNotFound(blueprint_id))?;

        let candidates = run_battery(&blueprint.current_content, depth);
        let mut holes = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let hole = candidate.into_hole(blueprint_id);
            self.store.create_hole(&hole).await?;
            holes.push(hole);
        }

        debug!(%blueprint_id, holes = holes.len(), "hole analysis finished");
        Ok(holes)
    }
}
