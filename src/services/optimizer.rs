//! Optimizer: canned remediations and append-only content changes.
//!
//! Every change to a blueprint's content goes through here. Content is only
//! ever appended, behind a marker comment naming what was added, and each
//! append is charged to the blueprint's token budget.

use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    token_cost, Blueprint, Hole, HoleStatus, HoleType, LimitsConfig, Optimization,
};
use crate::domain::ports::BlueprintStore;
use crate::services::event_bus::{EventBus, EventPayload};

/// Improvement credited to a free-form optimization.
pub const OPTIMIZATION_IMPROVEMENT_SCORE: f64 = 0.1;

/// A canned fix for one hole category.
#[derive(Debug, Clone, PartialEq)]
pub struct Remediation {
    pub source: String,
    pub description: String,
    pub patch_text: String,
    pub improvement_score: f64,
    pub token_cost: u64,
}

/// What a successful patch changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppliedPatch {
    pub hole_id: Uuid,
    pub hole_type: HoleType,
    pub tokens_charged: u64,
}

struct Template {
    source: &'static str,
    description: &'static str,
    patch: &'static str,
    improvement: f64,
}

const fn template(source: &'static str, description: &'static str, patch: &'static str, improvement: f64) -> Template {
    Template {
        source,
        description,
        patch,
        improvement,
    }
}

/// Static remediation catalog. Section-structure holes have no template.
fn catalog(hole_type: HoleType) -> Option<Template> {
    let entry = match hole_type {
        HoleType::MissingErrorHandling => template(
            "reliability-patterns",
            "Describe failure reporting and recovery",
            "Error handling: on failure the operation stops, reports a clear error to the caller \
             and leaves state unchanged. Recoverable errors use the last known good value.",
            0.2,
        ),
        HoleType::UnhandledEdgeCase => template(
            "reliability-patterns",
            "Cover empty, missing and duplicate values",
            "Edge cases: empty or missing values are rejected with a descriptive error. Duplicate \
             submissions are ignored, and zero is treated as a valid amount.",
            0.15,
        ),
        HoleType::UnvalidatedInput => template(
            "secure-design-checklist",
            "Validate external data at the boundary",
            "Input validation: external input is validated against a schema and rejected on \
             mismatch before use.",
            0.25,
        ),
        HoleType::UnstatedAssumption => template(
            "design-review-guide",
            "Turn assumptions into checked preconditions",
            "Preconditions: the service verifies its preconditions at startup and reports a clear \
             error for a violated precondition.",
            0.1,
        ),
        HoleType::ScalabilityGap => template(
            "capacity-planning-guide",
            "State the scaling strategy",
            "Capacity: the design scales horizontally behind a load balancer, with a shared cache \
             and a bounded connection pool.",
            0.15,
        ),
        HoleType::UnboundedWork => template(
            "capacity-planning-guide",
            "Cap work that grows with data volume",
            "Work limits: batch processing is capped at a maximum page size, with pagination for \
             larger result sets.",
            0.15,
        ),
        HoleType::MissingBounds => template(
            "interface-contracts",
            "Declare accepted value ranges",
            "Bounds: numeric settings declare a minimum and a maximum, and out-of-range values are \
             rejected.",
            0.1,
        ),
        HoleType::UnboundedSize => template(
            "interface-contracts",
            "Limit variable-length values",
            "Size limits: variable-length values have a maximum length, and oversized values are \
             rejected with a clear error.",
            0.15,
        ),
        HoleType::InjectionRisk => template(
            "secure-design-checklist",
            "Use parameterized data access",
            "Injection safety: data access uses parameterized queries with bound placeholders, and \
             interpolated values are escaped.",
            0.3,
        ),
        HoleType::SensitiveDataExposure => template(
            "secure-design-checklist",
            "Protect secrets at rest and in transit",
            "Secret handling: secrets are encrypted at rest, transmitted over TLS and redacted from \
             logs.",
            0.25,
        ),
        HoleType::MissingAuthorization => template(
            "secure-design-checklist",
            "Guard privileged operations",
            "Access control: privileged operations require an authenticated session and a role with \
             the matching permission.",
            0.25,
        ),
        HoleType::Contradiction => template(
            "design-review-guide",
            "Resolve conflicting statements",
            "Consistency note: where two statements conflict, the later and more specific statement \
             takes precedence.",
            0.1,
        ),
        HoleType::UnresolvedMarker => template(
            "design-review-guide",
            "Track open items explicitly",
            "Open items: outstanding decisions are tracked in the project issue tracker with an owner \
             and a due date.",
            0.1,
        ),
        HoleType::VagueLanguage => template(
            "design-review-guide",
            "Replace hedges with decisions",
            "Clarification: hedged statements above are replaced by the concrete decisions recorded \
             in this section.",
            0.1,
        ),
        HoleType::MissingSetup => template(
            "operations-runbook",
            "Document installation and configuration",
            "Setup: install the dependencies, configure them through environment variables and \
             verify the migrations before first start.",
            0.15,
        ),
        HoleType::UnbalancedConditionals => template(
            "design-review-guide",
            "Describe the alternative paths",
            "Alternatives: otherwise the system uses the documented fallback behaviour.",
            0.1,
        ),
        HoleType::MissingRollback => template(
            "operations-runbook",
            "Plan for reverting destructive steps",
            "Rollback: a snapshot is taken before destructive steps, and the restore procedure is \
             rehearsed.",
            0.2,
        ),
        HoleType::UnverifiedActions => template(
            "operations-runbook",
            "Verify the outcome of actions",
            "Verification: a step's outcome is verified, and a check confirms it before the next \
             step starts.",
            0.15,
        ),
        HoleType::MissingLogging => template(
            "operations-runbook",
            "Add observability",
            "Observability: significant events are logged with structured fields, and metrics feed \
             an alerting monitor.",
            0.1,
        ),
        HoleType::MissingRetry => template(
            "reliability-patterns",
            "Retry transient failures",
            "Retries: transient network failures are retried with exponential backoff and \
             idempotent operations.",
            0.15,
        ),
        HoleType::MissingTimeout => template(
            "reliability-patterns",
            "Bound asynchronous work",
            "Timeouts: background work carries a deadline and a cancellation path, and aborts \
             cleanly on timeout.",
            0.15,
        ),
        HoleType::EmptySection | HoleType::DuplicateSection => return None,
    };
    Some(entry)
}

fn patch_block(hole_type: HoleType, patch_text: &str) -> String {
    format!("\n\n<!-- percolator:patch {} -->\n{}\n", hole_type.as_str(), patch_text)
}

fn optimization_block(source: &str, content: &str) -> String {
    format!("\n\n<!-- percolator:optimization {source} -->\n{content}\n")
}

pub struct Optimizer<S: BlueprintStore> {
    store: Arc<S>,
    events: Arc<EventBus>,
    limits: LimitsConfig,
}

impl<S: BlueprintStore> Optimizer<S> {
    pub fn new(store: Arc<S>, events: Arc<EventBus>, limits: LimitsConfig) -> Self {
        Self {
            store,
            events,
            limits,
        }
    }

    /// Look up the canned remediation for a hole's category.
    ///
    /// Deterministic: the same category always yields the same remediation.
    pub fn research_for_hole(&self, hole: &Hole) -> Option<Remediation> {
        catalog(hole.hole_type).map(|t| Remediation {
            source: t.source.to_string(),
            description: t.description.to_string(),
            patch_text: t.patch.to_string(),
            improvement_score: t.improvement,
            token_cost: token_cost(t.patch),
        })
    }

    /// Append `patch_text` to the blueprint and mark the hole patched.
    pub async fn apply_patch(&self, blueprint_id: Uuid, hole_id: Uuid, patch_text: &str) -> DomainResult<AppliedPatch> {
        let blueprint = self.load_blueprint(blueprint_id).await?;
        let hole = self
            .store
            .get_hole(hole_id)
            .await?
            .ok_or(DomainError::HoleNotFound(hole_id))?;

        if hole.blueprint_id != blueprint_id {
            return Err(DomainError::HoleOwnershipMismatch { hole_id, blueprint_id });
        }
        if hole.status != HoleStatus::Open {
            return Err(DomainError::HoleNotOpen {
                hole_id,
                status: hole.status.as_str().to_string(),
            });
        }

        let patch_len = patch_text.len();
        if patch_len > self.limits.max_patch_bytes {
            return Err(DomainError::BudgetExceeded {
                resource: "patch bytes".to_string(),
                attempted: patch_len as u64,
                limit: self.limits.max_patch_bytes as u64,
            });
        }

        let block = patch_block(hole.hole_type, patch_text);
        let new_content = self.append_within_limit(&blueprint, &block)?;
        let tokens_charged = token_cost(patch_text);

        self.store.update_content(blueprint_id, &new_content, tokens_charged).await?;
        self.store.update_hole_status(hole_id, HoleStatus::Patched).await?;
        self.store
            .log(
                blueprint_id,
                "hole_patched",
                json!({
                    "hole_id": hole_id,
                    "hole_type": hole.hole_type.as_str(),
                    "patch_bytes": patch_len,
                    "tokens_charged": tokens_charged,
                }),
            )
            .await?;

        debug!(%blueprint_id, %hole_id, tokens_charged, "patch applied");
        Ok(AppliedPatch {
            hole_id,
            hole_type: hole.hole_type,
            tokens_charged,
        })
    }

    /// Append free-form optimization content, charging its token cost.
    ///
    /// Rejected without any change when the cost exceeds the remaining budget.
    pub async fn apply_optimization(
        &self,
        blueprint_id: Uuid,
        source: &str,
        description: &str,
        content: &str,
    ) -> DomainResult<Optimization> {
        let blueprint = self.load_blueprint(blueprint_id).await?;

        let cost = token_cost(content);
        let remaining = blueprint.remaining_budget();
        if cost > remaining {
            return Err(DomainError::BudgetExceeded {
                resource: "tokens".to_string(),
                attempted: cost,
                limit: remaining,
            });
        }

        let block = optimization_block(source, content);
        let new_content = self.append_within_limit(&blueprint, &block)?;

        let optimization = Optimization::new(
            blueprint_id,
            source,
            description,
            OPTIMIZATION_IMPROVEMENT_SCORE,
            cost,
        );
        self.store.update_content(blueprint_id, &new_content, cost).await?;
        self.store.create_optimization(&optimization).await?;
        self.store
            .log(
                blueprint_id,
                "optimization_applied",
                json!({
                    "optimization_id": optimization.id,
                    "source": source,
                    "description": description,
                    "token_cost": cost,
                }),
            )
            .await?;

        info!(%blueprint_id, source, token_cost = cost, "optimization applied");
        self.events.emit(
            blueprint_id,
            EventPayload::OptimizationApplied {
                optimization_id: optimization.id,
                source: source.to_string(),
                token_cost: cost,
            },
        );

        Ok(optimization)
    }

    async fn load_blueprint(&self, id: Uuid) -> DomainResult<Blueprint> {
        self.store
            .get_blueprint(id)
            .await?
            .ok_or(DomainError::BlueprintNotFound(id))
    }

    fn append_within_limit(&self, blueprint: &Blueprint, block: &str) -> DomainResult<String> {
        let attempted = blueprint.current_content.len() + block.len();
        if attempted > self.limits.max_content_bytes {
            return Err(DomainError::BudgetExceeded {
                resource: "content bytes".to_string(),
                attempted: attempted as u64,
                limit: self.limits.max_content_bytes as u64,
            });
        }
        let mut content = String::with_capacity(attempted);
        content.push_str(&blueprint.current_content);
        content.push_str(block);
        Ok(content)
    }
}
