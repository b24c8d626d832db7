//! Optimization and audit-log records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A free-form improvement applied outside the hole-patch mechanism.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Optimization {
    pub id: Uuid,
    pub blueprint_id: Uuid,
    pub source: String,
    pub description: String,
    pub improvement_score: f64,
    pub token_cost: u64,
    pub created_at: DateTime<Utc>,
}

impl Optimization {
    pub fn new(
        blueprint_id: Uuid,
        source: impl Into<String>,
        description: impl Into<String>,
        improvement_score: f64,
        token_cost: u64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            blueprint_id,
            source: source.into(),
            description: description.into(),
            improvement_score,
            token_cost,
            created_at: Utc::now(),
        }
    }
}

/// Append-only audit entry recording one engine decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PercolationLogEntry {
    pub id: i64,
    pub blueprint_id: Uuid,
    pub action: String,
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}
