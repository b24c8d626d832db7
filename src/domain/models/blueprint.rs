//! Blueprint domain model.
//!
//! A blueprint is the text artifact under iterative improvement. Its content
//! only ever grows during a session and its status moves strictly forward.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};

/// Lifecycle status of a blueprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BlueprintStatus {
    /// Submitted, waiting for a percolation run
    #[default]
    Pending,
    /// A percolation run owns this blueprint
    Percolating,
    /// Percolation finished and a confidence score was recorded
    Completed,
    /// Percolation aborted on an unrecovered error
    Failed,
}

impl BlueprintStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Percolating => "percolating",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "percolating" => Some(Self::Percolating),
            "completed" | "complete" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Valid transitions from this status.
    pub fn valid_transitions(&self) -> &'static [BlueprintStatus] {
        match self {
            Self::Pending => &[Self::Percolating],
            Self::Percolating => &[Self::Completed, Self::Failed],
            Self::Completed | Self::Failed => &[],
        }
    }

    pub fn can_transition_to(&self, new_status: Self) -> bool {
        self.valid_transitions().contains(&new_status)
    }
}

impl std::fmt::Display for BlueprintStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named preset controlling budget, iteration count and research-query cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PercolationDepth {
    Quick,
    #[default]
    Standard,
    Thorough,
    Exhaustive,
}

impl PercolationDepth {
    pub const ALL: [PercolationDepth; 4] =
        [Self::Quick, Self::Standard, Self::Thorough, Self::Exhaustive];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Quick => "quick",
            Self::Standard => "standard",
            Self::Thorough => "thorough",
            Self::Exhaustive => "exhaustive",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "quick" => Some(Self::Quick),
            "standard" => Some(Self::Standard),
            "thorough" => Some(Self::Thorough),
            "exhaustive" => Some(Self::Exhaustive),
            _ => None,
        }
    }
}

impl std::fmt::Display for PercolationDepth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resource envelope for one depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepthProfile {
    pub budget_tokens: u64,
    pub stress_test_iterations: u32,
    /// Maximum research queries per run; `-1` means unlimited.
    pub research_query_cap: i64,
}

impl DepthProfile {
    pub const fn new(budget_tokens: u64, stress_test_iterations: u32, research_query_cap: i64) -> Self {
        Self {
            budget_tokens,
            stress_test_iterations,
            research_query_cap,
        }
    }

    /// Research-query cap as an optional limit (`None` = unlimited).
    pub fn research_limit(&self) -> Option<u32> {
        u32::try_from(self.research_query_cap).ok()
    }
}

/// The depth table: one profile per [`PercolationDepth`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepthTable {
    #[serde(default = "default_quick")]
    pub quick: DepthProfile,
    #[serde(default = "default_standard")]
    pub standard: DepthProfile,
    #[serde(default = "default_thorough")]
    pub thorough: DepthProfile,
    #[serde(default = "default_exhaustive")]
    pub exhaustive: DepthProfile,
}

const fn default_quick() -> DepthProfile {
    DepthProfile::new(1_000, 3, 1)
}

const fn default_standard() -> DepthProfile {
    DepthProfile::new(5_000, 10, 3)
}

const fn default_thorough() -> DepthProfile {
    DepthProfile::new(20_000, 25, 10)
}

const fn default_exhaustive() -> DepthProfile {
    DepthProfile::new(100_000, 100, -1)
}

impl Default for DepthTable {
    fn default() -> Self {
        Self {
            quick: default_quick(),
            standard: default_standard(),
            thorough: default_thorough(),
            exhaustive: default_exhaustive(),
        }
    }
}

impl DepthTable {
    pub fn profile(&self, depth: PercolationDepth) -> DepthProfile {
        match depth {
            PercolationDepth::Quick => self.quick,
            PercolationDepth::Standard => self.standard,
            PercolationDepth::Thorough => self.thorough,
            PercolationDepth::Exhaustive => self.exhaustive,
        }
    }
}

/// A blueprint under percolation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Blueprint {
    pub id: Uuid,
    /// Snapshot taken at submission; never modified.
    pub original_content: String,
    /// Working copy; patches and optimizations are appended.
    pub current_content: String,
    pub status: BlueprintStatus,
    pub depth: PercolationDepth,
    pub budget_tokens: u64,
    pub tokens_used: u64,
    pub confidence_score: f64,
    pub submitted_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Blueprint {
    pub fn new(content: impl Into<String>, depth: PercolationDepth, budget_tokens: u64) -> Self {
        let content = content.into();
        Self {
            id: Uuid::new_v4(),
            original_content: content.clone(),
            current_content: content,
            status: BlueprintStatus::Pending,
            depth,
            budget_tokens,
            tokens_used: 0,
            confidence_score: 0.0,
            submitted_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Tokens still available; never underflows.
    pub fn remaining_budget(&self) -> u64 {
        self.budget_tokens.saturating_sub(self.tokens_used)
    }

    /// Move to `new_status`, enforcing the forward-only lifecycle.
    pub fn transition_to(&mut self, new_status: BlueprintStatus) -> DomainResult<()> {
        if !self.status.can_transition_to(new_status) {
            return Err(DomainError::InvalidStateTransition {
                from: self.status.as_str().to_string(),
                to: new_status.as_str().to_string(),
                reason: format!("blueprint {} is {}", self.id, self.status),
            });
        }
        self.status = new_status;
        if new_status.is_terminal() {
            self.completed_at = Some(Utc::now());
        }
        Ok(())
    }
}

/// Token cost of appending `text`: one token per four bytes, rounded up.
pub fn token_cost(text: &str) -> u64 {
    (text.len() as u64).div_ceil(4)
}
