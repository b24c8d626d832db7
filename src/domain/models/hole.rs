//! Hole domain model.
//!
//! A hole is a recorded weakness found in a blueprint's content, created by
//! the stress tester or the hole finder and closed by patch application.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Category tag for a hole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HoleType {
    // Stress tester categories
    MissingErrorHandling,
    UnhandledEdgeCase,
    UnvalidatedInput,
    UnstatedAssumption,
    ScalabilityGap,
    UnboundedWork,
    MissingBounds,
    UnboundedSize,
    InjectionRisk,
    SensitiveDataExposure,
    MissingAuthorization,
    Contradiction,
    DuplicateSection,
    // Hole finder categories
    UnresolvedMarker,
    EmptySection,
    VagueLanguage,
    MissingSetup,
    UnbalancedConditionals,
    MissingRollback,
    UnverifiedActions,
    MissingLogging,
    MissingRetry,
    MissingTimeout,
}

impl HoleType {
    pub const ALL: [HoleType; 23] = [
        Self::MissingErrorHandling,
        Self::UnhandledEdgeCase,
        Self::UnvalidatedInput,
        Self::UnstatedAssumption,
        Self::ScalabilityGap,
        Self::UnboundedWork,
        Self::MissingBounds,
        Self::UnboundedSize,
        Self::InjectionRisk,
        Self::SensitiveDataExposure,
        Self::MissingAuthorization,
        Self::Contradiction,
        Self::DuplicateSection,
        Self::UnresolvedMarker,
        Self::EmptySection,
        Self::VagueLanguage,
        Self::MissingSetup,
        Self::UnbalancedConditionals,
        Self::MissingRollback,
        Self::UnverifiedActions,
        Self::MissingLogging,
        Self::MissingRetry,
        Self::MissingTimeout,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingErrorHandling => "missing_error_handling",
            Self::UnhandledEdgeCase => "unhandled_edge_case",
            Self::UnvalidatedInput => "unvalidated_input",
            Self::UnstatedAssumption => "unstated_assumption",
            Self::ScalabilityGap => "scalability_gap",
            Self::UnboundedWork => "unbounded_work",
            Self::MissingBounds => "missing_bounds",
            Self::UnboundedSize => "unbounded_size",
            Self::InjectionRisk => "injection_risk",
            Self::SensitiveDataExposure => "sensitive_data_exposure",
            Self::MissingAuthorization => "missing_authorization",
            Self::Contradiction => "contradiction",
            Self::DuplicateSection => "duplicate_section",
            Self::UnresolvedMarker => "unresolved_marker",
            Self::EmptySection => "empty_section",
            Self::VagueLanguage => "vague_language",
            Self::MissingSetup => "missing_setup",
            Self::UnbalancedConditionals => "unbalanced_conditionals",
            Self::MissingRollback => "missing_rollback",
            Self::UnverifiedActions => "unverified_actions",
            Self::MissingLogging => "missing_logging",
            Self::MissingRetry => "missing_retry",
            Self::MissingTimeout => "missing_timeout",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        let parsed = match s {
            "missing_error_handling" => Self::MissingErrorHandling,
            "unhandled_edge_case" => Self::UnhandledEdgeCase,
            "unvalidated_input" => Self::UnvalidatedInput,
            "unstated_assumption" => Self::UnstatedAssumption,
            "scalability_gap" => Self::ScalabilityGap,
            "unbounded_work" => Self::UnboundedWork,
            "missing_bounds" => Self::MissingBounds,
            "unbounded_size" => Self::UnboundedSize,
            "injection_risk" => Self::InjectionRisk,
            "sensitive_data_exposure" => Self::SensitiveDataExposure,
            "missing_authorization" => Self::MissingAuthorization,
            "contradiction" => Self::Contradiction,
            "duplicate_section" => Self::DuplicateSection,
            "unresolved_marker" => Self::UnresolvedMarker,
            "empty_section" => Self::EmptySection,
            "vague_language" => Self::VagueLanguage,
            "missing_setup" => Self::MissingSetup,
            "unbalanced_conditionals" => Self::UnbalancedConditionals,
            "missing_rollback" => Self::MissingRollback,
            "unverified_actions" => Self::UnverifiedActions,
            "missing_logging" => Self::MissingLogging,
            "missing_retry" => Self::MissingRetry,
            "missing_timeout" => Self::MissingTimeout,
            _ => return None,
        };
        Some(parsed)
    }
}

impl std::fmt::Display for HoleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How bad a hole is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HoleSeverity {
    Low = 1,
    Medium = 2,
    High = 3,
    Critical = 4,
}

impl HoleSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }
}

impl std::fmt::Display for HoleSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a hole. `Open -> Patched` is one-way; `WontFix` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum HoleStatus {
    #[default]
    Open,
    Patched,
    WontFix,
}

impl HoleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Patched => "patched",
            Self::WontFix => "wont_fix",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "open" => Some(Self::Open),
            "patched" => Some(Self::Patched),
            "wont_fix" | "wontfix" => Some(Self::WontFix),
            _ => None,
        }
    }

    pub fn can_transition_to(&self, new_status: Self) -> bool {
        matches!(
            (self, new_status),
            (Self::Open, Self::Patched) | (Self::Open, Self::WontFix)
        )
    }
}

impl std::fmt::Display for HoleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A detected condition before it is persisted as a [`Hole`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoleCandidate {
    pub hole_type: HoleType,
    pub description: String,
    pub severity: HoleSeverity,
    pub location: Option<String>,
    pub suggested_fix: Option<String>,
}

impl HoleCandidate {
    pub fn new(hole_type: HoleType, severity: HoleSeverity, description: impl Into<String>) -> Self {
        Self {
            hole_type,
            description: description.into(),
            severity,
            location: None,
            suggested_fix: None,
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_suggested_fix(mut self, fix: impl Into<String>) -> Self {
        self.suggested_fix = Some(fix.into());
        self
    }

    /// Materialize into an open hole owned by `blueprint_id`.
    pub fn into_hole(self, blueprint_id: Uuid) -> Hole {
        Hole {
            id: Uuid::new_v4(),
            blueprint_id,
            hole_type: self.hole_type,
            description: self.description,
            severity: self.severity,
            status: HoleStatus::Open,
            location: self.location,
            suggested_fix: self.suggested_fix,
            identified_at: Utc::now(),
            patched_at: None,
        }
    }
}

/// A persisted weakness in a blueprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hole {
    pub id: Uuid,
    pub blueprint_id: Uuid,
    pub hole_type: HoleType,
    pub description: String,
    pub severity: HoleSeverity,
    pub status: HoleStatus,
    pub location: Option<String>,
    pub suggested_fix: Option<String>,
    pub identified_at: DateTime<Utc>,
    pub patched_at: Option<DateTime<Utc>>,
}

impl Hole {
    pub fn is_open(&self) -> bool {
        self.status == HoleStatus::Open
    }
}
