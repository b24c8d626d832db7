//! Content analyzers.
//!
//! Every analyzer is a deterministic function of `(content, intensity)`. It
//! looks for the presence or absence of category vocabulary and turns each
//! triggered condition into a finding. A finding only becomes a hole
//! candidate when the intensity reaches the condition's gate; ungated
//! conditions escalate at any intensity.

pub mod battery;
pub mod stress;
pub mod vocabulary;

pub use battery::{run_battery, AnalysisDepth};
pub use stress::default_analyzers;
pub use vocabulary::TermSet;

use crate::domain::models::{HoleCandidate, HoleSeverity, HoleType, TestCategory};

/// Pluggable detector for one stress-test category.
pub trait Analyzer: Send + Sync {
    fn category(&self) -> TestCategory;

    fn analyze(&self, content: &str, intensity: u8) -> AnalysisOutcome;
}

/// What an analyzer observed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalysisOutcome {
    pub findings: Vec<String>,
    pub candidates: Vec<HoleCandidate>,
}

impl AnalysisOutcome {
    /// A run passes iff no condition escalated to a hole.
    pub fn passed(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Record a triggered condition.
    pub fn trigger(
        &mut self,
        condition: &Condition,
        intensity: u8,
        detail: impl Into<String>,
        location: Option<String>,
    ) {
        let detail = detail.into();
        if condition.escalates_at(intensity) {
            self.findings.push(format!("[{}] {}", condition.severity, detail));
            let mut candidate = HoleCandidate::new(condition.hole_type, condition.severity, detail)
                .with_suggested_fix(condition.suggested_fix);
            candidate.location = location;
            self.candidates.push(candidate);
        } else {
            self.findings.push(format!(
                "[below gate {}] {}",
                condition.gate.unwrap_or_default(),
                detail
            ));
        }
    }
}

/// A detectable weakness and the intensity needed to report it as a hole.
#[derive(Debug, Clone, Copy)]
pub struct Condition {
    pub hole_type: HoleType,
    pub severity: HoleSeverity,
    /// Minimum intensity to escalate; `None` escalates unconditionally.
    pub gate: Option<u8>,
    pub suggested_fix: &'static str,
}

impl Condition {
    pub const fn gated(
        hole_type: HoleType,
        severity: HoleSeverity,
        gate: u8,
        suggested_fix: &'static str,
    ) -> Self {
        Self {
            hole_type,
            severity,
            gate: Some(gate),
            suggested_fix,
        }
    }

    pub const fn ungated(hole_type: HoleType, severity: HoleSeverity, suggested_fix: &'static str) -> Self {
        Self {
            hole_type,
            severity,
            gate: None,
            suggested_fix,
        }
    }

    pub fn escalates_at(&self, intensity: u8) -> bool {
        self.gate.map_or(true, |gate| intensity >= gate)
    }
}
