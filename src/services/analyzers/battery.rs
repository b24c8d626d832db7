//! Graded structural and semantic battery used by the hole finder.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use super::vocabulary::{location_of, TermSet};
use crate::domain::models::{HoleCandidate, HoleSeverity, HoleType};

/// How much of the battery to run. Each level includes the previous ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisDepth {
    Shallow,
    Moderate,
    Deep,
}

impl AnalysisDepth {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Shallow => "shallow",
            Self::Moderate => "moderate",
            Self::Deep => "deep",
        }
    }

    /// Depth for a point in the run: shallow for the first third of the
    /// iterations, moderate for the middle third, deep afterwards.
    ///
    /// Boundaries belong to the later band: progress of exactly one third is
    /// moderate and exactly two thirds is deep, so a three-iteration run
    /// never uses the shallow battery.
    pub fn for_progress(iteration: u32, max_iterations: u32) -> Self {
        let max = max_iterations.max(1);
        if iteration.saturating_mul(3) < max {
            Self::Shallow
        } else if iteration.saturating_mul(3) < max.saturating_mul(2) {
            Self::Moderate
        } else {
            Self::Deep
        }
    }
}

impl std::fmt::Display for AnalysisDepth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Content shorter than this is not expected to describe observability.
pub const LOGGING_LENGTH_THRESHOLD: usize = 500;

const VAGUE_TERMS: &[(&str, HoleSeverity)] = &[
    ("somehow", HoleSeverity::High),
    ("maybe", HoleSeverity::Medium),
    ("probably", HoleSeverity::Medium),
    ("perhaps", HoleSeverity::Medium),
    ("as needed", HoleSeverity::Medium),
    ("some kind of", HoleSeverity::Medium),
    ("possibly", HoleSeverity::Low),
    ("might", HoleSeverity::Low),
    ("etc", HoleSeverity::Low),
    ("various", HoleSeverity::Low),
    ("stuff", HoleSeverity::Low),
    ("and so on", HoleSeverity::Low),
];

const DEPENDENCY_TERMS: &[&str] = &[
    "database", "databases", "postgres", "postgresql", "mysql", "redis", "kafka", "rabbitmq",
    "elasticsearch", "s3", "bucket", "library", "libraries", "package", "packages",
    "dependency", "dependencies", "sdk", "third-party",
];
const SETUP_TERMS: &[&str] = &[
    "install", "installed", "installation", "configure", "configured", "configuration",
    "set up", "setup", "provision", "provisioned", "initialize", "initialise", "migration",
    "migrations", "prerequisite", "prerequisites", "environment variable",
    "environment variables",
];
const CONDITIONAL_TERMS: &[&str] = &["if", "when", "unless", "whenever", "in case"];
const ALTERNATIVE_TERMS: &[&str] = &["else", "otherwise", "alternatively", "fallback", "or else"];
const DESTRUCTIVE_TERMS: &[&str] = &[
    "delete", "deletes", "deleting", "drop", "drops", "remove", "removes", "removing",
    "truncate", "purge", "overwrite", "overwrites", "wipe", "destroy", "destroys",
];
const ROLLBACK_TERMS: &[&str] = &[
    "rollback", "roll back", "backup", "backups", "restore", "undo", "revert", "snapshot",
    "snapshots",
];
const ACTION_TERMS: &[&str] = &[
    "create", "creates", "update", "updates", "write", "writes", "send", "sends", "deploy",
    "deploys", "execute", "executes", "run", "runs", "call", "calls", "insert", "inserts",
    "modify", "modifies", "publish", "publishes",
];
const VERIFICATION_TERMS: &[&str] = &[
    "verify", "verifies", "verified", "check", "checks", "confirm", "confirms", "validate",
    "validates", "assert", "asserts", "test", "tests",
];
const LOGGING_TERMS: &[&str] = &[
    "log", "logs", "logging", "logged", "monitor", "monitoring", "metric", "metrics", "trace",
    "tracing", "audit", "alert", "alerts", "alerting", "observability",
];
const NETWORK_TERMS: &[&str] = &[
    "http", "https", "api", "apis", "request", "requests", "fetch", "webhook", "webhooks",
    "network", "remote", "endpoint", "endpoints", "grpc", "external service",
];
const RETRY_TERMS: &[&str] = &[
    "retry", "retries", "retried", "retrying", "backoff", "back off", "circuit breaker",
    "idempotent",
];
const ASYNC_TERMS: &[&str] = &[
    "async", "asynchronous", "asynchronously", "await", "background", "concurrent",
    "concurrently", "parallel", "queue", "queues", "worker", "workers", "job", "jobs",
];
const TIMEOUT_TERMS: &[&str] = &[
    "timeout", "timeouts", "time out", "deadline", "deadlines", "cancel", "cancels",
    "cancellation", "abort", "aborts",
];

static MARKERS: LazyLock<TermSet> =
    LazyLock::new(|| TermSet::case_sensitive(&["TODO", "FIXME", "XXX", "HACK", "TBD"]));
static VAGUE: LazyLock<TermSet> = LazyLock::new(|| {
    let terms: Vec<&str> = VAGUE_TERMS.iter().map(|(t, _)| *t).collect();
    TermSet::new(&terms)
});
static DEPENDENCIES: LazyLock<TermSet> = LazyLock::new(|| TermSet::new(DEPENDENCY_TERMS));
static SETUP: LazyLock<TermSet> = LazyLock::new(|| TermSet::new(SETUP_TERMS));
static CONDITIONALS: LazyLock<TermSet> = LazyLock::new(|| TermSet::new(CONDITIONAL_TERMS));
static ALTERNATIVES: LazyLock<TermSet> = LazyLock::new(|| TermSet::new(ALTERNATIVE_TERMS));
static DESTRUCTIVE: LazyLock<TermSet> = LazyLock::new(|| TermSet::new(DESTRUCTIVE_TERMS));
static ROLLBACK: LazyLock<TermSet> = LazyLock::new(|| TermSet::new(ROLLBACK_TERMS));
static ACTIONS: LazyLock<TermSet> = LazyLock::new(|| TermSet::new(ACTION_TERMS));
static VERIFICATION: LazyLock<TermSet> = LazyLock::new(|| TermSet::new(VERIFICATION_TERMS));
static LOGGING: LazyLock<TermSet> = LazyLock::new(|| TermSet::new(LOGGING_TERMS));
static NETWORK: LazyLock<TermSet> = LazyLock::new(|| TermSet::new(NETWORK_TERMS));
static RETRY: LazyLock<TermSet> = LazyLock::new(|| TermSet::new(RETRY_TERMS));
static ASYNC: LazyLock<TermSet> = LazyLock::new(|| TermSet::new(ASYNC_TERMS));
static TIMEOUTS: LazyLock<TermSet> = LazyLock::new(|| TermSet::new(TIMEOUT_TERMS));

static HEADING_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(#{1,6})[ \t]+(\S.*?)[ \t#]*$").expect("valid heading regex"));

/// Run the battery up to `depth` and return every hole candidate found.
pub fn run_battery(content: &str, depth: AnalysisDepth) -> Vec<HoleCandidate> {
    let mut holes = Vec::new();
    unresolved_markers(content, &mut holes);
    empty_sections(content, &mut holes);

    if depth >= AnalysisDepth::Moderate {
        vague_language(content, &mut holes);
        missing_setup(content, &mut holes);
        unbalanced_conditionals(content, &mut holes);
    }

    if depth >= AnalysisDepth::Deep {
        missing_rollback(content, &mut holes);
        unverified_actions(content, &mut holes);
        missing_logging(content, &mut holes);
        missing_retry(content, &mut holes);
        missing_timeout(content, &mut holes);
    }

    holes
}

fn unresolved_markers(content: &str, holes: &mut Vec<HoleCandidate>) {
    for (offset, marker) in MARKERS.occurrences(content) {
        let severity = match marker {
            "FIXME" | "XXX" => HoleSeverity::High,
            _ => HoleSeverity::Medium,
        };
        holes.push(
            HoleCandidate::new(
                HoleType::UnresolvedMarker,
                severity,
                format!("Unresolved {marker} marker"),
            )
            .with_location(location_of(content, offset))
            .with_suggested_fix("Resolve the open item and remove the marker."),
        );
    }
}

fn empty_sections(content: &str, holes: &mut Vec<HoleCandidate>) {
    let lines: Vec<&str> = content.lines().collect();
    for (index, line) in lines.iter().enumerate() {
        let Some((level, title)) = heading(line) else {
            continue;
        };
        let next = lines[index + 1..].iter().find(|l| !l.trim().is_empty());
        let empty = match next {
            None => true,
            Some(next) => heading(next).is_some_and(|(next_level, _)| next_level <= level),
        };
        if empty {
            holes.push(
                HoleCandidate::new(
                    HoleType::EmptySection,
                    HoleSeverity::Low,
                    format!("Section '{title}' has no content"),
                )
                .with_location(format!("line {}", index + 1))
                .with_suggested_fix("Fill in the section or remove the heading."),
            );
        }
    }
}

fn heading(line: &str) -> Option<(usize, &str)> {
    let caps = HEADING_LINE.captures(line)?;
    Some((caps.get(1)?.as_str().len(), caps.get(2)?.as_str()))
}

fn vague_language(content: &str, holes: &mut Vec<HoleCandidate>) {
    for (offset, term) in VAGUE.occurrences(content) {
        let lowered = term.to_lowercase();
        let severity = VAGUE_TERMS
            .iter()
            .find(|(t, _)| *t == lowered)
            .map_or(HoleSeverity::Low, |(_, s)| *s);
        holes.push(
            HoleCandidate::new(
                HoleType::VagueLanguage,
                severity,
                format!("Hedging term '{term}' leaves the behaviour undecided"),
            )
            .with_location(location_of(content, offset))
            .with_suggested_fix("Replace the hedge with a concrete decision."),
        );
    }
}

fn missing_setup(content: &str, holes: &mut Vec<HoleCandidate>) {
    let Some((offset, term)) = DEPENDENCIES.first(content) else {
        return;
    };
    if SETUP.is_present(content) {
        return;
    }
    holes.push(
        HoleCandidate::new(
            HoleType::MissingSetup,
            HoleSeverity::Medium,
            format!("External dependency '{term}' is used without installation or setup steps"),
        )
        .with_location(location_of(content, offset))
        .with_suggested_fix("Document how each dependency is installed and configured."),
    );
}

fn unbalanced_conditionals(content: &str, holes: &mut Vec<HoleCandidate>) {
    let conditionals = CONDITIONALS.count(content);
    let alternatives = ALTERNATIVES.count(content);
    if conditionals == 0 || conditionals <= alternatives * 2 {
        return;
    }
    holes.push(
        HoleCandidate::new(
            HoleType::UnbalancedConditionals,
            HoleSeverity::Low,
            format!("{conditionals} conditional branch(es) but only {alternatives} alternative path(s)"),
        )
        .with_suggested_fix("Describe what happens when each condition does not hold."),
    );
}

fn missing_rollback(content: &str, holes: &mut Vec<HoleCandidate>) {
    let Some((offset, term)) = DESTRUCTIVE.first(content) else {
        return;
    };
    if ROLLBACK.is_present(content) {
        return;
    }
    holes.push(
        HoleCandidate::new(
            HoleType::MissingRollback,
            HoleSeverity::High,
            format!("Destructive action '{term}' has no rollback or backup plan"),
        )
        .with_location(location_of(content, offset))
        .with_suggested_fix("Take a backup before destructive steps and document how to restore it."),
    );
}

fn unverified_actions(content: &str, holes: &mut Vec<HoleCandidate>) {
    let actions = ACTIONS.count(content);
    let verifications = VERIFICATION.count(content);
    if actions <= verifications * 3 {
        return;
    }
    holes.push(
        HoleCandidate::new(
            HoleType::UnverifiedActions,
            HoleSeverity::Medium,
            format!("{actions} action(s) against {verifications} verification step(s)"),
        )
        .with_suggested_fix("Add a verification step after each significant action."),
    );
}

fn missing_logging(content: &str, holes: &mut Vec<HoleCandidate>) {
    if content.len() <= LOGGING_LENGTH_THRESHOLD || LOGGING.is_present(content) {
        return;
    }
    holes.push(
        HoleCandidate::new(
            HoleType::MissingLogging,
            HoleSeverity::Low,
            "No logging, monitoring or audit trail is described",
        )
        .with_suggested_fix("Describe what is logged and which metrics are monitored."),
    );
}

fn missing_retry(content: &str, holes: &mut Vec<HoleCandidate>) {
    let Some((offset, term)) = NETWORK.first(content) else {
        return;
    };
    if RETRY.is_present(content) {
        return;
    }
    holes.push(
        HoleCandidate::new(
            HoleType::MissingRetry,
            HoleSeverity::Medium,
            format!("Networked call ('{term}') has no retry policy"),
        )
        .with_location(location_of(content, offset))
        .with_suggested_fix("Retry transient failures with exponential backoff."),
    );
}

fn missing_timeout(content: &str, holes: &mut Vec<HoleCandidate>) {
    let Some((offset, term)) = ASYNC.first(content) else {
        return;
    };
    if TIMEOUTS.is_present(content) {
        return;
    }
    holes.push(
        HoleCandidate::new(
            HoleType::MissingTimeout,
            HoleSeverity::Medium,
            format!("Asynchronous work ('{term}') has no timeout or cancellation"),
        )
        .with_location(location_of(content, offset))
        .with_suggested_fix("Bound asynchronous work with a timeout and a cancellation path."),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn types(holes: &[HoleCandidate]) -> Vec<HoleType> {
        holes.iter().map(|h| h.hole_type).collect()
    }

    #[test]
    fn test_depth_for_progress() {
        assert_eq!(AnalysisDepth::for_progress(1, 10), AnalysisDepth::Shallow);
        assert_eq!(AnalysisDepth::for_progress(3, 10), AnalysisDepth::Shallow);
        assert_eq!(AnalysisDepth::for_progress(4, 10), AnalysisDepth::Moderate);
        assert_eq!(AnalysisDepth::for_progress(7, 10), AnalysisDepth::Deep);
        assert_eq!(AnalysisDepth::for_progress(1, 3), AnalysisDepth::Moderate);
        assert_eq!(AnalysisDepth::for_progress(2, 3), AnalysisDepth::Deep);
        assert_eq!(AnalysisDepth::for_progress(3, 3), AnalysisDepth::Deep);
    }

    #[test]
    fn test_markers_are_case_sensitive_and_graded() {
        let content = "Intro\nTODO: pick a store\nFIXME later\na todo list";
        let holes = run_battery(content, AnalysisDepth::Shallow);
        assert_eq!(holes.len(), 2);
        assert_eq!(holes[0].severity, HoleSeverity::Medium);
        assert_eq!(holes[0].location.as_deref(), Some("line 2"));
        assert_eq!(holes[1].severity, HoleSeverity::High);
    }

    #[test]
    fn test_empty_sections() {
        let content = "# Title\n\n## Empty\n\n## Filled\nSome text.\n## Trailing\n";
        let holes = run_battery(content, AnalysisDepth::Shallow);
        assert_eq!(types(&holes), vec![HoleType::EmptySection, HoleType::EmptySection]);
        assert_eq!(holes[0].location.as_deref(), Some("line 3"));
        assert_eq!(holes[1].location.as_deref(), Some("line 7"));
    }

    #[test]
    fn test_heading_followed_by_subsection_is_not_empty() {
        let holes = run_battery("# Parent\n## Child\nbody", AnalysisDepth::Shallow);
        assert!(holes.is_empty());
    }

    #[test]
    fn test_shallow_ignores_vague_terms() {
        let holes = run_battery("We will maybe cache stuff.", AnalysisDepth::Shallow);
        assert!(holes.is_empty());
    }

    #[test]
    fn test_vague_terms_one_hole_per_occurrence() {
        let holes = run_battery("Somehow sync it. Maybe cache, etc. Maybe not.", AnalysisDepth::Moderate);
        let severities: Vec<_> = holes.iter().map(|h| h.severity).collect();
        assert_eq!(types(&holes), vec![HoleType::VagueLanguage; 4]);
        assert_eq!(
            severities,
            vec![HoleSeverity::High, HoleSeverity::Medium, HoleSeverity::Low, HoleSeverity::Medium]
        );
    }

    #[test]
    fn test_missing_setup() {
        let holes = run_battery("Persist rows to the database.", AnalysisDepth::Moderate);
        assert_eq!(types(&holes), vec![HoleType::MissingSetup]);
        let ok = run_battery("Install and configure the database.", AnalysisDepth::Moderate);
        assert!(ok.is_empty());
    }

    #[test]
    fn test_conditional_ratio() {
        let unbalanced = "If A, go. When B, stop. If C, wait. Otherwise continue.";
        assert_eq!(
            types(&run_battery(unbalanced, AnalysisDepth::Moderate)),
            vec![HoleType::UnbalancedConditionals]
        );
        let balanced = "If A, go. When B, stop. Otherwise continue.";
        assert!(run_battery(balanced, AnalysisDepth::Moderate).is_empty());
    }

    #[test]
    fn test_deep_checks() {
        let content = "Delete old rows. Send the report over the api in a background job.";
        let found = types(&run_battery(content, AnalysisDepth::Deep));
        assert!(found.contains(&HoleType::MissingRollback));
        assert!(found.contains(&HoleType::MissingRetry));
        assert!(found.contains(&HoleType::MissingTimeout));
        assert!(!found.contains(&HoleType::MissingLogging));

        let moderate = types(&run_battery(content, AnalysisDepth::Moderate));
        assert!(!moderate.contains(&HoleType::MissingRollback));
    }

    #[test]
    fn test_unverified_actions_ratio() {
        let content = "Create it. Update it. Send it. Deploy it. Verify it.";
        assert!(types(&run_battery(content, AnalysisDepth::Deep)).contains(&HoleType::UnverifiedActions));
        let checked = "Create it. Update it. Deploy it. Verify it.";
        assert!(!types(&run_battery(checked, AnalysisDepth::Deep)).contains(&HoleType::UnverifiedActions));
    }

    #[test]
    fn test_missing_logging_needs_length() {
        let long = "word ".repeat(120);
        assert_eq!(types(&run_battery(&long, AnalysisDepth::Deep)), vec![HoleType::MissingLogging]);
        let logged = format!("{long} audit");
        assert!(run_battery(&logged, AnalysisDepth::Deep).is_empty());
    }

    #[test]
    fn test_battery_is_monotonic_in_depth() {
        let content = "TODO\nMaybe delete the database in a background job over http.";
        let shallow = run_battery(content, AnalysisDepth::Shallow).len();
        let moderate = run_battery(content, AnalysisDepth::Moderate).len();
        let deep = run_battery(content, AnalysisDepth::Deep).len();
        assert!(shallow <= moderate && moderate <= deep);
    }
}
