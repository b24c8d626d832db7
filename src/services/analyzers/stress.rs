//! The six stress-test detectors.

use regex::Regex;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use super::vocabulary::{location_of, TermSet};
use super::{AnalysisOutcome, Analyzer, Condition};
use crate::domain::models::{HoleSeverity, HoleType, TestCategory};

const ERROR_HANDLING_TERMS: &[&str] = &[
    "error", "errors", "exception", "exceptions", "fail", "fails", "failure", "failures",
    "failed", "catch", "handle", "handles", "handling", "fallback", "recover", "recovery",
];
const EMPTY_CASE_TERMS: &[&str] = &[
    "empty", "null", "none", "missing", "zero", "blank", "nil", "undefined", "edge case",
    "edge cases", "corner case", "corner cases",
];
const CONCURRENT_CASE_TERMS: &[&str] = &[
    "duplicate", "duplicates", "simultaneous", "race", "idempotent", "idempotency", "twice",
];
const INPUT_TERMS: &[&str] = &[
    "input", "inputs", "user", "users", "request", "requests", "parameter", "parameters",
    "param", "params", "form", "forms", "upload", "uploads", "payload", "payloads", "query",
];
const VALIDATION_TERMS: &[&str] = &[
    "validate", "validates", "validated", "validation", "sanitize", "sanitized",
    "sanitization", "verify", "verified", "reject", "rejects", "rejected", "allowlist",
    "whitelist", "schema",
];
const ABSOLUTE_TERMS: &[&str] = &[
    "always", "never", "guaranteed", "guarantee", "assume", "assumes", "assumed", "trust",
    "trusted", "cannot fail", "impossible",
];
const SCALE_TERMS: &[&str] = &[
    "scale", "scales", "scaling", "scalable", "concurrency", "concurrent", "throughput",
    "cache", "caching", "load", "capacity", "replica", "replicas", "pool", "pooling", "batch",
    "batches", "batching",
];
const ITERATION_TERMS: &[&str] = &["all", "every", "each", "loop", "loops", "iterate", "iterates", "bulk"];
const LIMIT_TERMS: &[&str] = &[
    "limit", "limits", "limited", "pagination", "paginate", "paginated", "page size",
    "maximum", "max", "cap", "capped", "throttle", "throttled", "rate limit", "quota",
];
const RANGE_TERMS: &[&str] = &[
    "min", "minimum", "max", "maximum", "limit", "limits", "range", "ranges", "bound",
    "bounds", "bounded", "at most", "at least", "between", "up to", "no more than",
    "threshold", "thresholds",
];
const SIZE_TERMS: &[&str] = &[
    "size", "length", "file", "files", "upload", "uploads", "payload", "payloads", "body",
    "string", "strings", "list", "lists", "array", "arrays", "buffer", "buffers", "message",
    "messages",
];
const SANITIZE_TERMS: &[&str] = &[
    "sanitize", "sanitized", "sanitizes", "sanitization", "escape", "escaped", "escaping",
    "parameterized", "parameterised", "prepared statement", "prepared statements",
    "bind parameters", "placeholders", "allowlist", "whitelist",
];
const SENSITIVE_TERMS: &[&str] = &[
    "password", "passwords", "secret", "secrets", "token", "tokens", "api key", "api keys",
    "credential", "credentials", "ssn", "credit card", "credit cards", "private key",
    "personal data", "pii",
];
const PROTECTION_TERMS: &[&str] = &[
    "encrypt", "encrypted", "encryption", "hash", "hashed", "hashing", "bcrypt", "argon2",
    "vault", "kms", "mask", "masked", "redact", "redacted", "tls", "https",
];
const PRIVILEGED_TERMS: &[&str] = &[
    "admin", "administrator", "endpoint", "endpoints", "api", "apis", "dashboard", "account",
    "accounts", "privileged",
];
const AUTH_TERMS: &[&str] = &[
    "auth", "authenticate", "authenticated", "authentication", "authorize", "authorized",
    "authorization", "permission", "permissions", "role", "roles", "rbac", "login", "oauth",
    "jwt", "access control",
];

static ERROR_HANDLING: LazyLock<TermSet> = LazyLock::new(|| TermSet::new(ERROR_HANDLING_TERMS));
static EMPTY_CASES: LazyLock<TermSet> = LazyLock::new(|| TermSet::new(EMPTY_CASE_TERMS));
static CONCURRENT_CASES: LazyLock<TermSet> = LazyLock::new(|| TermSet::new(CONCURRENT_CASE_TERMS));
static INPUT: LazyLock<TermSet> = LazyLock::new(|| TermSet::new(INPUT_TERMS));
static VALIDATION: LazyLock<TermSet> = LazyLock::new(|| TermSet::new(VALIDATION_TERMS));
static ABSOLUTES: LazyLock<TermSet> = LazyLock::new(|| TermSet::new(ABSOLUTE_TERMS));
static SCALE: LazyLock<TermSet> = LazyLock::new(|| TermSet::new(SCALE_TERMS));
static ITERATION: LazyLock<TermSet> = LazyLock::new(|| TermSet::new(ITERATION_TERMS));
static LIMITS: LazyLock<TermSet> = LazyLock::new(|| TermSet::new(LIMIT_TERMS));
static RANGE: LazyLock<TermSet> = LazyLock::new(|| TermSet::new(RANGE_TERMS));
static SIZES: LazyLock<TermSet> = LazyLock::new(|| TermSet::new(SIZE_TERMS));
static SANITIZE: LazyLock<TermSet> = LazyLock::new(|| TermSet::new(SANITIZE_TERMS));
static SENSITIVE: LazyLock<TermSet> = LazyLock::new(|| TermSet::new(SENSITIVE_TERMS));
static PROTECTION: LazyLock<TermSet> = LazyLock::new(|| TermSet::new(PROTECTION_TERMS));
static PRIVILEGED: LazyLock<TermSet> = LazyLock::new(|| TermSet::new(PRIVILEGED_TERMS));
static AUTH: LazyLock<TermSet> = LazyLock::new(|| TermSet::new(AUTH_TERMS));

static NUMBER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\d+\b").expect("valid number regex"));
static HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^#{1,6}[ \t]+(\S.*?)[ \t#]*$").expect("valid heading regex"));
static INJECTION: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)\b(?:eval|exec|system|popen)\s*\(",
        r"(?i)\b(?:select|insert|update|delete)\b[^\n]*?(?:\+\s*\w|\$\{|%s|\{\})",
        r"(?i)\b(?:innerhtml|dangerouslysetinnerhtml|document\.write)\b",
        r"(?i)\bshell\s*=\s*true\b",
        r"(?i)\braw (?:sql|queries|query)\b",
        r"(?i)\bconcatenat(?:e|es|ed|ing)\b[^\n]*\b(?:query|queries|sql|command|commands)\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid injection regex"))
    .collect()
});

const CONTRADICTION_PAIRS: &[(&str, &str)] = &[
    ("always", "never"),
    ("required", "optional"),
    ("synchronous", "asynchronous"),
    ("stateless", "stateful"),
    ("enabled", "disabled"),
];

static CONTRADICTIONS: LazyLock<Vec<(&'static str, &'static str, TermSet, TermSet)>> = LazyLock::new(|| {
    CONTRADICTION_PAIRS
        .iter()
        .map(|&(a, b)| (a, b, TermSet::new(&[a]), TermSet::new(&[b])))
        .collect()
});

const NO_ERROR_HANDLING: Condition = Condition::gated(
    HoleType::MissingErrorHandling,
    HoleSeverity::High,
    4,
    "Describe how failures are detected, reported and recovered from.",
);
const NO_EMPTY_CASES: Condition = Condition::gated(
    HoleType::UnhandledEdgeCase,
    HoleSeverity::Medium,
    6,
    "State the behaviour for empty, missing and null values.",
);
const NO_CONCURRENT_CASES: Condition = Condition::gated(
    HoleType::UnhandledEdgeCase,
    HoleSeverity::Low,
    8,
    "State the behaviour for duplicate and simultaneous operations.",
);
const UNVALIDATED_INPUT: Condition = Condition::gated(
    HoleType::UnvalidatedInput,
    HoleSeverity::High,
    5,
    "Validate and reject malformed external data before use.",
);
const UNSTATED_ASSUMPTIONS: Condition = Condition::gated(
    HoleType::UnstatedAssumption,
    HoleSeverity::Medium,
    7,
    "Replace absolute claims with explicit, checked preconditions.",
);
const NO_SCALING: Condition = Condition::gated(
    HoleType::ScalabilityGap,
    HoleSeverity::Medium,
    5,
    "Describe expected load, capacity and how the design scales.",
);
const UNBOUNDED_WORK: Condition = Condition::gated(
    HoleType::UnboundedWork,
    HoleSeverity::Medium,
    7,
    "Put a limit or pagination on work that grows with data volume.",
);
const NUMBERS_WITHOUT_BOUNDS: Condition = Condition::gated(
    HoleType::MissingBounds,
    HoleSeverity::Medium,
    4,
    "Give the minimum and maximum accepted values.",
);
const UNBOUNDED_SIZES: Condition = Condition::gated(
    HoleType::UnboundedSize,
    HoleSeverity::High,
    6,
    "Specify a maximum size for every variable-length value.",
);
const INJECTION_PRONE: Condition = Condition::ungated(
    HoleType::InjectionRisk,
    HoleSeverity::Critical,
    "Use parameterized queries and escape all interpolated values.",
);
const EXPOSED_SECRETS: Condition = Condition::gated(
    HoleType::SensitiveDataExposure,
    HoleSeverity::High,
    4,
    "Encrypt sensitive values at rest and redact them from output.",
);
const NO_AUTHORIZATION: Condition = Condition::gated(
    HoleType::MissingAuthorization,
    HoleSeverity::High,
    6,
    "Define authentication and role checks for privileged operations.",
);
const CONTRADICTORY_TERMS: Condition = Condition::gated(
    HoleType::Contradiction,
    HoleSeverity::Medium,
    5,
    "Reconcile the statements that use opposing terms.",
);
const DUPLICATED_SECTIONS: Condition = Condition::gated(
    HoleType::DuplicateSection,
    HoleSeverity::Low,
    8,
    "Merge sections that share a heading.",
);

/// Absence of failure and empty-value vocabulary.
#[derive(Debug, Default)]
pub struct EdgeCaseAnalyzer;

impl Analyzer for EdgeCaseAnalyzer {
    fn category(&self) -> TestCategory {
        TestCategory::EdgeCase
    }

    fn analyze(&self, content: &str, intensity: u8) -> AnalysisOutcome {
        let mut outcome = AnalysisOutcome::default();
        if !ERROR_HANDLING.is_present(content) {
            outcome.trigger(
                &NO_ERROR_HANDLING,
                intensity,
                "No error handling described: failures and fallbacks are not mentioned",
                None,
            );
        }
        if !EMPTY_CASES.is_present(content) {
            outcome.trigger(
                &NO_EMPTY_CASES,
                intensity,
                "Empty, missing or null values are not considered",
                None,
            );
        }
        if !CONCURRENT_CASES.is_present(content) {
            outcome.trigger(
                &NO_CONCURRENT_CASES,
                intensity,
                "Duplicate or simultaneous operations are not considered",
                None,
            );
        }
        outcome
    }
}

/// External data and absolute claims that an attacker could exploit.
#[derive(Debug, Default)]
pub struct AdversarialAnalyzer;

impl Analyzer for AdversarialAnalyzer {
    fn category(&self) -> TestCategory {
        TestCategory::Adversarial
    }

    fn analyze(&self, content: &str, intensity: u8) -> AnalysisOutcome {
        let mut outcome = AnalysisOutcome::default();
        if let Some((offset, term)) = INPUT.first(content) {
            if !VALIDATION.is_present(content) {
                outcome.trigger(
                    &UNVALIDATED_INPUT,
                    intensity,
                    format!("External data ('{term}') is accepted without validation"),
                    Some(location_of(content, offset)),
                );
            }
        }
        let absolutes = ABSOLUTES.count(content);
        if let Some((offset, term)) = ABSOLUTES.first(content) {
            outcome.trigger(
                &UNSTATED_ASSUMPTIONS,
                intensity,
                format!("{absolutes} absolute claim(s) such as '{term}' are not backed by checks"),
                Some(location_of(content, offset)),
            );
        }
        outcome
    }
}

/// Missing capacity planning and unbounded per-item work.
#[derive(Debug, Default)]
pub struct LoadAnalyzer;

impl Analyzer for LoadAnalyzer {
    fn category(&self) -> TestCategory {
        TestCategory::Load
    }

    fn analyze(&self, content: &str, intensity: u8) -> AnalysisOutcome {
        let mut outcome = AnalysisOutcome::default();
        if !SCALE.is_present(content) {
            outcome.trigger(
                &NO_SCALING,
                intensity,
                "No capacity, caching or scaling strategy is described",
                None,
            );
        }
        if let Some((offset, term)) = ITERATION.first(content) {
            if !LIMITS.is_present(content) {
                outcome.trigger(
                    &UNBOUNDED_WORK,
                    intensity,
                    format!("Work over '{term}' items has no limit or pagination"),
                    Some(location_of(content, offset)),
                );
            }
        }
        outcome
    }
}

/// Values and sizes without stated ranges.
#[derive(Debug, Default)]
pub struct BoundaryAnalyzer;

impl Analyzer for BoundaryAnalyzer {
    fn category(&self) -> TestCategory {
        TestCategory::Boundary
    }

    fn analyze(&self, content: &str, intensity: u8) -> AnalysisOutcome {
        let mut outcome = AnalysisOutcome::default();
        if RANGE.is_present(content) {
            return outcome;
        }
        if let Some(m) = NUMBER.find(content) {
            outcome.trigger(
                &NUMBERS_WITHOUT_BOUNDS,
                intensity,
                format!("Numeric value '{}' has no stated minimum or maximum", m.as_str()),
                Some(location_of(content, m.start())),
            );
        }
        if let Some((offset, term)) = SIZES.first(content) {
            outcome.trigger(
                &UNBOUNDED_SIZES,
                intensity,
                format!("Variable-length '{term}' has no size limit"),
                Some(location_of(content, offset)),
            );
        }
        outcome
    }
}

/// Injection-prone constructs, exposed secrets and unguarded privileged operations.
#[derive(Debug, Default)]
pub struct SecurityAnalyzer;

impl Analyzer for SecurityAnalyzer {
    fn category(&self) -> TestCategory {
        TestCategory::Security
    }

    fn analyze(&self, content: &str, intensity: u8) -> AnalysisOutcome {
        let mut outcome = AnalysisOutcome::default();
        if !SANITIZE.is_present(content) {
            for pattern in INJECTION.iter() {
                if let Some(m) = pattern.find(content) {
                    outcome.trigger(
                        &INJECTION_PRONE,
                        intensity,
                        format!("Injection-prone construct '{}' without sanitization", m.as_str().trim()),
                        Some(location_of(content, m.start())),
                    );
                }
            }
        }
        if let Some((offset, term)) = SENSITIVE.first(content) {
            if !PROTECTION.is_present(content) {
                outcome.trigger(
                    &EXPOSED_SECRETS,
                    intensity,
                    format!("Sensitive data ('{term}') is handled without encryption or masking"),
                    Some(location_of(content, offset)),
                );
            }
        }
        if let Some((offset, term)) = PRIVILEGED.first(content) {
            if !AUTH.is_present(content) {
                outcome.trigger(
                    &NO_AUTHORIZATION,
                    intensity,
                    format!("Privileged surface ('{term}') has no authentication or authorization"),
                    Some(location_of(content, offset)),
                );
            }
        }
        outcome
    }
}

/// Opposing terms and repeated section headings.
#[derive(Debug, Default)]
pub struct ConsistencyAnalyzer;

impl Analyzer for ConsistencyAnalyzer {
    fn category(&self) -> TestCategory {
        TestCategory::Consistency
    }

    fn analyze(&self, content: &str, intensity: u8) -> AnalysisOutcome {
        let mut outcome = AnalysisOutcome::default();
        for (a, b, first, second) in CONTRADICTIONS.iter() {
            let Some((offset, _)) = first.first(content) else {
                continue;
            };
            if second.is_present(content) {
                outcome.trigger(
                    &CONTRADICTORY_TERMS,
                    intensity,
                    format!("Both '{a}' and '{b}' are used; the statements may contradict"),
                    Some(location_of(content, offset)),
                );
            }
        }

        let mut seen: HashMap<String, usize> = HashMap::new();
        for caps in HEADING.captures_iter(content) {
            let (Some(whole), Some(title)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let key = title.as_str().trim().to_lowercase();
            let count = seen.entry(key).or_insert(0);
            *count += 1;
            if *count == 2 {
                outcome.trigger(
                    &DUPLICATED_SECTIONS,
                    intensity,
                    format!("Section heading '{}' appears more than once", title.as_str().trim()),
                    Some(location_of(content, whole.start())),
                );
            }
        }
        outcome
    }
}

/// One analyzer per category, in [`TestCategory::ALL`] order.
pub fn default_analyzers() -> Vec<Arc<dyn Analyzer>> {
    vec![
        Arc::new(EdgeCaseAnalyzer),
        Arc::new(AdversarialAnalyzer),
        Arc::new(LoadAnalyzer),
        Arc::new(BoundaryAnalyzer),
        Arc::new(SecurityAnalyzer),
        Arc::new(ConsistencyAnalyzer),
    ]
}
