//! Confidence scoring.
//!
//! A pure function of a blueprint's hole, test and optimization history.

use serde::{Deserialize, Serialize};

use crate::domain::models::{Hole, HoleStatus, Optimization, StressTestRun};

const BASE_SCORE: f64 = 0.5;
const PATCH_RATE_WEIGHT: f64 = 0.2;
const OPEN_HOLE_PENALTY: f64 = 0.05;
const PASS_RATE_WEIGHT: f64 = 0.25;
const OPTIMIZATION_WEIGHT: f64 = 0.03;
const OPTIMIZATION_CAP: f64 = 0.15;

/// Multiplier applied to the score of a run stopped by its timeout.
pub const TIMEOUT_PENALTY: f64 = 0.8;

/// The terms that make up a score, kept for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceBreakdown {
    pub total_holes: usize,
    pub patched_holes: usize,
    pub open_holes: usize,
    pub test_runs: usize,
    pub passed_tests: usize,
    pub optimizations: usize,
    pub hole_term: f64,
    pub test_term: f64,
    pub optimization_term: f64,
    pub score: f64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ConfidenceScorer;

impl ConfidenceScorer {
    pub fn new() -> Self {
        Self
    }

    pub fn score(&self, holes: &[Hole], tests: &[StressTestRun], optimizations: &[Optimization]) -> f64 {
        self.breakdown(holes, tests, optimizations).score
    }

    pub fn breakdown(
        &self,
        holes: &[Hole],
        tests: &[StressTestRun],
        optimizations: &[Optimization],
    ) -> ConfidenceBreakdown {
        let total_holes = holes.len();
        let patched_holes = holes.iter().filter(|h| h.status == HoleStatus::Patched).count();
        let open_holes = holes.iter().filter(|h| h.status == HoleStatus::Open).count();

        let hole_term = if total_holes == 0 {
            0.0
        } else {
            let patch_rate = patched_holes as f64 / total_holes as f64;
            PATCH_RATE_WEIGHT * patch_rate - OPEN_HOLE_PENALTY * open_holes as f64
        };

        let test_runs = tests.len();
        let passed_tests = tests.iter().filter(|t| t.passed).count();
        let test_term = if test_runs == 0 {
            0.0
        } else {
            PASS_RATE_WEIGHT * (passed_tests as f64 / test_runs as f64)
        };

        let optimization_term =
            (OPTIMIZATION_WEIGHT * optimizations.len() as f64).min(OPTIMIZATION_CAP);

        let score = (BASE_SCORE + hole_term + test_term + optimization_term).clamp(0.0, 1.0);

        ConfidenceBreakdown {
            total_holes,
            patched_holes,
            open_holes,
            test_runs,
            passed_tests,
            optimizations: optimizations.len(),
            hole_term,
            test_term,
            optimization_term,
            score,
        }
    }

    /// Penalize a score for a timeout-terminated run.
    pub fn apply_timeout_penalty(&self, score: f64) -> f64 {
        (score.clamp(0.0, 1.0) * TIMEOUT_PENALTY).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{HoleCandidate, HoleSeverity, HoleType, TestCategory};
    use proptest::prelude::*;
    use uuid::Uuid;

    fn holes(open: usize, patched: usize) -> Vec<Hole> {
        let bp = Uuid::new_v4();
        (0..open + patched)
            .map(|i| {
                let mut hole = HoleCandidate::new(HoleType::MissingRetry, HoleSeverity::Low, "gap").into_hole(bp);
                if i >= open {
                    hole.status = HoleStatus::Patched;
                }
                hole
            })
            .collect()
    }

    fn tests(passed: usize, failed: usize) -> Vec<StressTestRun> {
        let bp = Uuid::new_v4();
        (0..passed + failed)
            .map(|i| StressTestRun::new(bp, TestCategory::Load, 5, i < passed, vec![], 0))
            .collect()
    }

    fn optimizations(n: usize) -> Vec<Optimization> {
        let bp = Uuid::new_v4();
        (0..n).map(|_| Optimization::new(bp, "s", "d", 0.1, 1)).collect()
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_empty_history_is_base_score() {
        assert!(approx(ConfidenceScorer.score(&[], &[], &[]), 0.5));
    }

    #[test]
    fn test_all_terms() {
        // 0.5 + (0.2 * 0.5 - 0.05 * 1) + 0.25 * 0.5 + 0.06
        let score = ConfidenceScorer.score(&holes(1, 1), &tests(1, 1), &optimizations(2));
        assert!(approx(score, 0.5 + 0.05 + 0.125 + 0.06));
    }

    #[test]
    fn test_optimization_term_is_capped() {
        let score = ConfidenceScorer.score(&[], &[], &optimizations(50));
        assert!(approx(score, 0.65));
    }

    #[test]
    fn test_many_open_holes_clamp_to_zero() {
        let score = ConfidenceScorer.score(&holes(40, 0), &tests(0, 3), &[]);
        assert!(approx(score, 0.0));
    }

    #[test]
    fn test_timeout_penalty() {
        assert!(approx(ConfidenceScorer.apply_timeout_penalty(0.5), 0.4));
        assert!(approx(ConfidenceScorer.apply_timeout_penalty(1.5), 0.8));
    }

    proptest! {
        #[test]
        fn prop_score_is_bounded(open in 0usize..60, patched in 0usize..60, passed in 0usize..30, failed in 0usize..30, opts in 0usize..20) {
            let score = ConfidenceScorer.score(&holes(open, patched), &tests(passed, failed), &optimizations(opts));
            prop_assert!((0.0..=1.0).contains(&score));
            prop_assert!((0.0..=1.0).contains(&ConfidenceScorer.apply_timeout_penalty(score)));
        }

        #[test]
        fn prop_patching_never_lowers_score(open in 1usize..20, patched in 0usize..20) {
            let before = ConfidenceScorer.score(&holes(open, patched), &[], &[]);
            let after = ConfidenceScorer.score(&holes(open - 1, patched + 1), &[], &[]);
            prop_assert!(after >= before);
        }
    }
}
