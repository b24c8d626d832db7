//! Stress tester: one category probe against a blueprint's current content.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Hole, StressTestRun, TestCategory, MAX_INTENSITY, MIN_INTENSITY};
use crate::domain::ports::BlueprintStore;
use crate::services::analyzers::{default_analyzers, Analyzer};

/// Result of one stress test: the persisted run and the holes it created.
#[derive(Debug, Clone)]
pub struct StressTestReport {
    pub run: StressTestRun,
    pub holes: Vec<Hole>,
}

impl StressTestReport {
    pub fn passed(&self) -> bool {
        self.run.passed
    }
}

pub struct StressTester<S: BlueprintStore> {
    store: Arc<S>,
    analyzers: HashMap<TestCategory, Arc<dyn Analyzer>>,
}

impl<S: BlueprintStore> StressTester<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self::with_analyzers(store, default_analyzers())
    }

    /// Use custom analyzers. A later analyzer replaces an earlier one for the same category.
    pub fn with_analyzers(store: Arc<S>, analyzers: Vec<Arc<dyn Analyzer>>) -> Self {
        let analyzers = analyzers.into_iter().map(|a| (a.category(), a)).collect();
        Self { store, analyzers }
    }

    /// Probe the blueprint with the `category` analyzer at `intensity`.
    ///
    /// Persists exactly one [`StressTestRun`] and one [`Hole`] per escalated
    /// condition. Holes are not deduplicated against earlier runs.
    #[instrument(skip(self))]
    pub async fn run_test(
        &self,
        blueprint_id: Uuid,
        category: TestCategory,
        intensity: u8,
    ) -> DomainResult<StressTestReport> {
        let blueprint = self
            .store
            .get_blueprint(blueprint_id)
            .await?
            .ok_or(DomainError::BlueprintNotFound(blueprint_id))?;

        let analyzer = self.analyzers.get(&category).ok_or_else(|| {
            DomainError::ValidationFailed(format!("no analyzer registered for {}", category.as_str()))
        })?;

        let intensity = intensity.clamp(MIN_INTENSITY, MAX_INTENSITY);
        let started = Instant::now();
        let outcome = analyzer.analyze(&blueprint.current_content, intensity);
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let passed = outcome.passed();
        let run = StressTestRun::new(
            blueprint_id,
            category,
            intensity,
            passed,
            outcome.findings,
            duration_ms,
        );
        self.store.create_stress_test(&run).await?;

        let mut holes = Vec::with_capacity(outcome.candidates.len());
        for candidate in outcome.candidates {
            let hole = candidate.into_hole(blueprint_id);
            self.store.create_hole(&hole).await?;
            holes.push(hole);
        }

        debug!(
            %blueprint_id,
            intensity,
            passed,
            holes = holes.len(),
            findings = run.findings.len(),
            "stress test finished"
        );

        Ok(StressTestReport { run, holes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::{create_migrated_test_pool, SqliteBlueprintStore};
    use crate::domain::models::{Blueprint, HoleType, PercolationDepth};
    use crate::services::analyzers::AnalysisOutcome;

    async fn setup(content: &str) -> (StressTester<SqliteBlueprintStore>, Arc<SqliteBlueprintStore>, Uuid) {
        let pool = create_migrated_test_pool().await.unwrap();
        let store = Arc::new(SqliteBlueprintStore::new(pool));
        let blueprint = Blueprint::new(content, PercolationDepth::Standard, 5_000);
        store.create_blueprint(&blueprint).await.unwrap();
        (StressTester::new(store.clone()), store, blueprint.id)
    }

    #[tokio::test]
    async fn test_run_persists_run_and_holes() {
        let (tester, store, id) = setup("Store the password in the admin dashboard.").await;

        let report = tester.run_test(id, TestCategory::Security, 6).await.unwrap();
        assert!(!report.passed());
        assert_eq!(report.holes.len(), 2);

        let runs = store.get_stress_tests_for_blueprint(id).await.unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].category, TestCategory::Security);
        assert!(!runs[0].passed);
        assert_eq!(store.count_open_holes(id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_intensity_below_gate_passes_with_findings() {
        let (tester, store, id) = setup("Store the password in the admin dashboard.").await;

        let report = tester.run_test(id, TestCategory::Security, 2).await.unwrap();
        assert!(report.passed());
        assert!(report.holes.is_empty());
        assert_eq!(report.run.findings.len(), 2);
        assert_eq!(store.count_open_holes(id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_repeated_runs_are_not_deduplicated() {
        let (tester, store, id) = setup("Run eval(input) directly.").await;

        tester.run_test(id, TestCategory::Security, 1).await.unwrap();
        tester.run_test(id, TestCategory::Security, 1).await.unwrap();

        let holes = store.get_holes_for_blueprint(id, None).await.unwrap();
        assert_eq!(holes.len(), 2);
        assert!(holes.iter().all(|h| h.hole_type == HoleType::InjectionRisk));
    }

    #[tokio::test]
    async fn test_intensity_is_clamped() {
        let (tester, _store, id) = setup("Plain text.").await;
        let report = tester.run_test(id, TestCategory::Load, 42).await.unwrap();
        assert_eq!(report.run.intensity, MAX_INTENSITY);
    }

    #[tokio::test]
    async fn test_missing_blueprint() {
        let (tester, _store, _) = setup("x").await;
        let err = tester.run_test(Uuid::new_v4(), TestCategory::Load, 5).await.unwrap_err();
        assert!(matches!(err, DomainError::BlueprintNotFound(_)));
    }

    struct AlwaysPasses;

    impl Analyzer for AlwaysPasses {
        fn category(&self) -> TestCategory {
            TestCategory::EdgeCase
        }

        fn analyze(&self, _content: &str, _intensity: u8) -> AnalysisOutcome {
            AnalysisOutcome::default()
        }
    }

    #[tokio::test]
    async fn test_custom_analyzer_replaces_default() {
        let (_, store, id) = setup("Deploy it.").await;
        let mut analyzers = default_analyzers();
        analyzers.push(Arc::new(AlwaysPasses));
        let tester = StressTester::with_analyzers(store, analyzers);

        let report = tester.run_test(id, TestCategory::EdgeCase, 10).await.unwrap();
        assert!(report.passed());
    }
}
