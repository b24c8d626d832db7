//! Percolation engine.
//!
//! Drives one blueprint through the improvement loop: probe with a stress
//! test, look for holes when the probe fails, patch open holes within the
//! research and token budgets, and stop on the iteration cap, budget
//! exhaustion, the wall-clock timeout, or a clean consistency check. The
//! engine owns the blueprint lifecycle and publishes every step on the
//! event bus.

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult, ErrorKind};
use crate::domain::models::{
    Blueprint, BlueprintStatus, DepthProfile, HoleStatus, LimitsConfig, PercolationConfig,
    TestCategory, MAX_INTENSITY, MIN_INTENSITY,
};
use crate::domain::ports::BlueprintStore;
use crate::services::admission::{ActivePercolations, AdmissionPermit};
use crate::services::analyzers::{AnalysisDepth, Analyzer};
use crate::services::confidence::ConfidenceScorer;
use crate::services::event_bus::{EventBus, EventPayload};
use crate::services::hole_finder::HoleFinder;
use crate::services::optimizer::Optimizer;
use crate::services::stress_tester::{StressTestReport, StressTester};

/// Below this many remaining tokens the loop stops.
pub const MIN_REMAINING_BUDGET: u64 = 100;

/// Earliest iteration at which a clean blueprint may finish early.
pub const EARLY_EXIT_MIN_ITERATION: u32 = 3;

const PHASE_BASIC: &[TestCategory] = &[
    TestCategory::EdgeCase,
    TestCategory::Boundary,
    TestCategory::Load,
];
const PHASE_HARDENING: &[TestCategory] = &[
    TestCategory::Security,
    TestCategory::Boundary,
    TestCategory::Adversarial,
];
const PHASE_FULL: &[TestCategory] = &TestCategory::ALL;

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    IterationLimit,
    BudgetExhausted,
    Timeout,
    EarlyCompletion,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IterationLimit => "iteration_limit",
            Self::BudgetExhausted => "budget_exhausted",
            Self::Timeout => "timeout",
            Self::EarlyCompletion => "early_completion",
        }
    }
}

/// Summary of a completed percolation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PercolationOutcome {
    pub blueprint_id: Uuid,
    pub iterations: u32,
    pub confidence_score: f64,
    pub stop_reason: StopReason,
    pub timed_out: bool,
    pub holes_found: usize,
    pub holes_patched: usize,
    pub research_queries: u32,
    pub tokens_used: u64,
    pub elapsed_ms: u64,
}

/// Category for `iteration` (1-based) of `max_iterations`.
///
/// The run is split in three phases by progress: basic checks first, then
/// security and boundary hardening, then every category round-robin. Each
/// phase cycles its list from the head, starting at the first iteration that
/// falls in it, so a short run still opens its last phase with an edge-case
/// stress test.
pub fn category_for(iteration: u32, max_iterations: u32) -> TestCategory {
    let max = u64::from(max_iterations.max(1));
    let iteration = u64::from(iteration);
    let phase = (iteration * 3 / max).min(2);
    let schedule = match phase {
        0 => PHASE_BASIC,
        1 => PHASE_HARDENING,
        _ => PHASE_FULL,
    };
    // First iteration whose progress reaches this phase.
    let phase_start = (phase * max).div_ceil(3).max(1);
    let offset = usize::try_from(iteration.saturating_sub(phase_start)).unwrap_or(0);
    schedule[offset % schedule.len()]
}

/// Intensity for `iteration` of `max_iterations`: rises from 3 towards 10 with progress.
pub fn intensity_for(iteration: u32, max_iterations: u32) -> u8 {
    let max = u64::from(max_iterations.max(1));
    let raw = u64::from(iteration) * 8 / max + 3;
    u8::try_from(raw.clamp(u64::from(MIN_INTENSITY), u64::from(MAX_INTENSITY))).unwrap_or(MAX_INTENSITY)
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Mutable bookkeeping for one run.
struct RunState {
    iterations: u32,
    holes_found: usize,
    holes_patched: usize,
    research_queries: u32,
    budget_tokens: u64,
    tokens_used: u64,
}

impl RunState {
    fn remaining_budget(&self) -> u64 {
        self.budget_tokens.saturating_sub(self.tokens_used)
    }
}

pub struct PercolationEngine<S: BlueprintStore> {
    store: Arc<S>,
    events: Arc<EventBus>,
    stress_tester: StressTester<S>,
    hole_finder: HoleFinder<S>,
    optimizer: Optimizer<S>,
    scorer: ConfidenceScorer,
    active: ActivePercolations,
    config: PercolationConfig,
}

impl<S: BlueprintStore + 'static> PercolationEngine<S> {
    pub fn new(
        store: Arc<S>,
        events: Arc<EventBus>,
        config: PercolationConfig,
        limits: LimitsConfig,
    ) -> Self {
        Self {
            stress_tester: StressTester::new(store.clone()),
            hole_finder: HoleFinder::new(store.clone()),
            optimizer: Optimizer::new(store.clone(), events.clone(), limits),
            scorer: ConfidenceScorer::new(),
            active: ActivePercolations::new(config.max_concurrent_percolations),
            store,
            events,
            config,
        }
    }

    /// Replace the stress-test analyzers.
    #[must_use]
    pub fn with_analyzers(mut self, analyzers: Vec<Arc<dyn Analyzer>>) -> Self {
        self.stress_tester = StressTester::with_analyzers(self.store.clone(), analyzers);
        self
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn optimizer(&self) -> &Optimizer<S> {
        &self.optimizer
    }

    /// Ids of blueprints with a run in flight.
    pub fn active_percolations(&self) -> Vec<Uuid> {
        self.active.ids()
    }

    pub fn is_percolating(&self, blueprint_id: Uuid) -> bool {
        self.active.contains(blueprint_id)
    }

    /// Percolate a pending blueprint to completion.
    ///
    /// Admission is decided before the first await, so of two simultaneous
    /// calls for the same id exactly one proceeds and the other fails with
    /// [`DomainError::AlreadyPercolating`]. Admission also precedes the
    /// lookup: at capacity an unknown id fails with
    /// [`DomainError::ConcurrencyLimitReached`] rather than not found.
    #[instrument(skip(self))]
    pub async fn percolate(&self, blueprint_id: Uuid) -> DomainResult<PercolationOutcome> {
        let permit = self.active.try_admit(blueprint_id)?;
        self.run_admitted(permit).await
    }

    /// Admit synchronously and run the percolation on a background task.
    pub fn spawn(self: &Arc<Self>, blueprint_id: Uuid) -> DomainResult<JoinHandle<DomainResult<PercolationOutcome>>> {
        let permit = self.active.try_admit(blueprint_id)?;
        let engine = Arc::clone(self);
        Ok(tokio::spawn(async move { engine.run_admitted(permit).await }))
    }

    async fn run_admitted(&self, permit: AdmissionPermit) -> DomainResult<PercolationOutcome> {
        let blueprint_id = permit.id();
        let mut blueprint = self
            .store
            .get_blueprint(blueprint_id)
            .await?
            .ok_or(DomainError::BlueprintNotFound(blueprint_id))?;

        if blueprint.status != BlueprintStatus::Pending {
            return Err(DomainError::InvalidStateTransition {
                from: blueprint.status.as_str().to_string(),
                to: BlueprintStatus::Percolating.as_str().to_string(),
                reason: "only pending blueprints can be percolated".to_string(),
            });
        }
        blueprint.transition_to(BlueprintStatus::Percolating)?;
        self.store
            .update_status(blueprint_id, BlueprintStatus::Percolating, None)
            .await?;

        let result = self.drive(&blueprint).await;
        if let Err(err) = &result {
            self.fail(blueprint_id, err).await;
        }
        drop(permit);
        result
    }

    async fn drive(&self, blueprint: &Blueprint) -> DomainResult<PercolationOutcome> {
        let blueprint_id = blueprint.id;
        let profile = self.config.depths.profile(blueprint.depth);
        let max_iterations = profile.stress_test_iterations;

        self.store
            .log(
                blueprint_id,
                "percolation_started",
                json!({
                    "depth": blueprint.depth.as_str(),
                    "max_iterations": max_iterations,
                    "budget_tokens": blueprint.budget_tokens,
                    "research_query_cap": profile.research_query_cap,
                    "timeout_ms": self.config.timeout_ms,
                }),
            )
            .await?;
        info!(depth = %blueprint.depth, max_iterations, "percolation started");
        self.events.emit(
            blueprint_id,
            EventPayload::PercolationStarted {
                depth: blueprint.depth,
                max_iterations,
                budget_tokens: blueprint.budget_tokens,
            },
        );

        let started = Instant::now();
        let mut state = RunState {
            iterations: 0,
            holes_found: 0,
            holes_patched: 0,
            research_queries: 0,
            budget_tokens: blueprint.budget_tokens,
            tokens_used: blueprint.tokens_used,
        };
        let stop_reason = self.run_loop(blueprint_id, profile, started, &mut state).await?;

        self.finalize(blueprint_id, stop_reason, started, &state).await
    }

    async fn run_loop(
        &self,
        blueprint_id: Uuid,
        profile: DepthProfile,
        started: Instant,
        state: &mut RunState,
    ) -> DomainResult<StopReason> {
        let max_iterations = profile.stress_test_iterations;
        let timeout = Duration::from_millis(self.config.timeout_ms);

        while state.iterations < max_iterations {
            if state.remaining_budget() < MIN_REMAINING_BUDGET {
                self.store
                    .log(
                        blueprint_id,
                        "budget_exhausted",
                        json!({ "iteration": state.iterations, "remaining": state.remaining_budget() }),
                    )
                    .await?;
                info!(remaining = state.remaining_budget(), "budget exhausted");
                return Ok(StopReason::BudgetExhausted);
            }
            if state.iterations > 0 && started.elapsed() >= timeout {
                return Ok(StopReason::Timeout);
            }

            state.iterations += 1;
            let iteration = state.iterations;
            let category = category_for(iteration, max_iterations);
            let intensity = intensity_for(iteration, max_iterations);

            let report = self.probe(blueprint_id, iteration, category, intensity, state).await?;
            self.store
                .log(
                    blueprint_id,
                    "stress_test",
                    json!({
                        "iteration": iteration,
                        "category": category.as_str(),
                        "intensity": intensity,
                        "passed": report.passed(),
                        "holes_found": report.holes.len(),
                    }),
                )
                .await?;

            if !report.passed() {
                let depth = AnalysisDepth::for_progress(iteration, max_iterations);
                let holes = self.hole_finder.analyze(blueprint_id, depth).await?;
                for hole in &holes {
                    self.events.emit(
                        blueprint_id,
                        EventPayload::HoleFound {
                            hole_id: hole.id,
                            hole_type: hole.hole_type,
                            severity: hole.severity,
                        },
                    );
                }
                state.holes_found += holes.len();
                self.store
                    .log(
                        blueprint_id,
                        "hole_analysis",
                        json!({ "iteration": iteration, "depth": depth.as_str(), "holes_found": holes.len() }),
                    )
                    .await?;
            }

            self.patch_open_holes(blueprint_id, profile, state).await?;

            if iteration >= EARLY_EXIT_MIN_ITERATION && self.store.count_open_holes(blueprint_id).await? == 0 {
                let check = self
                    .probe(blueprint_id, iteration, TestCategory::Consistency, MAX_INTENSITY, state)
                    .await?;
                if check.passed() {
                    self.store
                        .log(blueprint_id, "early_completion", json!({ "iteration": iteration }))
                        .await?;
                    info!(iteration, "no open holes and consistency check passed, finishing early");
                    return Ok(StopReason::EarlyCompletion);
                }
            }
        }

        Ok(StopReason::IterationLimit)
    }

    /// Run one stress test, bracketed by its lifecycle events.
    async fn probe(
        &self,
        blueprint_id: Uuid,
        iteration: u32,
        category: TestCategory,
        intensity: u8,
        state: &mut RunState,
    ) -> DomainResult<StressTestReport> {
        debug!(iteration, category = %category.as_str(), intensity, "running stress test");
        self.events.emit(
            blueprint_id,
            EventPayload::StressTestRunning {
                iteration,
                category,
                intensity,
            },
        );

        let report = self.stress_tester.run_test(blueprint_id, category, intensity).await?;
        for hole in &report.holes {
            self.events.emit(
                blueprint_id,
                EventPayload::HoleFound {
                    hole_id: hole.id,
                    hole_type: hole.hole_type,
                    severity: hole.severity,
                },
            );
        }
        state.holes_found += report.holes.len();

        self.events.emit(
            blueprint_id,
            EventPayload::StressTestComplete {
                iteration,
                category,
                intensity,
                passed: report.passed(),
                holes_found: report.holes.len(),
            },
        );
        Ok(report)
    }

    async fn patch_open_holes(
        &self,
        blueprint_id: Uuid,
        profile: DepthProfile,
        state: &mut RunState,
    ) -> DomainResult<()> {
        let research_limit = profile.research_limit();
        let open = self
            .store
            .get_holes_for_blueprint(blueprint_id, Some(HoleStatus::Open))
            .await?;

        for hole in open {
            if research_limit.is_some_and(|limit| state.research_queries >= limit) {
                debug!(research_queries = state.research_queries, "research budget exhausted");
                break;
            }
            let Some(remediation) = self.optimizer.research_for_hole(&hole) else {
                continue;
            };
            state.research_queries += 1;

            if remediation.token_cost > state.remaining_budget() {
                self.skip_patch(blueprint_id, hole.id, "insufficient token budget").await?;
                continue;
            }

            match self
                .optimizer
                .apply_patch(blueprint_id, hole.id, &remediation.patch_text)
                .await
            {
                Ok(applied) => {
                    state.tokens_used += applied.tokens_charged;
                    state.holes_patched += 1;
                    self.events.emit(
                        blueprint_id,
                        EventPayload::HolePatched {
                            hole_id: applied.hole_id,
                            hole_type: applied.hole_type,
                            tokens_charged: applied.tokens_charged,
                        },
                    );
                }
                Err(err) if err.kind() == ErrorKind::BudgetExceeded => {
                    self.skip_patch(blueprint_id, hole.id, &err.to_string()).await?;
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    async fn skip_patch(&self, blueprint_id: Uuid, hole_id: Uuid, reason: &str) -> DomainResult<()> {
        warn!(%hole_id, reason, "patch skipped");
        self.store
            .log(blueprint_id, "patch_skipped", json!({ "hole_id": hole_id, "reason": reason }))
            .await
    }

    async fn finalize(
        &self,
        blueprint_id: Uuid,
        stop_reason: StopReason,
        started: Instant,
        state: &RunState,
    ) -> DomainResult<PercolationOutcome> {
        let holes = self.store.get_holes_for_blueprint(blueprint_id, None).await?;
        let tests = self.store.get_stress_tests_for_blueprint(blueprint_id).await?;
        let optimizations = self.store.get_optimizations_for_blueprint(blueprint_id).await?;

        let mut score = self.scorer.score(&holes, &tests, &optimizations);
        let timed_out = stop_reason == StopReason::Timeout;
        let elapsed = elapsed_ms(started);

        if timed_out {
            score = self.scorer.apply_timeout_penalty(score);
            self.store
                .log(
                    blueprint_id,
                    "percolation_timeout",
                    json!({ "iterations": state.iterations, "elapsed_ms": elapsed }),
                )
                .await?;
            warn!(iterations = state.iterations, elapsed_ms = elapsed, "percolation timed out");
            self.events.emit(
                blueprint_id,
                EventPayload::PercolationTimeout {
                    iterations: state.iterations,
                    elapsed_ms: elapsed,
                },
            );
        }

        // Nothing fallible may follow the terminal status write.
        self.store
            .log(
                blueprint_id,
                "percolation_complete",
                json!({
                    "iterations": state.iterations,
                    "confidence_score": score,
                    "stop_reason": stop_reason.as_str(),
                    "holes_found": state.holes_found,
                    "holes_patched": state.holes_patched,
                    "tokens_used": state.tokens_used,
                }),
            )
            .await?;
        self.store
            .update_status(blueprint_id, BlueprintStatus::Completed, Some(score))
            .await?;
        info!(
            iterations = state.iterations,
            confidence_score = score,
            stop_reason = stop_reason.as_str(),
            "percolation complete"
        );
        self.events.emit(
            blueprint_id,
            EventPayload::PercolationComplete {
                iterations: state.iterations,
                confidence_score: score,
                timed_out,
            },
        );

        Ok(PercolationOutcome {
            blueprint_id,
            iterations: state.iterations,
            confidence_score: score,
            stop_reason,
            timed_out,
            holes_found: state.holes_found,
            holes_patched: state.holes_patched,
            research_queries: state.research_queries,
            tokens_used: state.tokens_used,
            elapsed_ms: elapsed,
        })
    }

    /// Mark the blueprint failed. Partial progress is kept, and a blueprint
    /// that already reached a terminal status keeps it.
    async fn fail(&self, blueprint_id: Uuid, err: &DomainError) {
        error!(%blueprint_id, error = %err, "percolation failed");
        match self.store.get_blueprint(blueprint_id).await {
            Ok(Some(bp)) if bp.status.is_terminal() => {
                warn!(%blueprint_id, status = bp.status.as_str(), "blueprint already terminal, status kept");
            }
            _ => {
                if let Err(e) = self
                    .store
                    .update_status(blueprint_id, BlueprintStatus::Failed, None)
                    .await
                {
                    warn!(%blueprint_id, error = %e, "could not mark blueprint failed");
                }
            }
        }
        if let Err(e) = self
            .store
            .log(blueprint_id, "percolation_failed", json!({ "error": err.to_string() }))
            .await
        {
            warn!(%blueprint_id, error = %e, "could not record failure");
        }
        self.events.emit(
            blueprint_id,
            EventPayload::PercolationFailed {
                error: err.to_string(),
            },
        );
    }
}
