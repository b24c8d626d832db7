//! End-to-end percolation over a real (in-memory) SQLite store.

mod common;

use common::{percolation_config, Harness, LEAKY_PLAN};
use percolator::domain::models::{BlueprintStatus, HoleStatus, PercolationDepth};
use percolator::domain::ports::BlueprintStore;
use percolator::services::{EventPayload, EventType, StopReason};
use percolator::ErrorKind;

#[tokio::test]
async fn test_quick_percolation_finds_and_patches_holes() {
    let h = Harness::new(percolation_config(60_000, 5)).await;
    let bp = h.submit(LEAKY_PLAN, PercolationDepth::Quick).await;
    let mut sub = h.events.subscribe();

    let outcome = h.engine.percolate(bp.id).await.unwrap();

    assert!(outcome.iterations >= 1 && outcome.iterations <= 3);
    assert!(!outcome.timed_out);
    assert_ne!(outcome.stop_reason, StopReason::Timeout);
    assert!(outcome.holes_found > 0, "edge-case stress test should flag the missing failure handling");
    assert_eq!(outcome.research_queries, 1, "quick depth allows one research query");
    assert_eq!(outcome.holes_patched, 1);
    assert!((0.0..=1.0).contains(&outcome.confidence_score));
    assert!(outcome.confidence_score > 0.0);

    let stored = h.store.get_blueprint(bp.id).await.unwrap().unwrap();
    assert_eq!(stored.status, BlueprintStatus::Completed);
    assert!(stored.completed_at.is_some());
    assert_eq!(stored.original_content, LEAKY_PLAN);
    assert!(stored.current_content.starts_with(LEAKY_PLAN));
    assert!(stored
        .current_content
        .contains("<!-- percolator:patch missing_error_handling -->"));
    assert_eq!(stored.tokens_used, outcome.tokens_used);
    assert!(stored.tokens_used <= stored.budget_tokens);
    assert!((stored.confidence_score - outcome.confidence_score).abs() < 1e-12);

    let holes = h.store.get_holes_for_blueprint(bp.id, None).await.unwrap();
    assert_eq!(holes.len(), outcome.holes_found);
    let patched: Vec<_> = holes.iter().filter(|h| h.status == HoleStatus::Patched).collect();
    assert_eq!(patched.len(), 1);
    assert!(patched[0].patched_at.is_some());

    let events = sub.drain();
    assert_eq!(events.first().unwrap().event_type(), EventType::PercolationStarted);
    match &events.last().unwrap().payload {
        EventPayload::PercolationComplete {
            iterations,
            confidence_score,
            timed_out,
        } => {
            assert_eq!(*iterations, outcome.iterations);
            assert!((confidence_score - outcome.confidence_score).abs() < 1e-12);
            assert!(!timed_out);
        }
        other => panic!("expected completion last, got {other:?}"),
    }
    let count = |t: EventType| events.iter().filter(|e| e.event_type() == t).count();
    assert_eq!(count(EventType::HoleFound), outcome.holes_found);
    assert_eq!(count(EventType::HolePatched), outcome.holes_patched);
    assert_eq!(count(EventType::StressTestRunning), count(EventType::StressTestComplete));
    assert!(events.iter().all(|e| e.blueprint_id == bp.id));
}

#[tokio::test]
async fn test_audit_log_brackets_the_run() {
    let h = Harness::new(percolation_config(60_000, 5)).await;
    let bp = h.submit(LEAKY_PLAN, PercolationDepth::Quick).await;

    h.engine.percolate(bp.id).await.unwrap();

    let actions: Vec<String> = h
        .service
        .logs(bp.id)
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.action)
        .collect();
    assert_eq!(actions[0], "blueprint_submitted");
    assert_eq!(actions[1], "percolation_started");
    assert_eq!(actions.last().unwrap(), "percolation_complete");
    assert!(actions.iter().any(|a| a == "stress_test"));
    assert!(actions.iter().any(|a| a == "hole_analysis"));
}

#[tokio::test]
async fn test_report_matches_persisted_score() {
    let h = Harness::new(percolation_config(60_000, 5)).await;
    let bp = h.submit(LEAKY_PLAN, PercolationDepth::Quick).await;

    let outcome = h.engine.percolate(bp.id).await.unwrap();
    let report = h.service.report(bp.id).await.unwrap();

    assert_eq!(report.breakdown.total_holes, outcome.holes_found);
    assert_eq!(report.breakdown.patched_holes, outcome.holes_patched);
    assert!(report.breakdown.test_runs >= outcome.iterations as usize);
    assert!((report.breakdown.score - report.blueprint.confidence_score).abs() < 1e-12);
}

#[tokio::test]
async fn test_completed_blueprint_cannot_percolate_again() {
    let h = Harness::new(percolation_config(60_000, 5)).await;
    let bp = h.submit(LEAKY_PLAN, PercolationDepth::Quick).await;

    h.engine.percolate(bp.id).await.unwrap();
    let err = h.engine.percolate(bp.id).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidState);
    assert!(!h.engine.is_percolating(bp.id));
    let stored = h.store.get_blueprint(bp.id).await.unwrap().unwrap();
    assert_eq!(stored.status, BlueprintStatus::Completed, "rejection must not fail the blueprint");
}

#[tokio::test]
async fn test_optimization_after_percolation_charges_budget() {
    let h = Harness::new(percolation_config(60_000, 5)).await;
    let bp = h.submit(LEAKY_PLAN, PercolationDepth::Quick).await;
    h.engine.percolate(bp.id).await.unwrap();
    let before = h.store.get_blueprint(bp.id).await.unwrap().unwrap();

    let opt = h
        .engine
        .optimizer()
        .apply_optimization(bp.id, "review", "clarify storage", "Use the primary database.")
        .await
        .unwrap();

    let after = h.store.get_blueprint(bp.id).await.unwrap().unwrap();
    assert_eq!(after.tokens_used, before.tokens_used + opt.token_cost);
    assert!(after
        .current_content
        .ends_with("<!-- percolator:optimization review -->\nUse the primary database.\n"));
}
