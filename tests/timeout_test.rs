//! Wall-clock timeout: the run still completes, with a penalized score.

mod common;

use common::{percolation_config, Harness, LEAKY_PLAN};
use percolator::domain::models::{BlueprintStatus, PercolationDepth};
use percolator::domain::ports::BlueprintStore;
use percolator::services::{ConfidenceScorer, EventPayload, EventType, StopReason};

#[tokio::test]
async fn test_zero_timeout_runs_one_iteration_and_penalizes() {
    let h = Harness::new(percolation_config(0, 5)).await;
    let bp = h.submit(LEAKY_PLAN, PercolationDepth::Standard).await;
    let mut sub = h.events.subscribe();

    let outcome = h.engine.percolate(bp.id).await.unwrap();

    assert_eq!(outcome.iterations, 1, "the first iteration always runs");
    assert!(outcome.timed_out);
    assert_eq!(outcome.stop_reason, StopReason::Timeout);

    let holes = h.store.get_holes_for_blueprint(bp.id, None).await.unwrap();
    let tests = h.store.get_stress_tests_for_blueprint(bp.id).await.unwrap();
    let optimizations = h.store.get_optimizations_for_blueprint(bp.id).await.unwrap();
    let raw = ConfidenceScorer::new().score(&holes, &tests, &optimizations);
    assert!((outcome.confidence_score - raw * 0.8).abs() < 1e-12);

    let stored = h.store.get_blueprint(bp.id).await.unwrap().unwrap();
    assert_eq!(stored.status, BlueprintStatus::Completed);
    assert!((stored.confidence_score - outcome.confidence_score).abs() < 1e-12);

    let events = sub.drain();
    let kinds: Vec<EventType> = events.iter().map(|e| e.event_type()).collect();
    let timeout_at = kinds
        .iter()
        .position(|k| *k == EventType::PercolationTimeout)
        .expect("timeout event");
    assert_eq!(kinds[timeout_at + 1], EventType::PercolationComplete);
    assert_eq!(timeout_at + 2, kinds.len());
    match &events.last().unwrap().payload {
        EventPayload::PercolationComplete { timed_out, .. } => assert!(*timed_out),
        other => panic!("expected completion, got {other:?}"),
    }

    let actions: Vec<String> = h.service.logs(bp.id).await.unwrap().into_iter().map(|e| e.action).collect();
    assert!(actions.iter().any(|a| a == "percolation_timeout"));
    assert_eq!(actions.last().unwrap(), "percolation_complete");
}

#[tokio::test]
async fn test_generous_timeout_is_not_penalized() {
    let h = Harness::new(percolation_config(600_000, 5)).await;
    let bp = h.submit(LEAKY_PLAN, PercolationDepth::Quick).await;

    let outcome = h.engine.percolate(bp.id).await.unwrap();

    assert!(!outcome.timed_out);
    let holes = h.store.get_holes_for_blueprint(bp.id, None).await.unwrap();
    let tests = h.store.get_stress_tests_for_blueprint(bp.id).await.unwrap();
    let optimizations = h.store.get_optimizations_for_blueprint(bp.id).await.unwrap();
    let raw = ConfidenceScorer::new().score(&holes, &tests, &optimizations);
    assert!((outcome.confidence_score - raw).abs() < 1e-12);
}
