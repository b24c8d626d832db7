//! Admission control: one run per blueprint, bounded runs per engine.

mod common;

use common::{percolation_config, Harness, LEAKY_PLAN};
use percolator::domain::models::{BlueprintStatus, PercolationDepth};
use percolator::domain::ports::BlueprintStore;
use percolator::{DomainError, ErrorKind};
use uuid::Uuid;

#[tokio::test]
async fn test_simultaneous_requests_for_same_blueprint() {
    let h = Harness::new(percolation_config(60_000, 5)).await;
    let bp = h.submit(LEAKY_PLAN, PercolationDepth::Quick).await;

    let (first, second) = tokio::join!(h.engine.percolate(bp.id), h.engine.percolate(bp.id));

    let first = first.unwrap();
    assert_eq!(first.blueprint_id, bp.id);
    let err = second.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert!(matches!(err, DomainError::AlreadyPercolating(id) if id == bp.id));

    // Exactly one run left a trace
    let starts = h
        .service
        .logs(bp.id)
        .await
        .unwrap()
        .iter()
        .filter(|e| e.action == "percolation_started")
        .count();
    assert_eq!(starts, 1);
}

#[tokio::test]
async fn test_capacity_limit_and_release() {
    let h = Harness::new(percolation_config(60_000, 1)).await;
    let a = h.submit(LEAKY_PLAN, PercolationDepth::Quick).await;
    let b = h.submit(LEAKY_PLAN, PercolationDepth::Quick).await;

    let handle = h.engine.spawn(a.id).unwrap();
    assert!(h.engine.is_percolating(a.id));

    let err = h.engine.percolate(b.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ResourceExhausted);
    assert!(matches!(err, DomainError::ConcurrencyLimitReached { limit: 1 }));
    let untouched = h.store.get_blueprint(b.id).await.unwrap().unwrap();
    assert_eq!(untouched.status, BlueprintStatus::Pending);

    handle.await.unwrap().unwrap();
    assert!(h.engine.active_percolations().is_empty());

    let outcome = h.engine.percolate(b.id).await.unwrap();
    assert_eq!(outcome.blueprint_id, b.id);
}

#[tokio::test]
async fn test_rejected_lookup_releases_slot() {
    let h = Harness::new(percolation_config(60_000, 1)).await;

    let err = h.engine.percolate(Uuid::new_v4()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(h.engine.active_percolations().is_empty());

    let bp = h.submit(LEAKY_PLAN, PercolationDepth::Quick).await;
    assert!(h.engine.percolate(bp.id).await.is_ok());
}

#[tokio::test]
async fn test_parallel_runs_on_distinct_blueprints() {
    let h = Harness::new(percolation_config(60_000, 4)).await;
    let mut ids = Vec::new();
    for _ in 0..4 {
        ids.push(h.submit(LEAKY_PLAN, PercolationDepth::Quick).await.id);
    }

    let handles: Vec<_> = ids.iter().map(|id| h.engine.spawn(*id).unwrap()).collect();
    assert_eq!(h.engine.active_percolations().len(), 4);
    for joined in futures::future::join_all(handles).await {
        joined.unwrap().unwrap();
    }

    for id in ids {
        let bp = h.store.get_blueprint(id).await.unwrap().unwrap();
        assert_eq!(bp.status, BlueprintStatus::Completed);
    }
    assert!(h.engine.active_percolations().is_empty());
}

#[tokio::test]
async fn test_capacity_is_checked_before_lookup() {
    let h = Harness::new(percolation_config(60_000, 1)).await;
    let a = h.submit(LEAKY_PLAN, PercolationDepth::Quick).await;

    let handle = h.engine.spawn(a.id).unwrap();
    let err = h.engine.percolate(Uuid::new_v4()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ResourceExhausted);

    handle.await.unwrap().unwrap();
}
