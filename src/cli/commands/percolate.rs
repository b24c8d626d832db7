//! `percolator percolate`: run the engine on a pending blueprint.

use anyhow::{Context, Result};
use clap::Args;
use std::sync::Arc;
use uuid::Uuid;

use crate::cli::open_store;
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::Config;
use crate::services::{
    EventBus, EventBusConfig, EventPayload, PercolationEngine, PercolationEvent, PercolationOutcome,
};

#[derive(Args, Debug)]
pub struct PercolateArgs {
    /// Blueprint ID
    pub id: Uuid,

    /// Print lifecycle events as they happen
    #[arg(short, long)]
    pub watch: bool,
}

#[derive(Debug, serde::Serialize)]
pub struct PercolateOutput {
    pub success: bool,
    pub outcome: PercolationOutcome,
}

impl CommandOutput for PercolateOutput {
    fn to_human(&self) -> String {
        let o = &self.outcome;
        let mut lines = vec![
            format!("Percolation complete: {}", o.blueprint_id),
            format!("  Iterations: {} (stopped: {})", o.iterations, o.stop_reason.as_str()),
            format!("  Confidence: {:.3}", o.confidence_score),
            format!("  Holes: {} found, {} patched", o.holes_found, o.holes_patched),
            format!("  Research queries: {}", o.research_queries),
            format!("  Tokens used: {}", o.tokens_used),
            format!("  Elapsed: {}ms", o.elapsed_ms),
        ];
        if o.timed_out {
            lines.push("  Timed out: confidence penalized".to_string());
        }
        lines.join("\n")
    }
}

pub async fn execute(args: PercolateArgs, config: &Config, json_mode: bool) -> Result<()> {
    let store = open_store(config).await?;
    let events = Arc::new(EventBus::new(EventBusConfig {
        channel_capacity: config.percolation.event_channel_capacity,
    }));
    let engine = Arc::new(PercolationEngine::new(
        store,
        events.clone(),
        config.percolation.clone(),
        config.limits,
    ));

    let outcome = if args.watch {
        let mut subscription = events.subscribe();
        let mut handle = engine.spawn(args.id)?;
        let joined = loop {
            tokio::select! {
                joined = &mut handle => break joined,
                Some(event) = subscription.recv() => print_event(&event, json_mode),
            }
        };
        for event in subscription.drain() {
            print_event(&event, json_mode);
        }
        joined.context("Percolation task panicked")??
    } else {
        engine.percolate(args.id).await?
    };

    output(
        &PercolateOutput {
            success: true,
            outcome,
        },
        json_mode,
    );
    Ok(())
}

fn print_event(event: &PercolationEvent, json_mode: bool) {
    if json_mode {
        println!("{}", serde_json::to_string(event).unwrap_or_default());
    } else {
        println!("[{}] {}", event.timestamp.format("%H:%M:%S%.3f"), describe(&event.payload));
    }
}

/// One-line human description of an event.
fn describe(payload: &EventPayload) -> String {
    match payload {
        EventPayload::PercolationStarted {
            depth,
            max_iterations,
            budget_tokens,
        } => format!("started: depth {depth}, up to {max_iterations} iterations, {budget_tokens} tokens"),
        EventPayload::StressTestRunning {
            iteration,
            category,
            intensity,
        } => format!("iteration {iteration}: {category} test at intensity {intensity}"),
        EventPayload::StressTestComplete {
            iteration,
            passed,
            holes_found,
            ..
        } => {
            let verdict = if *passed { "passed" } else { "failed" };
            format!("iteration {iteration}: {verdict}, {holes_found} hole(s)")
        }
        EventPayload::HoleFound {
            hole_type, severity, ..
        } => format!("hole found: {hole_type} ({severity})"),
        EventPayload::HolePatched {
            hole_type,
            tokens_charged,
            ..
        } => format!("hole patched: {hole_type} (-{tokens_charged} tokens)"),
        EventPayload::OptimizationApplied { source, token_cost, .. } => {
            format!("optimization applied from {source} (-{token_cost} tokens)")
        }
        EventPayload::PercolationComplete {
            iterations,
            confidence_score,
            timed_out,
        } => {
            let suffix = if *timed_out { ", timed out" } else { "" };
            format!("complete after {iterations} iteration(s): confidence {confidence_score:.3}{suffix}")
        }
        EventPayload::PercolationFailed { error } => format!("failed: {error}"),
        EventPayload::PercolationTimeout { iterations, elapsed_ms } => {
            format!("timeout after {iterations} iteration(s), {elapsed_ms}ms")
        }
    }
}
