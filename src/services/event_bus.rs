//! EventBus service for percolation lifecycle events.
//!
//! Events are delivered in-process over a broadcast channel. Publishing never
//! blocks; a subscriber that falls behind loses the oldest events. Nothing is
//! persisted or replayed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use uuid::Uuid;

use crate::domain::models::{HoleSeverity, HoleType, PercolationDepth, TestCategory};

/// Discriminant of an [`EventPayload`], used for filtered subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    PercolationStarted,
    StressTestRunning,
    StressTestComplete,
    HoleFound,
    HolePatched,
    OptimizationApplied,
    PercolationComplete,
    PercolationFailed,
    PercolationTimeout,
}

impl EventType {
    pub const ALL: [EventType; 9] = [
        Self::PercolationStarted,
        Self::StressTestRunning,
        Self::StressTestComplete,
        Self::HoleFound,
        Self::HolePatched,
        Self::OptimizationApplied,
        Self::PercolationComplete,
        Self::PercolationFailed,
        Self::PercolationTimeout,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PercolationStarted => "percolation_started",
            Self::StressTestRunning => "stress_test_running",
            Self::StressTestComplete => "stress_test_complete",
            Self::HoleFound => "hole_found",
            Self::HolePatched => "hole_patched",
            Self::OptimizationApplied => "optimization_applied",
            Self::PercolationComplete => "percolation_complete",
            Self::PercolationFailed => "percolation_failed",
            Self::PercolationTimeout => "percolation_timeout",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event payload; serialized as `{"type": ..., "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum EventPayload {
    PercolationStarted {
        depth: PercolationDepth,
        max_iterations: u32,
        budget_tokens: u64,
    },
    StressTestRunning {
        iteration: u32,
        category: TestCategory,
        intensity: u8,
    },
    StressTestComplete {
        iteration: u32,
        category: TestCategory,
        intensity: u8,
        passed: bool,
        holes_found: usize,
    },
    HoleFound {
        hole_id: Uuid,
        hole_type: HoleType,
        severity: HoleSeverity,
    },
    HolePatched {
        hole_id: Uuid,
        hole_type: HoleType,
        tokens_charged: u64,
    },
    OptimizationApplied {
        optimization_id: Uuid,
        source: String,
        token_cost: u64,
    },
    PercolationComplete {
        iterations: u32,
        confidence_score: f64,
        timed_out: bool,
    },
    PercolationFailed {
        error: String,
    },
    PercolationTimeout {
        iterations: u32,
        elapsed_ms: u64,
    },
}

impl EventPayload {
    pub fn event_type(&self) -> EventType {
        match self {
            Self::PercolationStarted { .. } => EventType::PercolationStarted,
            Self::StressTestRunning { .. } => EventType::StressTestRunning,
            Self::StressTestComplete { .. } => EventType::StressTestComplete,
            Self::HoleFound { .. } => EventType::HoleFound,
            Self::HolePatched { .. } => EventType::HolePatched,
            Self::OptimizationApplied { .. } => EventType::OptimizationApplied,
            Self::PercolationComplete { .. } => EventType::PercolationComplete,
            Self::PercolationFailed { .. } => EventType::PercolationFailed,
            Self::PercolationTimeout { .. } => EventType::PercolationTimeout,
        }
    }
}

/// A lifecycle event for one blueprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PercolationEvent {
    pub blueprint_id: Uuid,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl PercolationEvent {
    pub fn new(blueprint_id: Uuid, payload: EventPayload) -> Self {
        Self {
            blueprint_id,
            timestamp: Utc::now(),
            payload,
        }
    }

    pub fn event_type(&self) -> EventType {
        self.payload.event_type()
    }
}

/// Configuration for the EventBus.
#[derive(Debug, Clone)]
pub struct EventBusConfig {
    /// Channel capacity for the broadcast channel.
    pub channel_capacity: usize,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 1024,
        }
    }
}

/// Central event bus broadcasting lifecycle events to any number of subscribers.
pub struct EventBus {
    sender: broadcast::Sender<PercolationEvent>,
    published: AtomicU64,
}

impl EventBus {
    pub fn new(config: EventBusConfig) -> Self {
        let (sender, _) = broadcast::channel(config.channel_capacity.max(1));
        Self {
            sender,
            published: AtomicU64::new(0),
        }
    }

    /// Publish an event to all current subscribers.
    pub fn publish(&self, event: PercolationEvent) {
        tracing::debug!(
            blueprint_id = %event.blueprint_id,
            event_type = %event.event_type(),
            "event published"
        );
        self.published.fetch_add(1, Ordering::Relaxed);
        // No subscribers is not an error
        let _ = self.sender.send(event);
    }

    /// Convenience wrapper building the event envelope.
    pub fn emit(&self, blueprint_id: Uuid, payload: EventPayload) {
        self.publish(PercolationEvent::new(blueprint_id, payload));
    }

    /// Subscribe to every event type.
    pub fn subscribe(&self) -> EventSubscription {
        EventSubscription {
            receiver: self.sender.subscribe(),
            filter: None,
        }
    }

    /// Subscribe to a single event type.
    pub fn subscribe_to(&self, event_type: EventType) -> EventSubscription {
        EventSubscription {
            receiver: self.sender.subscribe(),
            filter: Some(event_type),
        }
    }

    /// Total number of events published since creation.
    pub fn published_count(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(EventBusConfig::default())
    }
}

/// Receiving side of a subscription, optionally filtered by type.
pub struct EventSubscription {
    receiver: broadcast::Receiver<PercolationEvent>,
    filter: Option<EventType>,
}

impl EventSubscription {
    fn accepts(&self, event: &PercolationEvent) -> bool {
        self.filter.map_or(true, |t| t == event.event_type())
    }

    /// Wait for the next matching event; `None` once the bus is dropped.
    pub async fn recv(&mut self) -> Option<PercolationEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if self.accepts(&event) => return Some(event),
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event subscriber lagged, events dropped");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Next matching event already buffered, without waiting.
    pub fn try_recv(&mut self) -> Option<PercolationEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) if self.accepts(&event) => return Some(event),
                Ok(_) | Err(TryRecvError::Lagged(_)) => {}
                Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
            }
        }
    }

    /// Drain every matching event already buffered.
    pub fn drain(&mut self) -> Vec<PercolationEvent> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }
}
