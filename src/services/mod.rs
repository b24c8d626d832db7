//! Services layer: the percolation engine and the collaborators it drives.

pub mod admission;
pub mod analyzers;
pub mod blueprint_service;
pub mod confidence;
pub mod event_bus;
pub mod hole_finder;
pub mod optimizer;
pub mod percolation_engine;
pub mod stress_tester;

pub use admission::{ActivePercolations, AdmissionPermit};
pub use blueprint_service::{BlueprintReport, BlueprintService};
pub use confidence::{ConfidenceBreakdown, ConfidenceScorer};
pub use event_bus::{EventBus, EventBusConfig, EventPayload, EventSubscription, EventType, PercolationEvent};
pub use hole_finder::HoleFinder;
pub use optimizer::{AppliedPatch, Optimizer, Remediation};
pub use percolation_engine::{PercolationEngine, PercolationOutcome, StopReason};
pub use stress_tester::{StressTestReport, StressTester};
