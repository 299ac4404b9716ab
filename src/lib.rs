//! Synheart Orchestrator - On-device orchestration engine for adaptive
//! wellbeing session analysis
//!
//! The orchestrator continuously scores a user's behavioral session data
//! against two families of pluggable algorithm units (emotional state and
//! neuroplasticity), combines their outputs into unified wellbeing, risk,
//! and opportunity indicators, and drives two downstream work queues:
//! interventions (urgent) and optimizations (non-urgent).
//!
//! ## Architecture
//!
//! - **Session Lifecycle**: one active session at a time
//!   (`Idle → Active → Completed`), owned by the [`Orchestrator`]
//! - **Dual cadence**: a per-event realtime fast path over a rolling
//!   window plus a timer-driven periodic full pass over the accumulated
//!   window
//! - **Algorithm registry**: ordered unit sets per family with validated
//!   weight tables and per-unit failure isolation
//! - **Queues**: append-only intervention/optimization queues with
//!   snapshot reads and idempotent completion
//!
//! Collection and persistence are external collaborators behind the
//! [`DataCollector`] and [`AnalysisSink`] seams; the orchestrator itself
//! performs no network or disk I/O.

pub mod aggregator;
pub mod algorithms;
pub mod baseline;
pub mod collector;
pub mod error;
pub mod orchestrator;
pub mod queue;
pub mod realtime;
pub mod registry;
pub mod sink;
pub mod types;
pub mod window;

pub use error::OrchestratorError;
pub use orchestrator::{Orchestrator, OrchestratorStatus};

// Collaborator seams
pub use collector::{BufferingCollector, CollectorSummary, DataCollector, InteractionEvent};
pub use sink::{AnalysisSink, InMemorySink};

// Core data model
pub use queue::{QueueDepths, QueueManager, QueueSnapshot};
pub use registry::{AlgorithmRegistry, AnalysisEngine, WeightTable};
pub use types::{
    AlgorithmResult, IntegratedAnalysis, Priority, QueueItem, QueueKind, Session, SessionConfig,
    SessionReport, SessionStatus, TrendDirection, UserProfile,
};

/// Orchestrator version embedded in all session reports
pub const ORCHESTRATOR_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for session reports
pub const PRODUCER_NAME: &str = "synheart-orchestrator";
