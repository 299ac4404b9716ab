//! Realtime event processing
//!
//! The latency-sensitive fast path: scores the rolling window with the
//! priority subset of each family, derives composite risk and opportunity,
//! and emits queue items when thresholds are crossed. Never waits on the
//! periodic aggregator.

use std::sync::Arc;

use tracing::debug;

use crate::queue::QueueManager;
use crate::registry::{AnalysisEngine, RISK_CONTRIBUTORS};
use crate::types::{IntegratedAnalysis, Priority, QueueItem, QueueKind, UserProfile};
use crate::window::MetricsWindow;

/// Composite risk score above which an intervention is emitted
pub const RISK_THRESHOLD: f64 = 0.7;

/// Single risk-contributor score above which an intervention is emitted
/// even when the composite stays below `RISK_THRESHOLD`
pub const SINGLE_RISK_THRESHOLD: f64 = 0.8;

/// Composite opportunity score above which an optimization is emitted
pub const OPPORTUNITY_THRESHOLD: f64 = 0.7;

/// Number of recent events kept in the rolling realtime buffer
pub const DEFAULT_REALTIME_BUFFER: usize = 50;

/// Minimum rolling-window span in seconds, so per-minute rates stay
/// meaningful for a burst of very recent events
pub const REALTIME_WINDOW_MIN_SEC: i64 = 30;

/// Outcome of one realtime pass
#[derive(Debug, Clone)]
pub struct RealtimePass {
    /// Integrated analysis over the priority subset
    pub analysis: IntegratedAnalysis,
    /// Intervention emitted by this pass, if any
    pub intervention: Option<QueueItem>,
    /// Optimization emitted by this pass, if any
    pub optimization: Option<QueueItem>,
}

/// Scores the rolling window and drives queue emission per event.
pub struct RealtimeProcessor {
    engine: Arc<AnalysisEngine>,
    queues: Arc<QueueManager>,
}

impl RealtimeProcessor {
    pub fn new(engine: Arc<AnalysisEngine>, queues: Arc<QueueManager>) -> Self {
        Self { engine, queues }
    }

    /// Run the priority-subset pass over the rolling window.
    ///
    /// The risk and opportunity checks are independent; both, one, or
    /// neither queue item may be emitted per event.
    pub fn process(&self, profile: &UserProfile, window: &MetricsWindow) -> RealtimePass {
        let results = self.engine.run_realtime(profile, window);
        let analysis = self.engine.integrate(&results);

        let single_risk_spike = results.iter().any(|r| {
            RISK_CONTRIBUTORS.contains(&r.algorithm_name.as_str())
                && r.score > SINGLE_RISK_THRESHOLD
        });

        let intervention = if analysis.risk_score > RISK_THRESHOLD || single_risk_spike {
            self.queues.enqueue(
                QueueKind::Intervention,
                Priority::Immediate,
                analysis.clone(),
            )
        } else {
            None
        };

        let optimization = if analysis.opportunity_score > OPPORTUNITY_THRESHOLD {
            self.queues
                .enqueue(QueueKind::Optimization, Priority::Medium, analysis.clone())
        } else {
            None
        };

        debug!(
            risk = analysis.risk_score,
            opportunity = analysis.opportunity_score,
            intervention = intervention.is_some(),
            optimization = optimization.is_some(),
            "Realtime pass complete"
        );

        RealtimePass {
            analysis,
            intervention,
            optimization,
        }
    }
}
