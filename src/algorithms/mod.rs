//! Pluggable analysis algorithm units
//!
//! Each unit is a stateless scorer mapping a user profile and a metrics
//! window to a bounded score/confidence/insight result. Units are grouped
//! into two families (emotional state and neuroplasticity) and executed
//! through the registry, which isolates per-unit failures.
//!
//! Contract: every unit clamps its score and confidence to 0-1 and returns
//! a zero score with zero confidence for a window with no events, so an
//! empty session integrates to zero rather than a fabricated neutral value.

pub mod emotional;
pub mod neuroplasticity;

use serde::{Deserialize, Serialize};

use crate::error::OrchestratorError;
use crate::types::{AlgorithmResult, UserProfile};
use crate::window::{MetricsWindow, WindowQualityFlag};

/// Algorithm family a unit belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlgorithmFamily {
    Emotional,
    Neuroplasticity,
}

impl AlgorithmFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlgorithmFamily::Emotional => "emotional",
            AlgorithmFamily::Neuroplasticity => "neuroplasticity",
        }
    }
}

/// Canonical unit names, shared by weight tables and composite scoring
pub mod names {
    pub const FRUSTRATION: &str = "frustration";
    pub const ANXIETY: &str = "anxiety";
    pub const ENGAGEMENT: &str = "engagement";
    pub const MOTIVATION: &str = "motivation";
    pub const COGNITIVE_OVERLOAD: &str = "cognitive_overload";
    pub const EMOTIONAL_STABILITY: &str = "emotional_stability";
    pub const STRESS_RESPONSE: &str = "stress_response";

    pub const IMPROVEMENT_POTENTIAL: &str = "improvement_potential";
    pub const LEARNING_VELOCITY: &str = "learning_velocity";
    pub const MEMORY_CONSOLIDATION: &str = "memory_consolidation";
    pub const ATTENTION_TRAINING: &str = "attention_training";
    pub const COGNITIVE_FLEXIBILITY: &str = "cognitive_flexibility";
    pub const NEURAL_ADAPTATION: &str = "neural_adaptation";
}

/// A stateless scoring unit.
///
/// Implementations must be pure with respect to their inputs; the registry
/// may execute units from both families in parallel.
pub trait AlgorithmUnit: Send + Sync {
    /// Unit name (lower_snake_case, stable across releases).
    fn name(&self) -> &'static str;

    /// Family the unit belongs to.
    fn family(&self) -> AlgorithmFamily;

    /// Score the window. Full-fidelity pass.
    fn execute(
        &self,
        profile: &UserProfile,
        window: &MetricsWindow,
    ) -> Result<AlgorithmResult, OrchestratorError>;

    /// Score the window on the latency-sensitive realtime path.
    ///
    /// Defaults to the full pass; units with an expensive full pass can
    /// override with a cheaper approximation.
    fn execute_realtime(
        &self,
        profile: &UserProfile,
        window: &MetricsWindow,
    ) -> Result<AlgorithmResult, OrchestratorError> {
        self.execute(profile, window)
    }
}

/// Exponential saturation: maps an unbounded non-negative rate onto 0-1.
///
/// Formula: `1.0 - exp(-value / scale)`; `scale` is the value at which the
/// output reaches ~63%.
pub(crate) fn saturate(value: f64, scale: f64) -> f64 {
    if scale <= 0.0 {
        return 0.0;
    }
    (1.0 - (-value.max(0.0) / scale).exp()).clamp(0.0, 1.0)
}

/// Burstiness of inter-event gaps via the Barabási formula, normalized to 0-1.
///
/// 0.0 = perfectly regular, 0.5 = random, 1.0 = very bursty. Returns 0.5
/// when there is not enough data to judge.
pub(crate) fn burstiness(inter_event_gaps: &[f64]) -> f64 {
    if inter_event_gaps.len() < 2 {
        return 0.5;
    }

    let n = inter_event_gaps.len() as f64;
    let mean: f64 = inter_event_gaps.iter().sum::<f64>() / n;
    if mean <= 0.0 {
        return 0.5;
    }

    let variance: f64 = inter_event_gaps
        .iter()
        .map(|x| (x - mean).powi(2))
        .sum::<f64>()
        / n;
    let std_dev = variance.sqrt();

    let barabasi = (std_dev - mean) / (std_dev + mean);
    ((barabasi + 1.0) / 2.0).clamp(0.0, 1.0)
}

/// Events per minute over the window.
pub(crate) fn events_per_min(window: &MetricsWindow) -> f64 {
    if window.duration_sec <= 0.0 {
        return 0.0;
    }
    window.total_events as f64 / (window.duration_sec / 60.0)
}

/// Baseline confidence for a pass over this window, reduced per quality flag.
pub(crate) fn window_confidence(window: &MetricsWindow) -> f64 {
    let mut confidence: f64 = 0.9;
    for flag in &window.quality_flags {
        confidence -= match flag {
            WindowQualityFlag::ShortWindow => 0.15,
            WindowQualityFlag::LowEventCount => 0.2,
            WindowQualityFlag::NoSelfReports => 0.05,
            WindowQualityFlag::CollectorDegraded => 0.25,
        };
    }
    confidence.clamp(0.1, 1.0)
}

/// Zero-score, zero-confidence result for a window with no events.
pub(crate) fn empty_window_result(name: &'static str) -> AlgorithmResult {
    AlgorithmResult::new(name, 0.0, 0.0)
}

/// Weighted mean over the terms that are present, re-normalized over the
/// present terms' weights. Returns 0.0 when no term is present.
pub(crate) fn weighted_present(terms: &[(Option<f64>, f64)]) -> f64 {
    let mut numerator = 0.0;
    let mut denominator = 0.0;
    for (value, weight) in terms {
        if let Some(v) = value {
            numerator += v.clamp(0.0, 1.0) * weight;
            denominator += weight;
        }
    }
    if denominator <= 0.0 {
        return 0.0;
    }
    (numerator / denominator).clamp(0.0, 1.0)
}
