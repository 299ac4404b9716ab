//! Emotional-state algorithm units
//!
//! Seven heuristic scorers over the metrics window: frustration, anxiety,
//! engagement, motivation, cognitive overload, emotional stability, and
//! stress response. Explicit self-report hints dominate the corresponding
//! derived score when present.

use std::sync::Arc;

use crate::algorithms::{
    burstiness, empty_window_result, events_per_min, names, saturate, weighted_present,
    window_confidence, AlgorithmFamily, AlgorithmUnit,
};
use crate::error::OrchestratorError;
use crate::types::{
    AlgorithmResult, Insight, InsightKind, Recommendation, RecommendationKind, UserProfile,
};
use crate::window::MetricsWindow;

/// Score above which a unit attaches a warning insight
const WARNING_THRESHOLD: f64 = 0.7;

/// Score above which a unit attaches a positive insight
const POSITIVE_THRESHOLD: f64 = 0.7;

/// Confidence boost applied when an explicit self-report backs the score
const SELF_REPORT_CONFIDENCE_BOOST: f64 = 0.08;

/// All emotional units, in declaration order.
pub fn default_units() -> Vec<Arc<dyn AlgorithmUnit>> {
    vec![
        Arc::new(FrustrationUnit),
        Arc::new(AnxietyUnit),
        Arc::new(EngagementUnit),
        Arc::new(MotivationUnit),
        Arc::new(CognitiveOverloadUnit),
        Arc::new(EmotionalStabilityUnit),
        Arc::new(StressResponseUnit),
    ]
}

/// Default weights for the emotional family (renormalized on construction).
pub fn default_weights() -> Vec<(&'static str, f64)> {
    vec![
        (names::FRUSTRATION, 0.20),
        (names::ANXIETY, 0.15),
        (names::ENGAGEMENT, 0.20),
        (names::MOTIVATION, 0.15),
        (names::COGNITIVE_OVERLOAD, 0.15),
        (names::EMOTIONAL_STABILITY, 0.08),
        (names::STRESS_RESPONSE, 0.07),
    ]
}

/// Names of the default realtime priority subset for this family.
pub fn default_realtime_subset() -> Vec<&'static str> {
    vec![
        names::FRUSTRATION,
        names::ANXIETY,
        names::COGNITIVE_OVERLOAD,
        names::ENGAGEMENT,
    ]
}

fn hint_backed_confidence(window: &MetricsWindow, hint: Option<f64>) -> f64 {
    let base = window_confidence(window);
    if hint.is_some() {
        (base + SELF_REPORT_CONFIDENCE_BOOST).min(1.0)
    } else {
        base
    }
}

/// Error pressure: errors per minute with 1.5/min mapping to ~63%.
fn error_load(window: &MetricsWindow) -> f64 {
    saturate(window.errors_per_min, 1.5)
}

/// Response-time irregularity mapped onto 0-1.
fn slowdown(window: &MetricsWindow) -> Option<f64> {
    window.response_time_cv.map(|cv| saturate(cv, 0.8))
}

/// Correction pressure from input events.
fn correction_pressure(window: &MetricsWindow) -> Option<f64> {
    window.correction_ratio.map(|r| saturate(r, 2.0))
}

/// Pause frequency per minute, 1/min mapping to ~63%.
fn pause_frequency(window: &MetricsWindow) -> f64 {
    if window.duration_sec <= 0.0 {
        return 0.0;
    }
    saturate(window.pause_events as f64 / (window.duration_sec / 60.0), 1.0)
}

/// Task completion ratio, if any tasks were attempted.
fn completion_ratio(window: &MetricsWindow) -> Option<f64> {
    let attempted = window.completed_tasks + window.failed_tasks;
    if attempted == 0 {
        return None;
    }
    Some(window.completed_tasks as f64 / attempted as f64)
}

/// Detects friction in the interaction stream and flags frustration.
///
/// An explicit `frustration_level` self-report dominates the derived score:
/// the unit never reports less frustration than the user reported.
pub struct FrustrationUnit;

impl AlgorithmUnit for FrustrationUnit {
    fn name(&self) -> &'static str {
        names::FRUSTRATION
    }

    fn family(&self) -> AlgorithmFamily {
        AlgorithmFamily::Emotional
    }

    fn execute(
        &self,
        _profile: &UserProfile,
        window: &MetricsWindow,
    ) -> Result<AlgorithmResult, OrchestratorError> {
        if window.total_events == 0 {
            return Ok(empty_window_result(self.name()));
        }

        let derived = weighted_present(&[
            (Some(error_load(window)), 0.40),
            (Some(window.repeated_error_ratio), 0.25),
            (correction_pressure(window), 0.20),
            (slowdown(window), 0.15),
        ]);
        let hint = window.mean_frustration_hint;
        let score = match hint {
            Some(h) => derived.max(h),
            None => derived,
        };

        let mut result = AlgorithmResult::new(
            self.name(),
            score,
            hint_backed_confidence(window, hint),
        );
        if score > WARNING_THRESHOLD {
            let confidence = result.confidence;
            result = result
                .with_insight(Insight::new(
                    InsightKind::Warning,
                    "Frustration is elevated",
                    confidence,
                ))
                .with_recommendation(Recommendation::new(
                    RecommendationKind::Support,
                    "offer_support",
                    "Offer the user immediate support or a simpler path forward",
                ));
        }
        Ok(result)
    }
}

/// Scores anxiety from timing irregularity and fragmented pausing.
pub struct AnxietyUnit;

impl AlgorithmUnit for AnxietyUnit {
    fn name(&self) -> &'static str {
        names::ANXIETY
    }

    fn family(&self) -> AlgorithmFamily {
        AlgorithmFamily::Emotional
    }

    fn execute(
        &self,
        _profile: &UserProfile,
        window: &MetricsWindow,
    ) -> Result<AlgorithmResult, OrchestratorError> {
        if window.total_events == 0 {
            return Ok(empty_window_result(self.name()));
        }

        // Only burstiness above the random midpoint counts as a signal.
        let burst_excess = ((burstiness(&window.inter_event_gaps) - 0.5) * 2.0).max(0.0);
        let score = weighted_present(&[
            (slowdown(window), 0.45),
            (Some(burst_excess), 0.30),
            (Some(pause_frequency(window)), 0.25),
        ]);

        let mut result = AlgorithmResult::new(self.name(), score, window_confidence(window));
        if score > WARNING_THRESHOLD {
            let confidence = result.confidence;
            result = result.with_insight(Insight::new(
                InsightKind::Warning,
                "Interaction timing suggests elevated anxiety",
                confidence,
            ));
        }
        Ok(result)
    }
}

/// Scores engagement from activity rate, task completion, and input flow.
pub struct EngagementUnit;

impl AlgorithmUnit for EngagementUnit {
    fn name(&self) -> &'static str {
        names::ENGAGEMENT
    }

    fn family(&self) -> AlgorithmFamily {
        AlgorithmFamily::Emotional
    }

    fn execute(
        &self,
        _profile: &UserProfile,
        window: &MetricsWindow,
    ) -> Result<AlgorithmResult, OrchestratorError> {
        if window.total_events == 0 {
            return Ok(empty_window_result(self.name()));
        }

        let activity = saturate(events_per_min(window), 6.0);
        let input_flow = window.mean_input_rate.map(|r| saturate(r, 2.0));
        let derived = weighted_present(&[
            (Some(activity), 0.50),
            (completion_ratio(window), 0.30),
            (input_flow, 0.20),
        ]);
        let hint = window.mean_engagement_hint;
        let score = match hint {
            Some(h) => derived.max(h),
            None => derived,
        };

        let mut result = AlgorithmResult::new(
            self.name(),
            score,
            hint_backed_confidence(window, hint),
        );
        if score > POSITIVE_THRESHOLD {
            let confidence = result.confidence;
            result = result.with_insight(Insight::new(
                InsightKind::Opportunity,
                "Engagement is high",
                confidence,
            ));
        }
        Ok(result)
    }
}

/// Scores motivation from completion, persistence after errors, and energy.
pub struct MotivationUnit;

impl AlgorithmUnit for MotivationUnit {
    fn name(&self) -> &'static str {
        names::MOTIVATION
    }

    fn family(&self) -> AlgorithmFamily {
        AlgorithmFamily::Emotional
    }

    fn execute(
        &self,
        _profile: &UserProfile,
        window: &MetricsWindow,
    ) -> Result<AlgorithmResult, OrchestratorError> {
        if window.total_events == 0 {
            return Ok(empty_window_result(self.name()));
        }

        // Continuing to interact despite errors reads as persistence.
        let persistence = if window.error_events > 0 {
            Some(saturate(
                window.total_events as f64 / (window.error_events as f64 * 8.0),
                1.0,
            ))
        } else {
            None
        };
        let score = weighted_present(&[
            (completion_ratio(window), 0.45),
            (persistence, 0.30),
            (window.mean_energy_hint, 0.25),
        ]);

        let mut result = AlgorithmResult::new(self.name(), score, window_confidence(window));
        if score > POSITIVE_THRESHOLD {
            result = result.with_recommendation(Recommendation::new(
                RecommendationKind::Enhancement,
                "raise_challenge",
                "Motivation is high; a harder variant would sustain it",
            ));
        }
        Ok(result)
    }
}

/// Scores cognitive overload from response slowdown, errors, and corrections
/// relative to the configured difficulty.
pub struct CognitiveOverloadUnit;

impl AlgorithmUnit for CognitiveOverloadUnit {
    fn name(&self) -> &'static str {
        names::COGNITIVE_OVERLOAD
    }

    fn family(&self) -> AlgorithmFamily {
        AlgorithmFamily::Emotional
    }

    fn execute(
        &self,
        _profile: &UserProfile,
        window: &MetricsWindow,
    ) -> Result<AlgorithmResult, OrchestratorError> {
        if window.total_events == 0 {
            return Ok(empty_window_result(self.name()));
        }

        // 1.5s mean response time maps to ~63% load.
        let response_load = window
            .mean_response_time_ms
            .map(|ms| saturate(ms / 1_500.0, 1.0));
        let score = weighted_present(&[
            (response_load, 0.35),
            (Some(error_load(window)), 0.30),
            (correction_pressure(window), 0.20),
            (Some(window.difficulty), 0.15),
        ]);

        let mut result = AlgorithmResult::new(self.name(), score, window_confidence(window));
        if score > WARNING_THRESHOLD {
            let confidence = result.confidence;
            result = result
                .with_insight(Insight::new(
                    InsightKind::Warning,
                    "Cognitive load appears to exceed capacity",
                    confidence,
                ))
                .with_recommendation(Recommendation::new(
                    RecommendationKind::Adjustment,
                    "reduce_difficulty",
                    "Lower the activity difficulty to relieve cognitive load",
                ));
        }
        Ok(result)
    }
}

/// Scores how steady the user's emotional state reads over the window.
pub struct EmotionalStabilityUnit;

impl AlgorithmUnit for EmotionalStabilityUnit {
    fn name(&self) -> &'static str {
        names::EMOTIONAL_STABILITY
    }

    fn family(&self) -> AlgorithmFamily {
        AlgorithmFamily::Emotional
    }

    fn execute(
        &self,
        _profile: &UserProfile,
        window: &MetricsWindow,
    ) -> Result<AlgorithmResult, OrchestratorError> {
        if window.total_events == 0 {
            return Ok(empty_window_result(self.name()));
        }

        // Only burstiness above the random midpoint reads as instability;
        // a regular rhythm is the stable case.
        let burst_excess = ((burstiness(&window.inter_event_gaps) - 0.5) * 2.0).max(0.0);
        let instability = weighted_present(&[
            (slowdown(window), 0.40),
            (Some(burst_excess), 0.30),
            (Some(window.pause_ratio), 0.30),
        ]);
        let score = 1.0 - instability;

        Ok(AlgorithmResult::new(
            self.name(),
            score,
            window_confidence(window),
        ))
    }
}

/// Scores the user's stress response from error pressure, pause
/// fragmentation, and reported fatigue.
pub struct StressResponseUnit;

impl AlgorithmUnit for StressResponseUnit {
    fn name(&self) -> &'static str {
        names::STRESS_RESPONSE
    }

    fn family(&self) -> AlgorithmFamily {
        AlgorithmFamily::Emotional
    }

    fn execute(
        &self,
        _profile: &UserProfile,
        window: &MetricsWindow,
    ) -> Result<AlgorithmResult, OrchestratorError> {
        if window.total_events == 0 {
            return Ok(empty_window_result(self.name()));
        }

        let fatigue = window.mean_energy_hint.map(|e| 1.0 - e);
        let score = weighted_present(&[
            (Some(error_load(window)), 0.35),
            (Some(pause_frequency(window)), 0.25),
            (fatigue, 0.40),
        ]);

        let mut result = AlgorithmResult::new(self.name(), score, window_confidence(window));
        if score > WARNING_THRESHOLD {
            result = result.with_recommendation(Recommendation::new(
                RecommendationKind::Rest,
                "suggest_break",
                "Stress indicators are elevated; suggest a short break",
            ));
        }
        Ok(result)
    }
}
