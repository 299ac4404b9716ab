//! Neuroplasticity algorithm units
//!
//! Six heuristic scorers over the metrics window: improvement potential,
//! learning velocity, memory consolidation, attention training, cognitive
//! flexibility, and neural adaptation. These read growth and training
//! signals rather than affective state.

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

/// Score above which a unit attaches an opportunity insight
const OPPORTUNITY_THRESHOLD: f64 = 0.7;

/// Pause ratio at which spaced practice is considered ideal
const IDEAL_PAUSE_RATIO: f64 = 0.2;

/// All neuroplasticity units, in declaration order.
pub fn default_units() -> Vec<Arc<dyn AlgorithmUnit>> {
    vec![
        Arc::new(ImprovementPotentialUnit),
        Arc::new(LearningVelocityUnit),
        Arc::new(MemoryConsolidationUnit),
        Arc::new(AttentionTrainingUnit),
        Arc::new(CognitiveFlexibilityUnit),
        Arc::new(NeuralAdaptationUnit),
    ]
}

/// Default weights for the neuroplasticity family (renormalized on
/// construction).
pub fn default_weights() -> Vec<(&'static str, f64)> {
    vec![
        (names::IMPROVEMENT_POTENTIAL, 0.25),
        (names::LEARNING_VELOCITY, 0.20),
        (names::MEMORY_CONSOLIDATION, 0.15),
        (names::ATTENTION_TRAINING, 0.15),
        (names::COGNITIVE_FLEXIBILITY, 0.15),
        (names::NEURAL_ADAPTATION, 0.10),
    ]
}

/// Names of the default realtime priority subset for this family.
pub fn default_realtime_subset() -> Vec<&'static str> {
    vec![
        names::IMPROVEMENT_POTENTIAL,
        names::LEARNING_VELOCITY,
        names::ATTENTION_TRAINING,
    ]
}

/// Inverted-U response: peaks at 0.5, falls to 0 at either extreme.
///
/// Formula: `4 * p * (1 - p)`
fn inverted_u(p: f64) -> f64 {
    (4.0 * p * (1.0 - p)).clamp(0.0, 1.0)
}

/// Scores room for growth: highest when the user performs at the edge of
/// their ability while staying active.
pub struct ImprovementPotentialUnit;

impl AlgorithmUnit for ImprovementPotentialUnit {
    fn name(&self) -> &'static str {
        names::IMPROVEMENT_POTENTIAL
    }

    fn family(&self) -> AlgorithmFamily {
        AlgorithmFamily::Neuroplasticity
    }

    fn execute(
        &self,
        _profile: &UserProfile,
        window: &MetricsWindow,
    ) -> Result<AlgorithmResult, OrchestratorError> {
        if window.total_events == 0 {
            return Ok(empty_window_result(self.name()));
        }

        // Performance near the middle of the range means the activity is
        // neither trivial nor overwhelming.
        let challenge_zone = window.correct_ratio.map(inverted_u);
        let activity = saturate(events_per_min(window), 6.0);
        let score = weighted_present(&[(challenge_zone, 0.70), (Some(activity), 0.30)]);

        let mut result = AlgorithmResult::new(self.name(), score, window_confidence(window));
        if score > OPPORTUNITY_THRESHOLD {
            let confidence = result.confidence;
            result = result
                .with_insight(Insight::new(
                    InsightKind::Opportunity,
                    "User is in the productive challenge zone",
                    confidence,
                ))
                .with_recommendation(Recommendation::new(
                    RecommendationKind::Enhancement,
                    "extend_session",
                    "Conditions favor growth; extending the current block would capitalize on it",
                ));
        }
        Ok(result)
    }
}

/// Scores how quickly performance improves within the window.
pub struct LearningVelocityUnit;

impl AlgorithmUnit for LearningVelocityUnit {
    fn name(&self) -> &'static str {
        names::LEARNING_VELOCITY
    }

    fn family(&self) -> AlgorithmFamily {
        AlgorithmFamily::Neuroplasticity
    }

    fn execute(
        &self,
        _profile: &UserProfile,
        window: &MetricsWindow,
    ) -> Result<AlgorithmResult, OrchestratorError> {
        if window.total_events == 0 {
            return Ok(empty_window_result(self.name()));
        }

        // Improvement between window halves, mapped from [-1, 1] to [0, 1].
        let velocity = match (window.early_correct_ratio, window.late_correct_ratio) {
            (Some(early), Some(late)) => Some(((late - early) + 1.0) / 2.0),
            _ => None,
        };
        let weak_signal = velocity.is_none();
        let score = weighted_present(&[(velocity, 0.75), (window.mean_task_score, 0.25)]);

        let mut confidence = window_confidence(window);
        if weak_signal {
            confidence *= 0.7;
        }

        let mut result = AlgorithmResult::new(self.name(), score, confidence);
        if score > OPPORTUNITY_THRESHOLD && !weak_signal {
            let confidence = result.confidence;
            result = result.with_insight(Insight::new(
                InsightKind::Opportunity,
                "Accuracy is climbing within the session",
                confidence,
            ));
        }
        Ok(result)
    }
}

/// Scores conditions for memory consolidation: spaced practice with
/// repeated exposure to the same tasks.
pub struct MemoryConsolidationUnit;

impl AlgorithmUnit for MemoryConsolidationUnit {
    fn name(&self) -> &'static str {
        names::MEMORY_CONSOLIDATION
    }

    fn family(&self) -> AlgorithmFamily {
        AlgorithmFamily::Neuroplasticity
    }

    fn execute(
        &self,
        _profile: &UserProfile,
        window: &MetricsWindow,
    ) -> Result<AlgorithmResult, OrchestratorError> {
        if window.total_events == 0 {
            return Ok(empty_window_result(self.name()));
        }

        let spacing =
            (1.0 - (window.pause_ratio - IDEAL_PAUSE_RATIO).abs() / 0.8).clamp(0.0, 1.0);
        let repetition = if window.task_variety > 0 {
            let per_task = window.task_events as f64 / window.task_variety as f64;
            Some(saturate(per_task - 1.0, 3.0))
        } else {
            None
        };
        let score = weighted_present(&[(Some(spacing), 0.50), (repetition, 0.50)]);

        Ok(AlgorithmResult::new(
            self.name(),
            score,
            window_confidence(window),
        ))
    }
}

/// Scores sustained attention: regular rhythm, few pauses, steady activity.
pub struct AttentionTrainingUnit;

impl AlgorithmUnit for AttentionTrainingUnit {
    fn name(&self) -> &'static str {
        names::ATTENTION_TRAINING
    }

    fn family(&self) -> AlgorithmFamily {
        AlgorithmFamily::Neuroplasticity
    }

    fn execute(
        &self,
        _profile: &UserProfile,
        window: &MetricsWindow,
    ) -> Result<AlgorithmResult, OrchestratorError> {
        if window.total_events == 0 {
            return Ok(empty_window_result(self.name()));
        }

        // Regular and random rhythms both sustain attention; only bursty
        // clustering counts against it.
        let rhythm = 1.0 - ((burstiness(&window.inter_event_gaps) - 0.5) * 2.0).max(0.0);
        let continuity = 1.0 - window.pause_ratio;
        let activity = saturate(events_per_min(window), 6.0);
        let score = weighted_present(&[
            (Some(rhythm), 0.40),
            (Some(continuity), 0.30),
            (Some(activity), 0.30),
        ]);

        Ok(AlgorithmResult::new(
            self.name(),
            score,
            window_confidence(window),
        ))
    }
}

/// Scores cognitive flexibility from task variety and interaction diversity.
pub struct CognitiveFlexibilityUnit;

impl AlgorithmUnit for CognitiveFlexibilityUnit {
    fn name(&self) -> &'static str {
        names::COGNITIVE_FLEXIBILITY
    }

    fn family(&self) -> AlgorithmFamily {
        AlgorithmFamily::Neuroplasticity
    }

    fn execute(
        &self,
        _profile: &UserProfile,
        window: &MetricsWindow,
    ) -> Result<AlgorithmResult, OrchestratorError> {
        if window.total_events == 0 {
            return Ok(empty_window_result(self.name()));
        }

        let variety = if window.task_events > 0 {
            Some(saturate(window.task_variety as f64, 3.0))
        } else {
            None
        };
        let modality_count = [
            window.response_events,
            window.error_events,
            window.pause_events,
            window.task_events,
            window.self_report_events,
            window.input_events,
        ]
        .iter()
        .filter(|c| **c > 0)
        .count();
        let diversity = modality_count as f64 / 6.0;
        let score = weighted_present(&[(variety, 0.60), (Some(diversity), 0.40)]);

        Ok(AlgorithmResult::new(
            self.name(),
            score,
            window_confidence(window),
        ))
    }
}

/// Scores adaptation: maintaining accuracy and steady timing as difficulty
/// rises.
pub struct NeuralAdaptationUnit;

impl AlgorithmUnit for NeuralAdaptationUnit {
    fn name(&self) -> &'static str {
        names::NEURAL_ADAPTATION
    }

    fn family(&self) -> AlgorithmFamily {
        AlgorithmFamily::Neuroplasticity
    }

    fn execute(
        &self,
        _profile: &UserProfile,
        window: &MetricsWindow,
    ) -> Result<AlgorithmResult, OrchestratorError> {
        if window.total_events == 0 {
            return Ok(empty_window_result(self.name()));
        }

        let challenge_mastery = window
            .correct_ratio
            .map(|c| c * (0.5 + 0.5 * window.difficulty));
        let timing_stability = window
            .response_time_cv
            .map(|cv| 1.0 - saturate(cv, 0.8));
        let score = weighted_present(&[(challenge_mastery, 0.60), (timing_stability, 0.40)]);

        Ok(AlgorithmResult::new(
            self.name(),
            score,
            window_confidence(window),
        ))
    }
}
