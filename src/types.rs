//! Core types for session orchestration
//!
//! This module defines the data structures that flow through the analysis
//! passes: sessions and their configuration, per-unit algorithm results,
//! integrated analyses, queue items, and the final session report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Completed,
}

/// Self-assessed skill level of the user for the configured activity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillLevel {
    Beginner,
    Intermediate,
    Advanced,
    Expert,
}

impl Default for SkillLevel {
    fn default() -> Self {
        SkillLevel::Intermediate
    }
}

/// User profile passed through to every algorithm unit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    /// Stable user identifier
    pub user_id: String,
    /// Age in years, if known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    /// Skill level for the current activity
    #[serde(default)]
    pub skill_level: SkillLevel,
    /// Preferred session intensity (0-1), if the user has expressed one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_intensity: Option<f64>,
}

impl UserProfile {
    /// Create a minimal profile for the given user.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            age: None,
            skill_level: SkillLevel::default(),
            preferred_intensity: None,
        }
    }
}

/// Configuration for a single session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// User the session belongs to
    pub user_id: String,
    /// Activity being performed (open vocabulary, e.g. "memory_training")
    pub activity_type: String,
    /// Difficulty of the activity (0-1)
    pub difficulty: f64,
    /// Interval between periodic analysis passes in milliseconds
    pub analysis_interval_ms: u64,
    /// Whether the per-event realtime path is enabled
    pub realtime_enabled: bool,
}

/// Default periodic analysis interval (5 seconds)
pub const DEFAULT_ANALYSIS_INTERVAL_MS: u64 = 5_000;

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            user_id: String::new(),
            activity_type: "general".to_string(),
            difficulty: 0.5,
            analysis_interval_ms: DEFAULT_ANALYSIS_INTERVAL_MS,
            realtime_enabled: true,
        }
    }
}

impl SessionConfig {
    /// Create a configuration for the given user with defaults.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Self::default()
        }
    }

    /// Set the activity type.
    #[must_use]
    pub fn with_activity(mut self, activity_type: impl Into<String>) -> Self {
        self.activity_type = activity_type.into();
        self
    }

    /// Set the activity difficulty (clamped to 0-1).
    #[must_use]
    pub fn with_difficulty(mut self, difficulty: f64) -> Self {
        self.difficulty = difficulty.clamp(0.0, 1.0);
        self
    }

    /// Set the periodic analysis interval in milliseconds.
    #[must_use]
    pub fn with_analysis_interval_ms(mut self, interval_ms: u64) -> Self {
        self.analysis_interval_ms = interval_ms;
        self
    }

    /// Enable or disable the realtime per-event path.
    #[must_use]
    pub fn with_realtime(mut self, enabled: bool) -> Self {
        self.realtime_enabled = enabled;
        self
    }
}

/// A bounded time window of activity for one user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Unique session identifier
    pub id: Uuid,
    /// User the session belongs to
    pub user_id: String,
    /// When the session started
    pub start_time: DateTime<Utc>,
    /// When the session ended (present once completed)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    /// Current lifecycle status
    pub status: SessionStatus,
    /// Configuration the session was started with
    pub config: SessionConfig,
}

impl Session {
    /// Allocate a new active session from the given configuration.
    pub fn begin(config: SessionConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: config.user_id.clone(),
            start_time: Utc::now(),
            end_time: None,
            status: SessionStatus::Active,
            config,
        }
    }
}

/// Category of an insight attached to an analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightKind {
    /// Neutral observation about the user's state
    Observation,
    /// Elevated-risk signal
    Warning,
    /// Positive signal worth amplifying
    Opportunity,
    /// Signal quality is reduced (missing data, failed unit)
    Degraded,
}

/// A single interpreted observation produced by an algorithm unit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Insight {
    /// Insight category
    pub kind: InsightKind,
    /// Human-readable message
    pub message: String,
    /// Confidence in this insight (0-1)
    pub confidence: f64,
}

impl Insight {
    pub fn new(kind: InsightKind, message: impl Into<String>, confidence: f64) -> Self {
        Self {
            kind,
            message: message.into(),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}

/// Category of a recommendation attached to an analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    /// Offer immediate support to the user
    Support,
    /// Adjust activity parameters (difficulty, pacing)
    Adjustment,
    /// Enhance the experience (enrichment, progression)
    Enhancement,
    /// Suggest a break or recovery period
    Rest,
}

/// A suggested action produced by an algorithm unit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    /// Recommendation category
    pub kind: RecommendationKind,
    /// Machine-readable action key (e.g. "reduce_difficulty")
    pub action: String,
    /// Human-readable description
    pub description: String,
}

impl Recommendation {
    pub fn new(
        kind: RecommendationKind,
        action: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            action: action.into(),
            description: description.into(),
        }
    }
}

/// Result of a single algorithm unit invocation
///
/// Immutable once produced; integration passes combine these without
/// mutating them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlgorithmResult {
    /// Name of the producing unit (lower_snake_case)
    pub algorithm_name: String,
    /// Primary score (0-1)
    pub score: f64,
    /// Confidence in the score (0-1)
    pub confidence: f64,
    /// Interpreted observations, in the order the unit produced them
    pub insights: Vec<Insight>,
    /// Suggested actions, in the order the unit produced them
    pub recommendations: Vec<Recommendation>,
    /// When the unit ran
    pub timestamp: DateTime<Utc>,
}

impl AlgorithmResult {
    /// Create a result with clamped score and confidence.
    pub fn new(algorithm_name: impl Into<String>, score: f64, confidence: f64) -> Self {
        Self {
            algorithm_name: algorithm_name.into(),
            score: score.clamp(0.0, 1.0),
            confidence: confidence.clamp(0.0, 1.0),
            insights: Vec::new(),
            recommendations: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    /// Attach an insight.
    #[must_use]
    pub fn with_insight(mut self, insight: Insight) -> Self {
        self.insights.push(insight);
        self
    }

    /// Attach a recommendation.
    #[must_use]
    pub fn with_recommendation(mut self, recommendation: Recommendation) -> Self {
        self.recommendations.push(recommendation);
        self
    }
}

/// Weighted combination of multiple algorithm results
///
/// Recomputed whole on every pass; never patched incrementally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegratedAnalysis {
    /// Weighted overall wellbeing score (0-1)
    pub overall_score: f64,
    /// Weighted confidence across contributing units (0-1)
    pub confidence_score: f64,
    /// Composite risk indicator (0-1), gates intervention emission
    pub risk_score: f64,
    /// Composite opportunity indicator (0-1), gates optimization emission
    pub opportunity_score: f64,
    /// Concatenated insights from contributing units, declaration order
    pub insights: Vec<Insight>,
    /// When the integration pass ran
    pub timestamp: DateTime<Utc>,
}

/// Queue item kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueKind {
    Intervention,
    Optimization,
}

/// Queue item priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Immediate,
}

/// A unit of downstream work emitted when a threshold is crossed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueItem {
    /// Unique item identifier
    pub id: Uuid,
    /// Intervention or optimization
    pub kind: QueueKind,
    /// Urgency of the item
    pub priority: Priority,
    /// The integrated analysis that caused the item
    pub trigger: IntegratedAnalysis,
    /// When the item was enqueued
    pub created_at: DateTime<Utc>,
    /// Whether a consumer has processed the item
    pub processed: bool,
}

/// Direction of the session-level score trend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Improving,
    Stable,
    Declining,
}

impl Default for TrendDirection {
    fn default() -> Self {
        TrendDirection::Stable
    }
}

/// Cross-session baseline context attached to reports
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionBaselines {
    /// Baseline overall score across recent sessions
    pub overall_baseline: Option<f64>,
    /// Baseline risk score across recent sessions
    pub risk_baseline: Option<f64>,
    /// Baseline opportunity score across recent sessions
    pub opportunity_baseline: Option<f64>,
    /// Deviation of this session's overall score from baseline (percentage)
    pub overall_deviation_pct: Option<f64>,
    /// Number of sessions contributing to the baseline
    pub sessions_in_baseline: u32,
}

/// Final report produced when a session ends
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionReport {
    /// The completed session
    pub session: Session,
    /// Full-set integration over the terminal summaries
    pub final_analysis: IntegratedAnalysis,
    /// Periodic analyses accumulated while the session was active
    pub history: Vec<IntegratedAnalysis>,
    /// Trend classification over the history
    pub trend: TrendDirection,
    /// Deduplicated recommendations from the final pass
    pub recommendations: Vec<Recommendation>,
    /// Cross-session baseline context
    pub baselines: SessionBaselines,
    /// Producing software name
    pub producer: String,
    /// Producing software version
    pub producer_version: String,
    /// When the report was generated
    pub generated_at: DateTime<Utc>,
}

impl SessionReport {
    /// Serialize the report to JSON for the persistence collaborator.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize a report from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_status_serialization() {
        let json = serde_json::to_string(&SessionStatus::Active).unwrap();
        assert_eq!(json, "\"active\"");

        let parsed: SessionStatus = serde_json::from_str("\"completed\"").unwrap();
        assert_eq!(parsed, SessionStatus::Completed);
    }

    #[test]
    fn test_priority_ordering() {
        assert!(Priority::Immediate > Priority::High);
        assert!(Priority::High > Priority::Medium);
        assert!(Priority::Medium > Priority::Low);
    }

    #[test]
    fn test_session_config_builder() {
        let config = SessionConfig::new("user-1")
            .with_activity("memory_training")
            .with_difficulty(1.7)
            .with_analysis_interval_ms(2_000)
            .with_realtime(false);

        assert_eq!(config.user_id, "user-1");
        assert_eq!(config.activity_type, "memory_training");
        assert_eq!(config.difficulty, 1.0); // clamped
        assert_eq!(config.analysis_interval_ms, 2_000);
        assert!(!config.realtime_enabled);
    }

    #[test]
    fn test_session_begin() {
        let session = Session::begin(SessionConfig::new("user-2"));
        assert_eq!(session.user_id, "user-2");
        assert_eq!(session.status, SessionStatus::Active);
        assert!(session.end_time.is_none());
    }

    #[test]
    fn test_algorithm_result_clamps_ranges() {
        let result = AlgorithmResult::new("frustration", 1.4, -0.2);
        assert_eq!(result.score, 1.0);
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn test_report_json_round_trip() {
        let session = Session::begin(SessionConfig::new("user-3"));
        let report = SessionReport {
            session,
            final_analysis: IntegratedAnalysis {
                overall_score: 0.6,
                confidence_score: 0.8,
                risk_score: 0.2,
                opportunity_score: 0.5,
                insights: vec![Insight::new(InsightKind::Observation, "steady", 0.7)],
                timestamp: Utc::now(),
            },
            history: vec![],
            trend: TrendDirection::Stable,
            recommendations: vec![],
            baselines: SessionBaselines::default(),
            producer: "synheart-orchestrator".to_string(),
            producer_version: "0.1.0".to_string(),
            generated_at: Utc::now(),
        };

        let json = report.to_json().unwrap();
        let parsed = SessionReport::from_json(&json).unwrap();
        assert_eq!(parsed.session.user_id, "user-3");
        assert_eq!(parsed.final_analysis.overall_score, 0.6);
    }
}
