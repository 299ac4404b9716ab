//! Interaction data collection
//!
//! Defines the inbound record shape supplied by data collectors, the
//! collector seam itself, and the reduction of buffered events into a
//! canonical metrics window consumed by the algorithm units.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

use crate::error::OrchestratorError;
use crate::types::Session;

/// Interaction event types captured during a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionEventType {
    Response,
    Error,
    Pause,
    Task,
    SelfReport,
    Input,
}

/// Response event data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseEvent {
    /// Time taken to respond in milliseconds
    pub response_time_ms: Option<u64>,
    /// Whether the response was correct
    pub correct: Option<bool>,
}

/// Error event data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEvent {
    /// Error category (open vocabulary)
    pub error_kind: Option<String>,
    /// Whether the same error occurred in the recent past
    #[serde(default)]
    pub repeated: bool,
}

/// Pause event data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PauseEvent {
    /// Pause duration in milliseconds
    pub duration_ms: Option<u64>,
}

/// Task event data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEvent {
    /// Task identifier
    pub task_id: Option<String>,
    /// Whether the task was completed successfully
    #[serde(default)]
    pub completed: bool,
    /// Task score (0-1), if the activity produces one
    pub score: Option<f64>,
}

/// Self-report event data (explicit user state signals)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelfReportEvent {
    /// Reported frustration (0-1)
    pub frustration_level: Option<f64>,
    /// Reported engagement (0-1)
    pub engagement_level: Option<f64>,
    /// Reported energy (0-1)
    pub energy_level: Option<f64>,
}

/// Input event data (keystrokes, gestures)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputEvent {
    /// Input actions per second over the sampled period
    pub input_rate: Option<f64>,
    /// Corrections (deletions, undos) in the sampled period
    pub corrections: Option<u32>,
}

/// An interaction event with timestamp and type-specific payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionEvent {
    /// Event timestamp
    pub timestamp: DateTime<Utc>,
    /// Event type
    pub event_type: InteractionEventType,
    /// Response data (present when event_type is Response)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<ResponseEvent>,
    /// Error data (present when event_type is Error)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorEvent>,
    /// Pause data (present when event_type is Pause)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pause: Option<PauseEvent>,
    /// Task data (present when event_type is Task)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task: Option<TaskEvent>,
    /// Self-report data (present when event_type is SelfReport)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub self_report: Option<SelfReportEvent>,
    /// Input data (present when event_type is Input)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<InputEvent>,
}

impl InteractionEvent {
    fn bare(event_type: InteractionEventType) -> Self {
        Self {
            timestamp: Utc::now(),
            event_type,
            response: None,
            error: None,
            pause: None,
            task: None,
            self_report: None,
            input: None,
        }
    }

    /// Build a response event.
    pub fn response(response_time_ms: Option<u64>, correct: Option<bool>) -> Self {
        Self {
            response: Some(ResponseEvent {
                response_time_ms,
                correct,
            }),
            ..Self::bare(InteractionEventType::Response)
        }
    }

    /// Build an error event.
    pub fn error(error_kind: Option<String>, repeated: bool) -> Self {
        Self {
            error: Some(ErrorEvent {
                error_kind,
                repeated,
            }),
            ..Self::bare(InteractionEventType::Error)
        }
    }

    /// Build a pause event.
    pub fn pause(duration_ms: Option<u64>) -> Self {
        Self {
            pause: Some(PauseEvent { duration_ms }),
            ..Self::bare(InteractionEventType::Pause)
        }
    }

    /// Build a task event.
    pub fn task(task_id: Option<String>, completed: bool, score: Option<f64>) -> Self {
        Self {
            task: Some(TaskEvent {
                task_id,
                completed,
                score,
            }),
            ..Self::bare(InteractionEventType::Task)
        }
    }

    /// Build a self-report event.
    pub fn self_report(
        frustration_level: Option<f64>,
        engagement_level: Option<f64>,
        energy_level: Option<f64>,
    ) -> Self {
        Self {
            self_report: Some(SelfReportEvent {
                frustration_level,
                engagement_level,
                energy_level,
            }),
            ..Self::bare(InteractionEventType::SelfReport)
        }
    }

    /// Build an input event.
    pub fn input(input_rate: Option<f64>, corrections: Option<u32>) -> Self {
        Self {
            input: Some(InputEvent {
                input_rate,
                corrections,
            }),
            ..Self::bare(InteractionEventType::Input)
        }
    }

    /// Override the event timestamp.
    #[must_use]
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// Terminal summary reported by a collector at session end
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorSummary {
    /// Collector identifier
    pub collector_id: String,
    /// Total interactions observed
    pub interaction_count: u32,
    /// Total errors observed
    pub error_count: u32,
    /// Mean response time across the session, if measured
    pub mean_response_time_ms: Option<f64>,
    /// Total paused time in seconds
    pub total_pause_time_sec: f64,
}

/// Seam to the external data collection layer.
///
/// Collectors buffer raw interaction events between drains; the
/// orchestrator drains them on each periodic tick and collects terminal
/// summaries at session end. Collector failures are absorbed into a
/// degraded, lower-confidence pass rather than aborting analysis.
#[async_trait]
pub trait DataCollector: Send + Sync {
    /// Stable collector identifier.
    fn id(&self) -> &str;

    /// Begin buffering for the given session.
    async fn begin(&self, session: &Session) -> Result<(), OrchestratorError>;

    /// Return and clear all events buffered since the last drain.
    async fn drain(&self) -> Result<Vec<InteractionEvent>, OrchestratorError>;

    /// Produce the terminal summary for the current session.
    async fn summarize(&self) -> Result<CollectorSummary, OrchestratorError>;

    /// Stop buffering.
    async fn stop(&self) -> Result<(), OrchestratorError>;
}

/// In-memory collector for embedding and tests.
///
/// Events are pushed by the surrounding application and drained by the
/// orchestrator's periodic pass.
pub struct BufferingCollector {
    id: String,
    inner: Mutex<BufferingState>,
}

#[derive(Default)]
struct BufferingState {
    pending: Vec<InteractionEvent>,
    interaction_count: u32,
    error_count: u32,
    response_time_sum_ms: f64,
    response_time_count: u32,
    total_pause_time_sec: f64,
}

impl BufferingCollector {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            inner: Mutex::new(BufferingState::default()),
        }
    }

    /// Push an event into the buffer.
    pub fn push(&self, event: InteractionEvent) {
        let mut state = self.inner.lock().expect("collector lock poisoned");
        state.interaction_count += 1;
        if event.event_type == InteractionEventType::Error {
            state.error_count += 1;
        }
        if let Some(response) = &event.response {
            if let Some(rt) = response.response_time_ms {
                state.response_time_sum_ms += rt as f64;
                state.response_time_count += 1;
            }
        }
        if let Some(pause) = &event.pause {
            if let Some(duration) = pause.duration_ms {
                state.total_pause_time_sec += duration as f64 / 1000.0;
            }
        }
        state.pending.push(event);
    }
}

#[async_trait]
impl DataCollector for BufferingCollector {
    fn id(&self) -> &str {
        &self.id
    }

    async fn begin(&self, _session: &Session) -> Result<(), OrchestratorError> {
        let mut state = self.inner.lock().expect("collector lock poisoned");
        *state = BufferingState::default();
        Ok(())
    }

    async fn drain(&self) -> Result<Vec<InteractionEvent>, OrchestratorError> {
        let mut state = self.inner.lock().expect("collector lock poisoned");
        Ok(std::mem::take(&mut state.pending))
    }

    async fn summarize(&self) -> Result<CollectorSummary, OrchestratorError> {
        let state = self.inner.lock().expect("collector lock poisoned");
        let mean_response_time_ms = if state.response_time_count > 0 {
            Some(state.response_time_sum_ms / state.response_time_count as f64)
        } else {
            None
        };
        Ok(CollectorSummary {
            collector_id: self.id.clone(),
            interaction_count: state.interaction_count,
            error_count: state.error_count,
            mean_response_time_ms,
            total_pause_time_sec: state.total_pause_time_sec,
        })
    }

    async fn stop(&self) -> Result<(), OrchestratorError> {
        let mut state = self.inner.lock().expect("collector lock poisoned");
        state.pending.clear();
        Ok(())
    }
}
