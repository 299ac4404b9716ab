//! Metrics window derivation
//!
//! Reduces buffered interaction events into the canonical window of
//! accumulated metrics that algorithm units score against, with quality
//! flags for thin or degraded data.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::collector::{CollectorSummary, InteractionEvent, InteractionEventType};

/// Minimum window duration in seconds for full quality
const MIN_WINDOW_DURATION_SEC: f64 = 60.0;

/// Minimum event count for full quality
const MIN_EVENT_COUNT: u32 = 5;

/// Quality flags for a metrics window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowQualityFlag {
    /// Window is shorter than recommended
    ShortWindow,
    /// Very few events in the window
    LowEventCount,
    /// No explicit self-report signals present
    NoSelfReports,
    /// One or more collectors failed to supply data
    CollectorDegraded,
}

/// Canonical accumulated metrics over a window of buffered events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsWindow {
    /// Window start time
    pub window_start: DateTime<Utc>,
    /// Window end time
    pub window_end: DateTime<Utc>,
    /// Window duration in seconds
    pub duration_sec: f64,
    /// Difficulty of the configured activity (0-1)
    pub difficulty: f64,

    // Event counts by type
    /// Total number of events
    pub total_events: u32,
    /// Number of response events
    pub response_events: u32,
    /// Number of error events
    pub error_events: u32,
    /// Number of pause events
    pub pause_events: u32,
    /// Number of task events
    pub task_events: u32,
    /// Number of self-report events
    pub self_report_events: u32,
    /// Number of input events
    pub input_events: u32,

    // Task metrics
    /// Tasks completed successfully
    pub completed_tasks: u32,
    /// Tasks attempted but not completed
    pub failed_tasks: u32,
    /// Number of distinct task identifiers seen
    pub task_variety: u32,
    /// Mean task score, if tasks carried scores
    pub mean_task_score: Option<f64>,

    // Response timing
    /// Mean response time in milliseconds
    pub mean_response_time_ms: Option<f64>,
    /// Coefficient of variation of response times (std dev / mean)
    pub response_time_cv: Option<f64>,
    /// Fraction of responses marked correct
    pub correct_ratio: Option<f64>,
    /// Correct ratio over the first half of responses
    pub early_correct_ratio: Option<f64>,
    /// Correct ratio over the second half of responses
    pub late_correct_ratio: Option<f64>,

    // Error metrics
    /// Errors per minute
    pub errors_per_min: f64,
    /// Fraction of errors flagged as repeated
    pub repeated_error_ratio: f64,

    // Pause metrics
    /// Total paused time in seconds
    pub total_pause_time_sec: f64,
    /// Paused time as a fraction of window duration
    pub pause_ratio: f64,

    // Timing structure
    /// Gaps between consecutive events in seconds
    pub inter_event_gaps: Vec<f64>,

    // Explicit signal hints from self-reports
    /// Mean reported frustration (0-1)
    pub mean_frustration_hint: Option<f64>,
    /// Mean reported engagement (0-1)
    pub mean_engagement_hint: Option<f64>,
    /// Mean reported energy (0-1)
    pub mean_energy_hint: Option<f64>,

    // Input metrics
    /// Mean input rate in actions per second
    pub mean_input_rate: Option<f64>,
    /// Corrections per input event
    pub correction_ratio: Option<f64>,

    /// Quality flags
    pub quality_flags: Vec<WindowQualityFlag>,
    /// When the window was computed
    pub computed_at: DateTime<Utc>,
}

impl MetricsWindow {
    /// Build an empty window over the given span.
    pub fn empty(window_start: DateTime<Utc>, window_end: DateTime<Utc>, difficulty: f64) -> Self {
        let duration_sec =
            ((window_end - window_start).num_milliseconds() as f64 / 1000.0).max(0.0);
        let mut window = Self {
            window_start,
            window_end,
            duration_sec,
            difficulty,
            total_events: 0,
            response_events: 0,
            error_events: 0,
            pause_events: 0,
            task_events: 0,
            self_report_events: 0,
            input_events: 0,
            completed_tasks: 0,
            failed_tasks: 0,
            task_variety: 0,
            mean_task_score: None,
            mean_response_time_ms: None,
            response_time_cv: None,
            correct_ratio: None,
            early_correct_ratio: None,
            late_correct_ratio: None,
            errors_per_min: 0.0,
            repeated_error_ratio: 0.0,
            total_pause_time_sec: 0.0,
            pause_ratio: 0.0,
            inter_event_gaps: Vec::new(),
            mean_frustration_hint: None,
            mean_engagement_hint: None,
            mean_energy_hint: None,
            mean_input_rate: None,
            correction_ratio: None,
            quality_flags: Vec::new(),
            computed_at: Utc::now(),
        };
        window.quality_flags = determine_quality_flags(&window);
        window
    }

    /// Mark the window as degraded because a collector failed to supply data.
    pub fn mark_collector_degraded(&mut self) {
        if !self
            .quality_flags
            .contains(&WindowQualityFlag::CollectorDegraded)
        {
            self.quality_flags.push(WindowQualityFlag::CollectorDegraded);
        }
    }

    /// Whether any collector failed while this window was assembled.
    pub fn collector_degraded(&self) -> bool {
        self.quality_flags
            .contains(&WindowQualityFlag::CollectorDegraded)
    }

    /// Fill timing statistics from a collector's terminal summary.
    ///
    /// Buffered events remain authoritative; the summary only fills
    /// statistics the event stream did not carry.
    pub fn merge_summary(&mut self, summary: &CollectorSummary) {
        if self.mean_response_time_ms.is_none() {
            self.mean_response_time_ms = summary.mean_response_time_ms;
        }
        if self.total_pause_time_sec == 0.0 && summary.total_pause_time_sec > 0.0 {
            self.total_pause_time_sec = summary.total_pause_time_sec;
            if self.duration_sec > 0.0 {
                self.pause_ratio =
                    (self.total_pause_time_sec / self.duration_sec).clamp(0.0, 1.0);
            }
        }
        if self.total_events == 0 && summary.interaction_count > 0 {
            self.total_events = summary.interaction_count;
            self.error_events = summary.error_count;
            if self.duration_sec > 0.0 {
                self.errors_per_min =
                    summary.error_count as f64 / (self.duration_sec / 60.0);
            }
            self.quality_flags
                .retain(|f| *f != WindowQualityFlag::LowEventCount);
            if summary.interaction_count < MIN_EVENT_COUNT {
                self.quality_flags.push(WindowQualityFlag::LowEventCount);
            }
        }
    }
}

/// Reduce buffered events into a canonical metrics window.
///
/// Events are sorted by timestamp; the window span is fixed by the caller
/// (session start to now for accumulated passes, a rolling span for the
/// realtime path).
pub fn events_to_window(
    events: &[InteractionEvent],
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    difficulty: f64,
) -> MetricsWindow {
    let mut window = MetricsWindow::empty(window_start, window_end, difficulty);
    if events.is_empty() {
        return window;
    }

    let mut sorted: Vec<&InteractionEvent> = events.iter().collect();
    sorted.sort_by_key(|e| e.timestamp);

    count_events(&mut window, &sorted);
    derive_task_metrics(&mut window, &sorted);
    derive_response_metrics(&mut window, &sorted);
    derive_error_metrics(&mut window, &sorted);
    derive_pause_metrics(&mut window, &sorted);
    derive_hint_means(&mut window, &sorted);
    derive_input_metrics(&mut window, &sorted);
    window.inter_event_gaps = compute_inter_event_gaps(&sorted);
    window.quality_flags = determine_quality_flags(&window);
    window
}

fn count_events(window: &mut MetricsWindow, events: &[&InteractionEvent]) {
    window.total_events = events.len() as u32;
    for event in events {
        match event.event_type {
            InteractionEventType::Response => window.response_events += 1,
            InteractionEventType::Error => window.error_events += 1,
            InteractionEventType::Pause => window.pause_events += 1,
            InteractionEventType::Task => window.task_events += 1,
            InteractionEventType::SelfReport => window.self_report_events += 1,
            InteractionEventType::Input => window.input_events += 1,
        }
    }
}

fn derive_task_metrics(window: &mut MetricsWindow, events: &[&InteractionEvent]) {
    let mut task_ids = std::collections::HashSet::new();
    let mut score_sum = 0.0;
    let mut score_count = 0u32;

    for event in events {
        if let Some(task) = &event.task {
            if task.completed {
                window.completed_tasks += 1;
            } else {
                window.failed_tasks += 1;
            }
            if let Some(id) = &task.task_id {
                task_ids.insert(id.clone());
            }
            if let Some(score) = task.score {
                score_sum += score.clamp(0.0, 1.0);
                score_count += 1;
            }
        }
    }

    window.task_variety = task_ids.len() as u32;
    if score_count > 0 {
        window.mean_task_score = Some(score_sum / score_count as f64);
    }
}

fn derive_response_metrics(window: &mut MetricsWindow, events: &[&InteractionEvent]) {
    let times: Vec<f64> = events
        .iter()
        .filter_map(|e| e.response.as_ref())
        .filter_map(|r| r.response_time_ms)
        .map(|ms| ms as f64)
        .collect();

    if !times.is_empty() {
        let mean = times.iter().sum::<f64>() / times.len() as f64;
        window.mean_response_time_ms = Some(mean);
        if times.len() > 1 && mean > 0.0 {
            let variance =
                times.iter().map(|t| (t - mean).powi(2)).sum::<f64>() / times.len() as f64;
            window.response_time_cv = Some(variance.sqrt() / mean);
        }
    }

    let outcomes: Vec<bool> = events
        .iter()
        .filter_map(|e| e.response.as_ref())
        .filter_map(|r| r.correct)
        .collect();

    if !outcomes.is_empty() {
        window.correct_ratio = Some(correct_fraction(&outcomes));
        if outcomes.len() >= 4 {
            let mid = outcomes.len() / 2;
            window.early_correct_ratio = Some(correct_fraction(&outcomes[..mid]));
            window.late_correct_ratio = Some(correct_fraction(&outcomes[mid..]));
        }
    }
}

fn correct_fraction(outcomes: &[bool]) -> f64 {
    if outcomes.is_empty() {
        return 0.0;
    }
    outcomes.iter().filter(|c| **c).count() as f64 / outcomes.len() as f64
}

fn derive_error_metrics(window: &mut MetricsWindow, events: &[&InteractionEvent]) {
    if window.duration_sec > 0.0 {
        window.errors_per_min = window.error_events as f64 / (window.duration_sec / 60.0);
    }
    if window.error_events > 0 {
        let repeated = events
            .iter()
            .filter_map(|e| e.error.as_ref())
            .filter(|e| e.repeated)
            .count() as f64;
        window.repeated_error_ratio = repeated / window.error_events as f64;
    }
}

fn derive_pause_metrics(window: &mut MetricsWindow, events: &[&InteractionEvent]) {
    let pause_ms: f64 = events
        .iter()
        .filter_map(|e| e.pause.as_ref())
        .filter_map(|p| p.duration_ms)
        .map(|ms| ms as f64)
        .sum();
    window.total_pause_time_sec = pause_ms / 1000.0;
    if window.duration_sec > 0.0 {
        window.pause_ratio = (window.total_pause_time_sec / window.duration_sec).clamp(0.0, 1.0);
    }
}

fn derive_hint_means(window: &mut MetricsWindow, events: &[&InteractionEvent]) {
    let mut frustration = Vec::new();
    let mut engagement = Vec::new();
    let mut energy = Vec::new();

    for event in events {
        if let Some(report) = &event.self_report {
            if let Some(v) = report.frustration_level {
                frustration.push(v.clamp(0.0, 1.0));
            }
            if let Some(v) = report.engagement_level {
                engagement.push(v.clamp(0.0, 1.0));
            }
            if let Some(v) = report.energy_level {
                energy.push(v.clamp(0.0, 1.0));
            }
        }
    }

    window.mean_frustration_hint = mean_of(&frustration);
    window.mean_engagement_hint = mean_of(&engagement);
    window.mean_energy_hint = mean_of(&energy);
}

fn derive_input_metrics(window: &mut MetricsWindow, events: &[&InteractionEvent]) {
    let rates: Vec<f64> = events
        .iter()
        .filter_map(|e| e.input.as_ref())
        .filter_map(|i| i.input_rate)
        .collect();
    window.mean_input_rate = mean_of(&rates);

    if window.input_events > 0 {
        let corrections: u32 = events
            .iter()
            .filter_map(|e| e.input.as_ref())
            .filter_map(|i| i.corrections)
            .sum();
        window.correction_ratio = Some(corrections as f64 / window.input_events as f64);
    }
}

fn mean_of(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

fn compute_inter_event_gaps(events: &[&InteractionEvent]) -> Vec<f64> {
    events
        .windows(2)
        .map(|pair| (pair[1].timestamp - pair[0].timestamp).num_milliseconds() as f64 / 1000.0)
        .filter(|gap| *gap >= 0.0)
        .collect()
}

fn determine_quality_flags(window: &MetricsWindow) -> Vec<WindowQualityFlag> {
    let mut flags = Vec::new();
    if window.duration_sec < MIN_WINDOW_DURATION_SEC {
        flags.push(WindowQualityFlag::ShortWindow);
    }
    if window.total_events < MIN_EVENT_COUNT {
        flags.push(WindowQualityFlag::LowEventCount);
    }
    if window.self_report_events == 0 {
        flags.push(WindowQualityFlag::NoSelfReports);
    }
    flags
}
