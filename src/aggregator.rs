//! Periodic aggregation
//!
//! The timer-driven slow path: on a fixed cadence while a session is
//! active, drains collectors, runs the full two-family pass over the
//! accumulated window, appends to the analysis history, reclassifies the
//! trend, and emits queue items at periodic priorities. The loop is tied
//! to the session lifecycle through a cancellation token; no tick fires
//! after the session ends.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::RwLock;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::collector::DataCollector;
use crate::orchestrator::SessionState;
use crate::queue::QueueManager;
use crate::realtime::{OPPORTUNITY_THRESHOLD, RISK_THRESHOLD, SINGLE_RISK_THRESHOLD};
use crate::registry::{AnalysisEngine, RISK_CONTRIBUTORS};
use crate::sink::AnalysisSink;
use crate::types::{
    IntegratedAnalysis, Priority, QueueKind, SessionStatus, TrendDirection, UserProfile,
};
use crate::window::events_to_window;

/// Mean-score delta between history halves beyond which the trend is
/// classified as moving
pub const TREND_THRESHOLD: f64 = 0.05;

/// Minimum history length before a trend other than `Stable` is reported
pub const MIN_TREND_SAMPLES: usize = 4;

/// Classify the session trend by comparing the mean overall score of the
/// recent half of the history against the older half.
pub fn classify_trend(history: &[IntegratedAnalysis]) -> TrendDirection {
    if history.len() < MIN_TREND_SAMPLES {
        return TrendDirection::Stable;
    }

    let mid = history.len() / 2;
    let mean = |slice: &[IntegratedAnalysis]| {
        slice.iter().map(|a| a.overall_score).sum::<f64>() / slice.len() as f64
    };
    let delta = mean(&history[mid..]) - mean(&history[..mid]);

    if delta > TREND_THRESHOLD {
        TrendDirection::Improving
    } else if delta < -TREND_THRESHOLD {
        TrendDirection::Declining
    } else {
        TrendDirection::Stable
    }
}

/// Everything one aggregator loop needs, captured at session start.
pub(crate) struct AggregatorContext {
    pub(crate) state: Arc<RwLock<SessionState>>,
    pub(crate) engine: Arc<AnalysisEngine>,
    pub(crate) queues: Arc<QueueManager>,
    pub(crate) sink: Arc<dyn AnalysisSink>,
    pub(crate) collectors: Vec<Arc<dyn DataCollector>>,
    pub(crate) profile: UserProfile,
    pub(crate) interval: Duration,
}

#[derive(Debug, PartialEq, Eq)]
enum TickOutcome {
    Processed,
    Skipped,
    SessionEnded,
}

/// Fixed-interval loop, cancelled through the session lifecycle token.
pub(crate) async fn run_aggregator_loop(ctx: AggregatorContext, token: CancellationToken) {
    let mut interval = tokio::time::interval(ctx.interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    info!(
        interval_ms = ctx.interval.as_millis() as u64,
        "Periodic aggregator armed"
    );

    loop {
        tokio::select! {
            biased;

            _ = token.cancelled() => {
                info!("Periodic aggregator disarmed");
                break;
            }

            _ = interval.tick() => {
                if run_tick(&ctx).await == TickOutcome::SessionEnded {
                    debug!("Session no longer active; aggregator stopping");
                    break;
                }
            }
        }
    }
}

async fn run_tick(ctx: &AggregatorContext) -> TickOutcome {
    // Collectors are drained outside the state lock.
    let mut drained = Vec::new();
    let mut degraded = false;
    for collector in &ctx.collectors {
        match collector.drain().await {
            Ok(events) => drained.extend(events),
            Err(e) => {
                warn!(collector = collector.id(), error = %e, "Collector drain failed");
                degraded = true;
            }
        }
    }

    let (window, session_id) = {
        let mut state = ctx.state.write().await;
        let Some(session) = state.session.clone() else {
            return TickOutcome::SessionEnded;
        };
        if session.status != SessionStatus::Active {
            return TickOutcome::SessionEnded;
        }

        state.events.extend(drained);
        if state.events.len() == state.tick_cursor && !degraded {
            return TickOutcome::Skipped;
        }
        state.tick_cursor = state.events.len();
        state.analyzing = true;

        let mut window = events_to_window(
            &state.events,
            session.start_time,
            Utc::now(),
            session.config.difficulty,
        );
        if degraded {
            window.mark_collector_degraded();
        }
        (window, session.id)
    };

    let results = Arc::clone(&ctx.engine)
        .run_full_parallel(&ctx.profile, &window)
        .await;
    let analysis = ctx.engine.integrate(&results);
    emit_queue_items(ctx, &results, &analysis);

    if let Err(e) = ctx.sink.persist_analysis(session_id, &analysis).await {
        warn!(session = %session_id, error = %e, "Failed to persist periodic analysis");
    }

    let mut state = ctx.state.write().await;
    state.history.push(analysis);
    state.trend = classify_trend(&state.history);
    state.analyzing = false;
    debug!(
        ticks = state.history.len(),
        trend = ?state.trend,
        "Periodic pass appended to history"
    );
    TickOutcome::Processed
}

/// Same decision rule as the realtime path, at periodic priorities.
fn emit_queue_items(
    ctx: &AggregatorContext,
    results: &[crate::types::AlgorithmResult],
    analysis: &IntegratedAnalysis,
) {
    let single_risk_spike = results.iter().any(|r| {
        RISK_CONTRIBUTORS.contains(&r.algorithm_name.as_str())
            && r.score > SINGLE_RISK_THRESHOLD
    });
    if analysis.risk_score > RISK_THRESHOLD || single_risk_spike {
        ctx.queues
            .enqueue(QueueKind::Intervention, Priority::High, analysis.clone());
    }
    if analysis.opportunity_score > OPPORTUNITY_THRESHOLD {
        ctx.queues
            .enqueue(QueueKind::Optimization, Priority::Low, analysis.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::{BufferingCollector, InteractionEvent};
    use crate::sink::InMemorySink;
    use crate::types::{Session, SessionConfig};

    fn analysis_with_overall(overall: f64) -> IntegratedAnalysis {
        IntegratedAnalysis {
            overall_score: overall,
            confidence_score: 0.8,
            risk_score: 0.0,
            opportunity_score: 0.0,
            insights: vec![],
            timestamp: Utc::now(),
        }
    }

    fn history_of(scores: &[f64]) -> Vec<IntegratedAnalysis> {
        scores.iter().map(|s| analysis_with_overall(*s)).collect()
    }

    #[test]
    fn test_trend_improving_over_rising_scores() {
        let scores: Vec<f64> = (1..=10).map(|i| i as f64 / 10.0).collect();
        assert_eq!(classify_trend(&history_of(&scores)), TrendDirection::Improving);
    }

    #[test]
    fn test_trend_declining_over_falling_scores() {
        let scores: Vec<f64> = (1..=10).rev().map(|i| i as f64 / 10.0).collect();
        assert_eq!(classify_trend(&history_of(&scores)), TrendDirection::Declining);
    }

    #[test]
    fn test_trend_stable_when_flat() {
        let scores = vec![0.5, 0.52, 0.49, 0.5, 0.51, 0.5];
        assert_eq!(classify_trend(&history_of(&scores)), TrendDirection::Stable);
    }

    #[test]
    fn test_trend_stable_with_short_history() {
        let scores = vec![0.1, 0.9];
        assert_eq!(classify_trend(&history_of(&scores)), TrendDirection::Stable);
    }

    fn active_state(config: SessionConfig) -> SessionState {
        let mut state = SessionState::new();
        state.session = Some(Session::begin(config));
        state
    }

    fn context(state: SessionState, collectors: Vec<Arc<dyn DataCollector>>) -> AggregatorContext {
        AggregatorContext {
            state: Arc::new(RwLock::new(state)),
            engine: Arc::new(AnalysisEngine::with_defaults().unwrap()),
            queues: Arc::new(QueueManager::default()),
            sink: Arc::new(InMemorySink::new()),
            collectors,
            profile: UserProfile::new("user-1"),
            interval: Duration::from_millis(100),
        }
    }

    #[tokio::test]
    async fn test_tick_skips_without_new_metrics() {
        let ctx = context(active_state(SessionConfig::new("user-1")), vec![]);
        assert_eq!(run_tick(&ctx).await, TickOutcome::Skipped);
        assert!(ctx.state.read().await.history.is_empty());
    }

    #[tokio::test]
    async fn test_tick_processes_buffered_events() {
        let mut state = active_state(SessionConfig::new("user-1"));
        state
            .events
            .push(InteractionEvent::response(Some(500), Some(true)));
        let ctx = context(state, vec![]);

        assert_eq!(run_tick(&ctx).await, TickOutcome::Processed);
        let state = ctx.state.read().await;
        assert_eq!(state.history.len(), 1);
        assert_eq!(state.tick_cursor, 1);
        assert!(!state.analyzing);

        drop(state);
        // Second tick with no new events is a no-op.
        assert_eq!(run_tick(&ctx).await, TickOutcome::Skipped);
        assert_eq!(ctx.state.read().await.history.len(), 1);
    }

    #[tokio::test]
    async fn test_tick_detects_ended_session() {
        let ctx = context(SessionState::new(), vec![]);
        assert_eq!(run_tick(&ctx).await, TickOutcome::SessionEnded);
    }

    #[tokio::test]
    async fn test_tick_drains_collectors() {
        let collector = Arc::new(BufferingCollector::new("sensor"));
        collector.push(InteractionEvent::response(Some(400), Some(true)));
        collector.push(InteractionEvent::error(None, false));

        let ctx = context(
            active_state(SessionConfig::new("user-1")),
            vec![collector.clone()],
        );
        assert_eq!(run_tick(&ctx).await, TickOutcome::Processed);

        let state = ctx.state.read().await;
        assert_eq!(state.events.len(), 2);
        assert_eq!(state.history.len(), 1);
    }

    #[tokio::test]
    async fn test_tick_persists_analysis() {
        let sink = Arc::new(InMemorySink::new());
        let mut state = active_state(SessionConfig::new("user-1"));
        state
            .events
            .push(InteractionEvent::response(Some(500), Some(true)));
        let mut ctx = context(state, vec![]);
        ctx.sink = sink.clone();

        run_tick(&ctx).await;
        assert_eq!(sink.analyses().len(), 1);
    }

    #[tokio::test]
    async fn test_high_risk_tick_enqueues_high_priority_intervention() {
        let mut state = active_state(SessionConfig::new("user-1"));
        // Heavy sustained frustration signal.
        for _ in 0..5 {
            state
                .events
                .push(InteractionEvent::self_report(Some(0.95), None, Some(0.05)));
            state.events.push(InteractionEvent::error(None, true));
        }
        let ctx = context(state, vec![]);

        run_tick(&ctx).await;
        let interventions = ctx.queues.peek_all(QueueKind::Intervention);
        assert_eq!(interventions.len(), 1);
        assert_eq!(interventions[0].priority, Priority::High);
    }

    #[tokio::test]
    async fn test_loop_stops_on_cancellation() {
        let ctx = context(active_state(SessionConfig::new("user-1")), vec![]);
        let token = CancellationToken::new();
        let handle = tokio::spawn(run_aggregator_loop(ctx, token.clone()));

        token.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("loop did not stop after cancellation")
            .unwrap();
    }
}
