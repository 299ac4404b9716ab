//! Session lifecycle orchestration
//!
//! The top-level state machine: owns the current session, the shared
//! buffered-metrics state, the realtime fast path, the periodic
//! aggregator's lifetime, and the queue pair. Surrounding application code
//! drives it through the narrow operation set re-exported from the crate
//! root; it performs no I/O of its own.

use std::sync::{Arc, Mutex as StdMutex, RwLock as StdRwLock};

use chrono::Utc;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::aggregator::{classify_trend, run_aggregator_loop, AggregatorContext};
use crate::baseline::BaselineStore;
use crate::collector::{CollectorSummary, DataCollector, InteractionEvent};
use crate::error::OrchestratorError;
use crate::queue::{QueueDepths, QueueManager, QueueSnapshot};
use crate::realtime::{RealtimeProcessor, DEFAULT_REALTIME_BUFFER, REALTIME_WINDOW_MIN_SEC};
use crate::registry::AnalysisEngine;
use crate::sink::{AnalysisSink, InMemorySink};
use crate::types::{
    IntegratedAnalysis, Recommendation, Session, SessionConfig, SessionReport, SessionStatus,
    TrendDirection, UserProfile,
};
use crate::window::events_to_window;

/// Shared mutable state both processing paths read and write.
///
/// Guarded by one `RwLock`; neither path holds the lock while scoring, so
/// the realtime pass never waits on a full periodic pass.
pub(crate) struct SessionState {
    pub(crate) session: Option<Session>,
    pub(crate) events: Vec<InteractionEvent>,
    /// Number of events already seen by the periodic aggregator.
    pub(crate) tick_cursor: usize,
    pub(crate) history: Vec<IntegratedAnalysis>,
    pub(crate) trend: TrendDirection,
    pub(crate) realtime: Option<IntegratedAnalysis>,
    pub(crate) analyzing: bool,
}

impl SessionState {
    pub(crate) fn new() -> Self {
        Self {
            session: None,
            events: Vec::new(),
            tick_cursor: 0,
            history: Vec::new(),
            trend: TrendDirection::Stable,
            realtime: None,
            analyzing: false,
        }
    }

    pub(crate) fn is_active(&self) -> bool {
        matches!(
            self.session.as_ref().map(|s| s.status),
            Some(SessionStatus::Active)
        )
    }

    fn status_name(&self) -> &'static str {
        match self.session.as_ref().map(|s| s.status) {
            Some(SessionStatus::Active) => "active",
            Some(SessionStatus::Completed) => "completed",
            None => "idle",
        }
    }
}

struct AggregatorTask {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Public status snapshot for the presentation collaborator
#[derive(Debug, Clone, Copy)]
pub struct OrchestratorStatus {
    pub is_active: bool,
    pub is_analyzing: bool,
    pub queue_depths: QueueDepths,
}

/// Coordinates collection, the dual-cadence analysis paths, and the queues
/// for one user at a time.
pub struct Orchestrator {
    engine: Arc<AnalysisEngine>,
    queues: Arc<QueueManager>,
    sink: Arc<dyn AnalysisSink>,
    collectors: Vec<Arc<dyn DataCollector>>,
    state: Arc<RwLock<SessionState>>,
    baselines: StdMutex<BaselineStore>,
    profile: StdRwLock<Option<UserProfile>>,
    /// Serializes start/end transitions and aggregator arm/disarm.
    lifecycle: Mutex<Option<AggregatorTask>>,
}

impl Orchestrator {
    /// Orchestrator with the default algorithm engine, queue settings, and
    /// an in-memory sink.
    pub fn new() -> Result<Self, OrchestratorError> {
        Ok(Self::with_engine(AnalysisEngine::with_defaults()?))
    }

    /// Orchestrator around an explicit engine.
    pub fn with_engine(engine: AnalysisEngine) -> Self {
        Self {
            engine: Arc::new(engine),
            queues: Arc::new(QueueManager::default()),
            sink: Arc::new(InMemorySink::new()),
            collectors: Vec::new(),
            state: Arc::new(RwLock::new(SessionState::new())),
            baselines: StdMutex::new(BaselineStore::default()),
            profile: StdRwLock::new(None),
            lifecycle: Mutex::new(None),
        }
    }

    /// Replace the persistence sink.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn AnalysisSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Register a data collector.
    #[must_use]
    pub fn with_collector(mut self, collector: Arc<dyn DataCollector>) -> Self {
        self.collectors.push(collector);
        self
    }

    /// Replace the queue manager (e.g. to change the debounce window).
    #[must_use]
    pub fn with_queues(mut self, queues: QueueManager) -> Self {
        self.queues = Arc::new(queues);
        self
    }

    /// Bind the orchestrator to a user profile.
    ///
    /// Idempotent; returns `false` when a session is active (the profile
    /// cannot change mid-session).
    pub async fn initialize(&self, profile: UserProfile) -> bool {
        if self.state.read().await.is_active() {
            warn!(user = %profile.user_id, "Cannot re-initialize during an active session");
            return false;
        }
        info!(
            user = %profile.user_id,
            version = crate::ORCHESTRATOR_VERSION,
            "Orchestrator initialized"
        );
        *self.profile.write().expect("profile lock poisoned") = Some(profile);
        true
    }

    fn profile_snapshot(&self) -> Option<UserProfile> {
        self.profile.read().expect("profile lock poisoned").clone()
    }

    /// Start a session.
    ///
    /// Valid only when no session is active; arms the periodic aggregator
    /// and signals collectors to begin buffering.
    pub async fn start_session(
        &self,
        config: SessionConfig,
    ) -> Result<Session, OrchestratorError> {
        let mut lifecycle = self.lifecycle.lock().await;

        let profile = self.profile_snapshot().ok_or_else(|| {
            OrchestratorError::invalid_state("initialized", "uninitialized")
        })?;
        if config.analysis_interval_ms == 0 {
            return Err(OrchestratorError::InvalidConfig(
                "analysis_interval_ms must be positive".to_string(),
            ));
        }

        let session = {
            let mut state = self.state.write().await;
            if state.is_active() {
                return Err(OrchestratorError::invalid_state("idle", state.status_name()));
            }
            let session = Session::begin(config);
            state.session = Some(session.clone());
            state.events.clear();
            state.tick_cursor = 0;
            state.history.clear();
            state.trend = TrendDirection::Stable;
            state.realtime = None;
            state.analyzing = false;
            session
        };

        for collector in &self.collectors {
            if let Err(e) = collector.begin(&session).await {
                warn!(collector = collector.id(), error = %e, "Collector failed to start");
            }
        }

        let token = CancellationToken::new();
        let ctx = AggregatorContext {
            state: Arc::clone(&self.state),
            engine: Arc::clone(&self.engine),
            queues: Arc::clone(&self.queues),
            sink: Arc::clone(&self.sink),
            collectors: self.collectors.clone(),
            profile,
            interval: std::time::Duration::from_millis(session.config.analysis_interval_ms),
        };
        let handle = tokio::spawn(run_aggregator_loop(ctx, token.clone()));
        *lifecycle = Some(AggregatorTask { token, handle });

        info!(
            session = %session.id,
            user = %session.user_id,
            activity = %session.config.activity_type,
            "Session started"
        );
        Ok(session)
    }

    /// End the active session.
    ///
    /// Disarms the aggregator, collects terminal summaries, runs one final
    /// full pass across both families, persists and returns the report.
    pub async fn end_session(&self) -> Result<SessionReport, OrchestratorError> {
        let mut lifecycle = self.lifecycle.lock().await;

        if !self.state.read().await.is_active() {
            return Err(OrchestratorError::NoActiveSession);
        }
        let profile = self
            .profile_snapshot()
            .ok_or(OrchestratorError::NoActiveSession)?;

        // Disarm the timer before touching anything else: no tick may fire
        // for a session that has ended. An in-flight tick completes first.
        if let Some(task) = lifecycle.take() {
            task.token.cancel();
            if let Err(e) = task.handle.await {
                warn!(error = %e, "Aggregator task ended abnormally");
            }
        }

        let mut summaries: Vec<CollectorSummary> = Vec::new();
        let mut degraded = false;
        for collector in &self.collectors {
            match collector.drain().await {
                Ok(events) => self.state.write().await.events.extend(events),
                Err(e) => {
                    warn!(collector = collector.id(), error = %e, "Terminal drain failed");
                    degraded = true;
                }
            }
            match collector.summarize().await {
                Ok(summary) => summaries.push(summary),
                Err(e) => {
                    warn!(collector = collector.id(), error = %e, "Terminal summary failed");
                    degraded = true;
                }
            }
            if let Err(e) = collector.stop().await {
                warn!(collector = collector.id(), error = %e, "Collector failed to stop");
            }
        }

        let ended_at = Utc::now();
        let (mut session, events, history) = {
            let mut state = self.state.write().await;
            let session = state.session.clone().ok_or(OrchestratorError::NoActiveSession)?;
            (session, state.events.clone(), std::mem::take(&mut state.history))
        };

        let mut window = events_to_window(
            &events,
            session.start_time,
            ended_at,
            session.config.difficulty,
        );
        for summary in &summaries {
            window.merge_summary(summary);
        }
        if degraded {
            window.mark_collector_degraded();
        }

        let results = Arc::clone(&self.engine)
            .run_full_parallel(&profile, &window)
            .await;
        let final_analysis = self.engine.integrate(&results);
        let recommendations = dedupe_recommendations(
            results.iter().flat_map(|r| r.recommendations.iter().cloned()),
        );

        let trend = classify_trend(&history);
        let baselines = self
            .baselines
            .lock()
            .expect("baseline lock poisoned")
            .update_and_contextualize(&final_analysis);

        session.status = SessionStatus::Completed;
        session.end_time = Some(ended_at);

        let report = SessionReport {
            session: session.clone(),
            final_analysis,
            history,
            trend,
            recommendations,
            baselines,
            producer: crate::PRODUCER_NAME.to_string(),
            producer_version: crate::ORCHESTRATOR_VERSION.to_string(),
            generated_at: ended_at,
        };

        if let Err(e) = self.sink.persist_report(&report).await {
            warn!(error = %e, "Failed to persist session report");
        }

        {
            let mut state = self.state.write().await;
            state.session = Some(session.clone());
            state.realtime = None;
            state.analyzing = false;
        }

        info!(
            session = %session.id,
            overall = report.final_analysis.overall_score,
            trend = ?report.trend,
            "Session ended"
        );
        Ok(report)
    }

    /// Process one interaction event on the realtime fast path.
    ///
    /// Returns `None` when no session is active or the session was started
    /// with the realtime path disabled; the event is still buffered for
    /// the periodic pass in the latter case.
    pub async fn process_event(
        &self,
        event: InteractionEvent,
    ) -> Result<Option<IntegratedAnalysis>, OrchestratorError> {
        let (recent, difficulty, window_start) = {
            let mut state = self.state.write().await;
            let Some(session) = state.session.as_ref() else {
                return Ok(None);
            };
            if session.status != SessionStatus::Active {
                return Ok(None);
            }
            let realtime_enabled = session.config.realtime_enabled;
            let difficulty = session.config.difficulty;
            state.events.push(event);

            if !realtime_enabled {
                return Ok(None);
            }

            let from = state.events.len().saturating_sub(DEFAULT_REALTIME_BUFFER);
            let recent: Vec<InteractionEvent> = state.events[from..].to_vec();
            // A minimum span keeps per-minute rates meaningful when the
            // buffer holds only a burst of very recent events.
            let min_start = Utc::now() - chrono::Duration::seconds(REALTIME_WINDOW_MIN_SEC);
            let window_start = recent
                .first()
                .map(|e| e.timestamp.min(min_start))
                .unwrap_or(min_start);
            (recent, difficulty, window_start)
        };

        let profile = self
            .profile_snapshot()
            .ok_or(OrchestratorError::NoActiveSession)?;
        let window = events_to_window(&recent, window_start, Utc::now(), difficulty);

        // Scoring runs without the state lock held; the periodic pass can
        // proceed concurrently.
        let processor =
            RealtimeProcessor::new(Arc::clone(&self.engine), Arc::clone(&self.queues));
        let pass = processor.process(&profile, &window);

        {
            let mut state = self.state.write().await;
            state.realtime = Some(pass.analysis.clone());
        }
        Ok(Some(pass.analysis))
    }

    /// Snapshot of both queues.
    pub fn get_queues(&self) -> QueueSnapshot {
        self.queues.snapshot()
    }

    /// Mark an intervention processed. Idempotent.
    pub fn mark_intervention(&self, id: uuid::Uuid) -> bool {
        self.queues.mark_processed(id)
    }

    /// Mark an optimization processed. Idempotent.
    pub fn mark_optimization(&self, id: uuid::Uuid) -> bool {
        self.queues.mark_processed(id)
    }

    /// Current status for the presentation collaborator.
    pub async fn get_status(&self) -> OrchestratorStatus {
        let state = self.state.read().await;
        OrchestratorStatus {
            is_active: state.is_active(),
            is_analyzing: state.analyzing,
            queue_depths: self.queues.depths(),
        }
    }

    /// The current session record, if any.
    pub async fn current_session(&self) -> Option<Session> {
        self.state.read().await.session.clone()
    }

    /// Latest realtime analysis, if the fast path has run.
    pub async fn realtime_snapshot(&self) -> Option<IntegratedAnalysis> {
        self.state.read().await.realtime.clone()
    }

    /// Periodic analysis history for the current session.
    pub async fn history(&self) -> Vec<IntegratedAnalysis> {
        self.state.read().await.history.clone()
    }

    /// Current trend classification.
    pub async fn trend(&self) -> TrendDirection {
        self.state.read().await.trend
    }
}

/// Keep the first recommendation per action key, preserving order.
fn dedupe_recommendations(
    recommendations: impl Iterator<Item = Recommendation>,
) -> Vec<Recommendation> {
    let mut seen = std::collections::HashSet::new();
    recommendations
        .filter(|r| seen.insert(r.action.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::BufferingCollector;
    use crate::types::{Priority, QueueKind};
    use std::time::Duration;

    fn orchestrator() -> Orchestrator {
        Orchestrator::new().unwrap()
    }

    async fn initialized() -> Orchestrator {
        let orchestrator = orchestrator();
        assert!(orchestrator.initialize(UserProfile::new("user-1")).await);
        orchestrator
    }

    #[tokio::test]
    async fn test_start_requires_initialization() {
        let orchestrator = orchestrator();
        let result = orchestrator
            .start_session(SessionConfig::new("user-1"))
            .await;
        assert!(matches!(
            result,
            Err(OrchestratorError::InvalidState { .. })
        ));
    }

    #[tokio::test]
    async fn test_start_while_active_is_invalid() {
        let orchestrator = initialized().await;
        orchestrator
            .start_session(SessionConfig::new("user-1"))
            .await
            .unwrap();

        let second = orchestrator
            .start_session(SessionConfig::new("user-1"))
            .await;
        assert!(matches!(
            second,
            Err(OrchestratorError::InvalidState { .. })
        ));
        orchestrator.end_session().await.unwrap();
    }

    #[tokio::test]
    async fn test_end_without_session_is_invalid() {
        let orchestrator = initialized().await;
        let result = orchestrator.end_session().await;
        assert!(matches!(result, Err(OrchestratorError::NoActiveSession)));
    }

    #[tokio::test]
    async fn test_zero_event_session_reports_zero_score() {
        let orchestrator = initialized().await;
        orchestrator
            .start_session(SessionConfig::new("user-1"))
            .await
            .unwrap();
        let report = orchestrator.end_session().await.unwrap();

        assert_eq!(report.final_analysis.overall_score, 0.0);
        assert_eq!(report.session.status, SessionStatus::Completed);
        assert!(report.session.end_time.is_some());
        assert!(report.history.is_empty());
    }

    #[tokio::test]
    async fn test_frustration_event_emits_single_immediate_intervention() {
        let orchestrator = initialized().await;
        orchestrator
            .start_session(SessionConfig::new("user-1").with_realtime(true))
            .await
            .unwrap();

        let analysis = orchestrator
            .process_event(InteractionEvent::self_report(Some(0.85), None, None))
            .await
            .unwrap()
            .expect("realtime analysis expected");
        assert!(analysis.risk_score > 0.0);

        let queues = orchestrator.get_queues();
        assert_eq!(queues.interventions.len(), 1);
        assert_eq!(queues.interventions[0].priority, Priority::Immediate);
        assert_eq!(queues.interventions[0].kind, QueueKind::Intervention);

        orchestrator.end_session().await.unwrap();
    }

    #[tokio::test]
    async fn test_realtime_disabled_buffers_but_returns_none() {
        let orchestrator = initialized().await;
        orchestrator
            .start_session(SessionConfig::new("user-1").with_realtime(false))
            .await
            .unwrap();

        let result = orchestrator
            .process_event(InteractionEvent::self_report(Some(0.9), None, None))
            .await
            .unwrap();
        assert!(result.is_none());
        assert!(orchestrator.get_queues().interventions.is_empty());

        orchestrator.end_session().await.unwrap();
    }

    #[tokio::test]
    async fn test_event_before_start_is_ignored() {
        let orchestrator = initialized().await;
        let result = orchestrator
            .process_event(InteractionEvent::response(Some(300), Some(true)))
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_status_reflects_lifecycle() {
        let orchestrator = initialized().await;
        assert!(!orchestrator.get_status().await.is_active);

        orchestrator
            .start_session(SessionConfig::new("user-1"))
            .await
            .unwrap();
        assert!(orchestrator.get_status().await.is_active);

        orchestrator.end_session().await.unwrap();
        assert!(!orchestrator.get_status().await.is_active);
    }

    #[tokio::test]
    async fn test_mark_intervention_idempotent_via_public_api() {
        let orchestrator = initialized().await;
        orchestrator
            .start_session(SessionConfig::new("user-1"))
            .await
            .unwrap();
        orchestrator
            .process_event(InteractionEvent::self_report(Some(0.95), None, None))
            .await
            .unwrap();

        let queues = orchestrator.get_queues();
        let id = queues.interventions[0].id;
        assert!(orchestrator.mark_intervention(id));
        assert!(!orchestrator.mark_intervention(id));
        assert_eq!(orchestrator.get_queues().interventions.len(), 0);

        orchestrator.end_session().await.unwrap();
    }

    #[tokio::test]
    async fn test_queue_snapshot_is_isolated() {
        let orchestrator = initialized().await;
        orchestrator
            .start_session(SessionConfig::new("user-1"))
            .await
            .unwrap();
        orchestrator
            .process_event(InteractionEvent::self_report(Some(0.95), None, None))
            .await
            .unwrap();

        let mut snapshot = orchestrator.get_queues();
        let id = snapshot.interventions[0].id;
        snapshot.interventions.clear();

        assert_eq!(orchestrator.get_queues().interventions.len(), 1);
        assert!(orchestrator.mark_intervention(id));

        orchestrator.end_session().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_ticks_build_history_and_stop_after_end() {
        let collector = Arc::new(BufferingCollector::new("sensor"));
        let orchestrator = Orchestrator::new()
            .unwrap()
            .with_collector(collector.clone());
        orchestrator.initialize(UserProfile::new("user-1")).await;

        orchestrator
            .start_session(
                SessionConfig::new("user-1")
                    .with_analysis_interval_ms(100)
                    .with_realtime(false),
            )
            .await
            .unwrap();

        for _ in 0..6 {
            collector.push(InteractionEvent::response(Some(500), Some(true)));
            tokio::time::sleep(Duration::from_millis(120)).await;
        }

        let history_len = orchestrator.history().await.len();
        assert!(history_len >= 1, "expected at least one periodic tick");

        let report = orchestrator.end_session().await.unwrap();
        assert_eq!(report.history.len(), history_len);

        // No tick fires after end: state history was consumed by the
        // report and stays empty.
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(orchestrator.history().await.is_empty());
    }

    #[tokio::test]
    async fn test_collector_summaries_feed_final_report() {
        let collector = Arc::new(BufferingCollector::new("sensor"));
        let orchestrator = Orchestrator::new()
            .unwrap()
            .with_collector(collector.clone());
        orchestrator.initialize(UserProfile::new("user-1")).await;

        orchestrator
            .start_session(SessionConfig::new("user-1").with_realtime(false))
            .await
            .unwrap();
        for i in 0..10 {
            collector.push(InteractionEvent::response(Some(400 + i * 10), Some(i % 2 == 0)));
        }

        let report = orchestrator.end_session().await.unwrap();
        assert!(report.final_analysis.overall_score > 0.0);
        assert!(report.final_analysis.confidence_score > 0.0);
    }

    #[tokio::test]
    async fn test_new_session_after_completion() {
        let orchestrator = initialized().await;
        orchestrator
            .start_session(SessionConfig::new("user-1"))
            .await
            .unwrap();
        let first = orchestrator.end_session().await.unwrap();

        let second_session = orchestrator
            .start_session(SessionConfig::new("user-1"))
            .await
            .unwrap();
        assert_ne!(first.session.id, second_session.id);
        assert!(orchestrator.history().await.is_empty());

        orchestrator.end_session().await.unwrap();
    }

    #[tokio::test]
    async fn test_initialize_rejected_mid_session() {
        let orchestrator = initialized().await;
        orchestrator
            .start_session(SessionConfig::new("user-1"))
            .await
            .unwrap();

        assert!(!orchestrator.initialize(UserProfile::new("user-2")).await);
        orchestrator.end_session().await.unwrap();
    }

    #[tokio::test]
    async fn test_zero_interval_rejected() {
        let orchestrator = initialized().await;
        let result = orchestrator
            .start_session(SessionConfig::new("user-1").with_analysis_interval_ms(0))
            .await;
        assert!(matches!(result, Err(OrchestratorError::InvalidConfig(_))));
    }

    #[test]
    fn test_dedupe_recommendations_keeps_first() {
        use crate::types::RecommendationKind;
        let recs = vec![
            Recommendation::new(RecommendationKind::Support, "offer_support", "first"),
            Recommendation::new(RecommendationKind::Support, "offer_support", "second"),
            Recommendation::new(RecommendationKind::Rest, "suggest_break", "third"),
        ];
        let deduped = dedupe_recommendations(recs.into_iter());
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].description, "first");
    }
}
