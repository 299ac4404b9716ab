//! Persistence collaborator seam
//!
//! The orchestrator performs no disk or network I/O itself; analysis ticks
//! and session reports are handed to an `AnalysisSink`. Sink failures are
//! absorbed with a warning so a broken persistence layer never fails a
//! processing pass.

use async_trait::async_trait;
use std::sync::Mutex;
use uuid::Uuid;

use crate::error::OrchestratorError;
use crate::types::{IntegratedAnalysis, SessionReport};

/// Outbound seam to the persistence layer.
#[async_trait]
pub trait AnalysisSink: Send + Sync {
    /// Persist one periodic analysis tick, keyed by session.
    async fn persist_analysis(
        &self,
        session_id: Uuid,
        analysis: &IntegratedAnalysis,
    ) -> Result<(), OrchestratorError>;

    /// Persist the final session report.
    async fn persist_report(&self, report: &SessionReport) -> Result<(), OrchestratorError>;
}

/// In-memory sink for embedding and tests.
#[derive(Default)]
pub struct InMemorySink {
    analyses: Mutex<Vec<(Uuid, IntegratedAnalysis)>>,
    reports: Mutex<Vec<SessionReport>>,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Analyses persisted so far, in arrival order.
    pub fn analyses(&self) -> Vec<(Uuid, IntegratedAnalysis)> {
        self.analyses.lock().expect("sink lock poisoned").clone()
    }

    /// Reports persisted so far, in arrival order.
    pub fn reports(&self) -> Vec<SessionReport> {
        self.reports.lock().expect("sink lock poisoned").clone()
    }
}

#[async_trait]
impl AnalysisSink for InMemorySink {
    async fn persist_analysis(
        &self,
        session_id: Uuid,
        analysis: &IntegratedAnalysis,
    ) -> Result<(), OrchestratorError> {
        self.analyses
            .lock()
            .expect("sink lock poisoned")
            .push((session_id, analysis.clone()));
        Ok(())
    }

    async fn persist_report(&self, report: &SessionReport) -> Result<(), OrchestratorError> {
        self.reports
            .lock()
            .expect("sink lock poisoned")
            .push(report.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn test_in_memory_sink_records_analyses() {
        let sink = InMemorySink::new();
        let session_id = Uuid::new_v4();
        let analysis = IntegratedAnalysis {
            overall_score: 0.4,
            confidence_score: 0.7,
            risk_score: 0.1,
            opportunity_score: 0.3,
            insights: vec![],
            timestamp: Utc::now(),
        };

        sink.persist_analysis(session_id, &analysis).await.unwrap();
        let stored = sink.analyses();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].0, session_id);
        assert_eq!(stored[0].1.overall_score, 0.4);
    }
}
