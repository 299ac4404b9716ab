//! Error types for the orchestrator

use thiserror::Error;

/// Errors that can occur during session orchestration
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Invalid lifecycle state: expected {expected}, found {actual}")]
    InvalidState { expected: String, actual: String },

    #[error("No active session")]
    NoActiveSession,

    #[error("Algorithm '{algorithm}' failed: {message}")]
    AlgorithmExecution { algorithm: String, message: String },

    #[error("Invalid weight configuration: {0}")]
    WeightConfiguration(String),

    #[error("Collector unavailable: {0}")]
    CollectorUnavailable(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid session config: {0}")]
    InvalidConfig(String),
}

impl OrchestratorError {
    /// Build an `InvalidState` error from the expected and observed states.
    pub fn invalid_state(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::InvalidState {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Build an `AlgorithmExecution` error for a named unit.
    pub fn algorithm(algorithm: impl Into<String>, message: impl Into<String>) -> Self {
        Self::AlgorithmExecution {
            algorithm: algorithm.into(),
            message: message.into(),
        }
    }
}
