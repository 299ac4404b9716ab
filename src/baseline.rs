//! Cross-session baseline management
//!
//! Maintains rolling baselines of final session scores so reports can
//! state how a session compares to the user's recent norm.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::types::{IntegratedAnalysis, SessionBaselines};

/// Default baseline window in sessions
pub const DEFAULT_BASELINE_WINDOW: usize = 20;

/// Rolling store of final session scores
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselineStore {
    overall_values: VecDeque<f64>,
    risk_values: VecDeque<f64>,
    opportunity_values: VecDeque<f64>,
    window_size: usize,
}

impl Default for BaselineStore {
    fn default() -> Self {
        Self::new(DEFAULT_BASELINE_WINDOW)
    }
}

impl BaselineStore {
    /// Create a store with the given window size (number of sessions).
    pub fn new(window_size: usize) -> Self {
        Self {
            overall_values: VecDeque::with_capacity(window_size),
            risk_values: VecDeque::with_capacity(window_size),
            opportunity_values: VecDeque::with_capacity(window_size),
            window_size: window_size.max(1),
        }
    }

    /// Record a session's final analysis and return baseline context.
    ///
    /// The deviation compares the new session against the baseline built
    /// from prior sessions only; the returned baselines include the new
    /// session.
    pub fn update_and_contextualize(&mut self, final_analysis: &IntegratedAnalysis) -> SessionBaselines {
        let prior_overall = Self::rolling_average(&self.overall_values);
        let overall_deviation_pct =
            Self::deviation_pct(final_analysis.overall_score, prior_overall);

        Self::push_bounded(
            &mut self.overall_values,
            final_analysis.overall_score,
            self.window_size,
        );
        Self::push_bounded(
            &mut self.risk_values,
            final_analysis.risk_score,
            self.window_size,
        );
        Self::push_bounded(
            &mut self.opportunity_values,
            final_analysis.opportunity_score,
            self.window_size,
        );

        SessionBaselines {
            overall_baseline: Self::rolling_average(&self.overall_values),
            risk_baseline: Self::rolling_average(&self.risk_values),
            opportunity_baseline: Self::rolling_average(&self.opportunity_values),
            overall_deviation_pct,
            sessions_in_baseline: self.overall_values.len() as u32,
        }
    }

    fn push_bounded(queue: &mut VecDeque<f64>, value: f64, window_size: usize) {
        queue.push_back(value);
        while queue.len() > window_size {
            queue.pop_front();
        }
    }

    fn deviation_pct(current: f64, baseline: Option<f64>) -> Option<f64> {
        match baseline {
            Some(base) if base > 0.0 => Some(((current - base) / base) * 100.0),
            Some(_) if current > 0.0 => Some(100.0),
            Some(_) => Some(0.0),
            None => None,
        }
    }

    fn rolling_average(queue: &VecDeque<f64>) -> Option<f64> {
        if queue.is_empty() {
            return None;
        }
        Some(queue.iter().sum::<f64>() / queue.len() as f64)
    }

    /// Number of sessions currently in the baseline.
    pub fn session_count(&self) -> usize {
        self.overall_values.len()
    }

    /// Clear all baseline data.
    pub fn clear(&mut self) {
        self.overall_values.clear();
        self.risk_values.clear();
        self.opportunity_values.clear();
    }

    /// Serialize to JSON for persistence across restarts.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Load from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn analysis(overall: f64, risk: f64, opportunity: f64) -> IntegratedAnalysis {
        IntegratedAnalysis {
            overall_score: overall,
            confidence_score: 0.8,
            risk_score: risk,
            opportunity_score: opportunity,
            insights: vec![],
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_baseline_accumulation() {
        let mut store = BaselineStore::new(10);
        for _ in 0..5 {
            store.update_and_contextualize(&analysis(0.6, 0.2, 0.5));
        }

        let baselines = store.update_and_contextualize(&analysis(0.6, 0.2, 0.5));
        assert!((baselines.overall_baseline.unwrap() - 0.6).abs() < 1e-9);
        assert_eq!(baselines.sessions_in_baseline, 6);
    }

    #[test]
    fn test_window_rolls() {
        let mut store = BaselineStore::new(3);
        for overall in [0.2, 0.3, 0.4, 0.5, 0.6] {
            store.update_and_contextualize(&analysis(overall, 0.0, 0.0));
        }
        assert_eq!(store.session_count(), 3);
        // Window holds 0.4, 0.5, 0.6.
        let baselines = store.update_and_contextualize(&analysis(0.5, 0.0, 0.0));
        assert_eq!(baselines.sessions_in_baseline, 3);
    }

    #[test]
    fn test_deviation_against_prior_sessions() {
        let mut store = BaselineStore::new(10);
        for _ in 0..4 {
            store.update_and_contextualize(&analysis(0.5, 0.0, 0.0));
        }

        let baselines = store.update_and_contextualize(&analysis(0.6, 0.0, 0.0));
        // 0.6 against a prior baseline of 0.5 = +20%.
        assert!((baselines.overall_deviation_pct.unwrap() - 20.0).abs() < 0.1);
    }

    #[test]
    fn test_first_session_has_no_deviation() {
        let mut store = BaselineStore::default();
        let baselines = store.update_and_contextualize(&analysis(0.7, 0.1, 0.4));
        assert!(baselines.overall_deviation_pct.is_none());
        assert_eq!(baselines.sessions_in_baseline, 1);
    }

    #[test]
    fn test_json_round_trip() {
        let mut store = BaselineStore::new(10);
        store.update_and_contextualize(&analysis(0.5, 0.2, 0.3));

        let json = store.to_json().unwrap();
        let loaded = BaselineStore::from_json(&json).unwrap();
        assert_eq!(loaded.session_count(), 1);
    }

    #[test]
    fn test_clear() {
        let mut store = BaselineStore::new(10);
        store.update_and_contextualize(&analysis(0.5, 0.2, 0.3));
        store.clear();
        assert_eq!(store.session_count(), 0);
    }
}
