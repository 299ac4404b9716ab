//! Algorithm registry and weighted integration
//!
//! Holds the ordered unit set and validated weight table for each family,
//! executes passes with per-unit failure isolation, and combines unit
//! results into one integrated analysis with composite risk and
//! opportunity indicators.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};

use crate::algorithms::{emotional, names, neuroplasticity, AlgorithmFamily, AlgorithmUnit};
use crate::error::OrchestratorError;
use crate::types::{AlgorithmResult, Insight, InsightKind, IntegratedAnalysis, UserProfile};
use crate::window::MetricsWindow;

/// Tolerance for the sum-to-one weight invariant
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Unit names contributing to the composite risk score
pub const RISK_CONTRIBUTORS: [&str; 3] = [
    names::FRUSTRATION,
    names::ANXIETY,
    names::COGNITIVE_OVERLOAD,
];

/// Unit names contributing to the composite opportunity score
pub const OPPORTUNITY_CONTRIBUTORS: [&str; 3] = [
    names::ENGAGEMENT,
    names::MOTIVATION,
    names::IMPROVEMENT_POTENTIAL,
];

/// Per-family mapping of unit name to weight.
///
/// Weights are renormalized to sum to 1.0 at construction; configurations
/// that cannot be normalized (empty, negative, or zero-sum) are rejected
/// with `WeightConfigurationError`.
#[derive(Debug, Clone)]
pub struct WeightTable {
    weights: HashMap<String, f64>,
}

impl WeightTable {
    /// Build a table from name/weight pairs, renormalizing to sum to 1.0.
    pub fn new<I, S>(pairs: I) -> Result<Self, OrchestratorError>
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        let mut weights = HashMap::new();
        for (name, weight) in pairs {
            let name = name.into();
            if weight < 0.0 {
                return Err(OrchestratorError::WeightConfiguration(format!(
                    "negative weight {weight} for '{name}'"
                )));
            }
            if weights.insert(name.clone(), weight).is_some() {
                return Err(OrchestratorError::WeightConfiguration(format!(
                    "duplicate weight entry for '{name}'"
                )));
            }
        }

        if weights.is_empty() {
            return Err(OrchestratorError::WeightConfiguration(
                "weight table is empty".to_string(),
            ));
        }

        let total: f64 = weights.values().sum();
        if total <= 0.0 {
            return Err(OrchestratorError::WeightConfiguration(
                "weights sum to zero".to_string(),
            ));
        }
        for weight in weights.values_mut() {
            *weight /= total;
        }

        Ok(Self { weights })
    }

    /// Weight for the named unit, if configured.
    pub fn weight(&self, name: &str) -> Option<f64> {
        self.weights.get(name).copied()
    }

    /// Sum of all weights (1.0 within tolerance after construction).
    pub fn total(&self) -> f64 {
        self.weights.values().sum()
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }
}

/// Ordered unit set plus weight table for one algorithm family.
pub struct AlgorithmRegistry {
    family: AlgorithmFamily,
    units: Vec<Arc<dyn AlgorithmUnit>>,
    weights: WeightTable,
}

impl AlgorithmRegistry {
    /// Build a registry, validating that every unit has a weight and
    /// belongs to the declared family.
    pub fn new(
        family: AlgorithmFamily,
        units: Vec<Arc<dyn AlgorithmUnit>>,
        weights: WeightTable,
    ) -> Result<Self, OrchestratorError> {
        for unit in &units {
            if unit.family() != family {
                return Err(OrchestratorError::WeightConfiguration(format!(
                    "unit '{}' does not belong to family '{}'",
                    unit.name(),
                    family.as_str()
                )));
            }
            if weights.weight(unit.name()).is_none() {
                return Err(OrchestratorError::WeightConfiguration(format!(
                    "no weight configured for unit '{}'",
                    unit.name()
                )));
            }
        }
        Ok(Self {
            family,
            units,
            weights,
        })
    }

    /// Registry with this family's default units and weights.
    pub fn with_defaults(family: AlgorithmFamily) -> Result<Self, OrchestratorError> {
        let (units, weights) = match family {
            AlgorithmFamily::Emotional => {
                (emotional::default_units(), emotional::default_weights())
            }
            AlgorithmFamily::Neuroplasticity => (
                neuroplasticity::default_units(),
                neuroplasticity::default_weights(),
            ),
        };
        Self::new(family, units, WeightTable::new(weights)?)
    }

    pub fn family(&self) -> AlgorithmFamily {
        self.family
    }

    pub fn weights(&self) -> &WeightTable {
        &self.weights
    }

    /// Names of all registered units, in declaration order.
    pub fn unit_names(&self) -> Vec<&'static str> {
        self.units.iter().map(|u| u.name()).collect()
    }

    /// Run every unit against the window.
    ///
    /// A unit failure is absorbed: the unit is excluded from the pass and
    /// the failure logged, so one bad unit degrades rather than aborts the
    /// integration.
    pub fn run_all(&self, profile: &UserProfile, window: &MetricsWindow) -> Vec<AlgorithmResult> {
        self.run_filtered(profile, window, None, false)
    }

    /// Run only the named units (the realtime priority subset).
    pub fn run_subset(
        &self,
        subset: &[&str],
        profile: &UserProfile,
        window: &MetricsWindow,
    ) -> Vec<AlgorithmResult> {
        self.run_filtered(profile, window, Some(subset), true)
    }

    fn run_filtered(
        &self,
        profile: &UserProfile,
        window: &MetricsWindow,
        subset: Option<&[&str]>,
        realtime: bool,
    ) -> Vec<AlgorithmResult> {
        let mut results = Vec::new();
        for unit in &self.units {
            if let Some(subset) = subset {
                if !subset.contains(&unit.name()) {
                    continue;
                }
            }
            let outcome = if realtime {
                unit.execute_realtime(profile, window)
            } else {
                unit.execute(profile, window)
            };
            match outcome {
                Ok(result) => results.push(result),
                Err(e) => {
                    warn!(
                        family = self.family.as_str(),
                        unit = unit.name(),
                        error = %e,
                        "Algorithm unit failed; excluding from pass"
                    );
                }
            }
        }
        results
    }
}

/// Both family registries plus the integrator and realtime subsets.
pub struct AnalysisEngine {
    emotional: AlgorithmRegistry,
    neuroplasticity: AlgorithmRegistry,
    emotional_realtime: Vec<&'static str>,
    neuroplasticity_realtime: Vec<&'static str>,
}

impl AnalysisEngine {
    /// Engine with both families' default units, weights, and realtime
    /// subsets.
    pub fn with_defaults() -> Result<Self, OrchestratorError> {
        Ok(Self {
            emotional: AlgorithmRegistry::with_defaults(AlgorithmFamily::Emotional)?,
            neuroplasticity: AlgorithmRegistry::with_defaults(AlgorithmFamily::Neuroplasticity)?,
            emotional_realtime: emotional::default_realtime_subset(),
            neuroplasticity_realtime: neuroplasticity::default_realtime_subset(),
        })
    }

    /// Engine from explicit registries, with default realtime subsets.
    pub fn new(emotional: AlgorithmRegistry, neuroplasticity: AlgorithmRegistry) -> Self {
        Self {
            emotional,
            neuroplasticity,
            emotional_realtime: crate::algorithms::emotional::default_realtime_subset(),
            neuroplasticity_realtime:
                crate::algorithms::neuroplasticity::default_realtime_subset(),
        }
    }

    /// Override the realtime priority subsets.
    #[must_use]
    pub fn with_realtime_subsets(
        mut self,
        emotional: Vec<&'static str>,
        neuroplasticity: Vec<&'static str>,
    ) -> Self {
        self.emotional_realtime = emotional;
        self.neuroplasticity_realtime = neuroplasticity;
        self
    }

    /// Run every unit in both families, declaration order, failures
    /// isolated per unit.
    pub fn run_full(&self, profile: &UserProfile, window: &MetricsWindow) -> Vec<AlgorithmResult> {
        let mut results = self.emotional.run_all(profile, window);
        results.extend(self.neuroplasticity.run_all(profile, window));
        results
    }

    /// Run the full pass with the two families scored in parallel.
    ///
    /// Unit execution is pure, so family-level parallelism is safe; a
    /// panicked family task is absorbed as a fully degraded family.
    pub async fn run_full_parallel(
        self: Arc<Self>,
        profile: &UserProfile,
        window: &MetricsWindow,
    ) -> Vec<AlgorithmResult> {
        let emotional_task = {
            let engine = Arc::clone(&self);
            let profile = profile.clone();
            let window = window.clone();
            tokio::task::spawn_blocking(move || engine.emotional.run_all(&profile, &window))
        };
        let neuroplasticity_task = {
            let engine = Arc::clone(&self);
            let profile = profile.clone();
            let window = window.clone();
            tokio::task::spawn_blocking(move || {
                engine.neuroplasticity.run_all(&profile, &window)
            })
        };

        let (emotional, neuroplasticity) = tokio::join!(emotional_task, neuroplasticity_task);
        let mut results = emotional.unwrap_or_else(|e| {
            warn!(error = %e, "Emotional family pass panicked");
            Vec::new()
        });
        results.extend(neuroplasticity.unwrap_or_else(|e| {
            warn!(error = %e, "Neuroplasticity family pass panicked");
            Vec::new()
        }));
        results
    }

    /// Run the realtime priority subsets of both families.
    pub fn run_realtime(
        &self,
        profile: &UserProfile,
        window: &MetricsWindow,
    ) -> Vec<AlgorithmResult> {
        let mut results = self
            .emotional
            .run_subset(&self.emotional_realtime, profile, window);
        results.extend(
            self.neuroplasticity
                .run_subset(&self.neuroplasticity_realtime, profile, window),
        );
        results
    }

    fn weight_for(&self, name: &str) -> Option<f64> {
        self.emotional
            .weights()
            .weight(name)
            .or_else(|| self.neuroplasticity.weights().weight(name))
    }

    /// Weighted mean of scores over the named contributors present in the
    /// results. Returns 0.0 when no contributor is present.
    fn composite_over(&self, contributors: &[&str], results: &[AlgorithmResult]) -> f64 {
        let mut numerator = 0.0;
        let mut denominator = 0.0;
        for result in results {
            if !contributors.contains(&result.algorithm_name.as_str()) {
                continue;
            }
            if let Some(weight) = self.weight_for(&result.algorithm_name) {
                numerator += result.score * weight;
                denominator += weight;
            }
        }
        if denominator <= 0.0 {
            return 0.0;
        }
        (numerator / denominator).clamp(0.0, 1.0)
    }

    /// Combine unit results into one integrated analysis.
    ///
    /// Missing units are excluded from both numerator and denominator
    /// (re-normalization over present units); a pass where every unit
    /// failed yields zero scores and an explicit degraded insight rather
    /// than an error.
    pub fn integrate(&self, results: &[AlgorithmResult]) -> IntegratedAnalysis {
        let mut numerator = 0.0;
        let mut confidence_numerator = 0.0;
        let mut denominator = 0.0;
        let mut insights = Vec::new();

        for result in results {
            let Some(weight) = self.weight_for(&result.algorithm_name) else {
                debug!(
                    unit = %result.algorithm_name,
                    "Result from unweighted unit excluded from integration"
                );
                continue;
            };
            numerator += result.score * weight;
            confidence_numerator += result.confidence * weight;
            denominator += weight;
            insights.extend(result.insights.iter().cloned());
        }

        if denominator <= 0.0 {
            return IntegratedAnalysis {
                overall_score: 0.0,
                confidence_score: 0.0,
                risk_score: 0.0,
                opportunity_score: 0.0,
                insights: vec![Insight::new(
                    InsightKind::Degraded,
                    "No analysis units produced results for this pass",
                    1.0,
                )],
                timestamp: Utc::now(),
            };
        }

        IntegratedAnalysis {
            overall_score: (numerator / denominator).clamp(0.0, 1.0),
            confidence_score: (confidence_numerator / denominator).clamp(0.0, 1.0),
            risk_score: self.composite_over(&RISK_CONTRIBUTORS, results),
            opportunity_score: self.composite_over(&OPPORTUNITY_CONTRIBUTORS, results),
            insights,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::InteractionEvent;
    use crate::window::events_to_window;
    use chrono::{DateTime, Duration, TimeZone};

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 14, 0, 0).unwrap()
    }

    fn profile() -> UserProfile {
        UserProfile::new("user-1")
    }

    fn sample_window() -> MetricsWindow {
        let t = base_time();
        let events: Vec<InteractionEvent> = (0..12)
            .map(|i| {
                InteractionEvent::response(Some(500), Some(i % 3 != 0))
                    .at(t + Duration::seconds(i * 10))
            })
            .collect();
        events_to_window(&events, t, t + Duration::seconds(120), 0.5)
    }

    struct FailingUnit;

    impl AlgorithmUnit for FailingUnit {
        fn name(&self) -> &'static str {
            "failing_unit"
        }

        fn family(&self) -> AlgorithmFamily {
            AlgorithmFamily::Emotional
        }

        fn execute(
            &self,
            _profile: &UserProfile,
            _window: &MetricsWindow,
        ) -> Result<AlgorithmResult, OrchestratorError> {
            Err(OrchestratorError::algorithm("failing_unit", "synthetic"))
        }
    }

    #[test]
    fn test_weight_table_renormalizes() {
        let table = WeightTable::new([("a", 2.0), ("b", 2.0)]).unwrap();
        assert!((table.total() - 1.0).abs() < WEIGHT_SUM_TOLERANCE);
        assert!((table.weight("a").unwrap() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_weight_table_rejects_bad_configs() {
        assert!(WeightTable::new(Vec::<(&str, f64)>::new()).is_err());
        assert!(WeightTable::new([("a", -0.1)]).is_err());
        assert!(WeightTable::new([("a", 0.0), ("b", 0.0)]).is_err());
        assert!(WeightTable::new([("a", 0.5), ("a", 0.5)]).is_err());
    }

    #[test]
    fn test_default_tables_sum_to_one() {
        let engine = AnalysisEngine::with_defaults().unwrap();
        assert!((engine.emotional.weights().total() - 1.0).abs() < WEIGHT_SUM_TOLERANCE);
        assert!(
            (engine.neuroplasticity.weights().total() - 1.0).abs() < WEIGHT_SUM_TOLERANCE
        );
    }

    #[test]
    fn test_registry_rejects_unit_without_weight() {
        let units = crate::algorithms::emotional::default_units();
        let table = WeightTable::new([(names::FRUSTRATION, 1.0)]).unwrap();
        let result = AlgorithmRegistry::new(AlgorithmFamily::Emotional, units, table);
        assert!(matches!(
            result,
            Err(OrchestratorError::WeightConfiguration(_))
        ));
    }

    #[test]
    fn test_registry_rejects_family_mismatch() {
        let units = crate::algorithms::emotional::default_units();
        let table = WeightTable::new(crate::algorithms::emotional::default_weights()).unwrap();
        let result = AlgorithmRegistry::new(AlgorithmFamily::Neuroplasticity, units, table);
        assert!(result.is_err());
    }

    #[test]
    fn test_failure_isolation() {
        let mut units = crate::algorithms::emotional::default_units();
        units.push(Arc::new(FailingUnit));
        let mut weights = crate::algorithms::emotional::default_weights();
        weights.push(("failing_unit", 0.2));
        let registry = AlgorithmRegistry::new(
            AlgorithmFamily::Emotional,
            units,
            WeightTable::new(weights).unwrap(),
        )
        .unwrap();

        let results = registry.run_all(&profile(), &sample_window());
        // All units except the failing one produced results.
        assert_eq!(results.len(), 7);
        assert!(!results.iter().any(|r| r.algorithm_name == "failing_unit"));
    }

    #[test]
    fn test_full_pass_declaration_order() {
        let engine = AnalysisEngine::with_defaults().unwrap();
        let results = engine.run_full(&profile(), &sample_window());
        assert_eq!(results.len(), 13);
        assert_eq!(results[0].algorithm_name, names::FRUSTRATION);
        assert_eq!(results[7].algorithm_name, names::IMPROVEMENT_POTENTIAL);
    }

    #[test]
    fn test_realtime_pass_runs_subset_only() {
        let engine = AnalysisEngine::with_defaults().unwrap();
        let results = engine.run_realtime(&profile(), &sample_window());
        assert_eq!(results.len(), 7);
        let names_run: Vec<&str> = results.iter().map(|r| r.algorithm_name.as_str()).collect();
        assert!(names_run.contains(&names::FRUSTRATION));
        assert!(names_run.contains(&names::IMPROVEMENT_POTENTIAL));
        assert!(!names_run.contains(&names::STRESS_RESPONSE));
        assert!(!names_run.contains(&names::NEURAL_ADAPTATION));
    }

    #[test]
    fn test_integrate_bounds_and_renormalization() {
        let engine = AnalysisEngine::with_defaults().unwrap();
        let results = engine.run_full(&profile(), &sample_window());
        let analysis = engine.integrate(&results);
        assert!((0.0..=1.0).contains(&analysis.overall_score));
        assert!((0.0..=1.0).contains(&analysis.confidence_score));
        assert!((0.0..=1.0).contains(&analysis.risk_score));
        assert!((0.0..=1.0).contains(&analysis.opportunity_score));

        // Dropping half the results must still integrate within bounds.
        let partial = &results[..4];
        let analysis = engine.integrate(partial);
        assert!((0.0..=1.0).contains(&analysis.overall_score));
    }

    #[test]
    fn test_integrate_empty_results_flags_total_failure() {
        let engine = AnalysisEngine::with_defaults().unwrap();
        let analysis = engine.integrate(&[]);
        assert_eq!(analysis.overall_score, 0.0);
        assert_eq!(analysis.confidence_score, 0.0);
        assert_eq!(analysis.insights.len(), 1);
        assert_eq!(analysis.insights[0].kind, InsightKind::Degraded);
    }

    #[test]
    fn test_risk_monotone_in_frustration() {
        let engine = AnalysisEngine::with_defaults().unwrap();
        let make = |frustration: f64| {
            vec![
                AlgorithmResult::new(names::FRUSTRATION, frustration, 0.9),
                AlgorithmResult::new(names::ANXIETY, 0.4, 0.9),
                AlgorithmResult::new(names::COGNITIVE_OVERLOAD, 0.3, 0.9),
            ]
        };
        let low = engine.integrate(&make(0.5)).risk_score;
        let high = engine.integrate(&make(0.9)).risk_score;
        assert!(high > low);
    }

    #[test]
    fn test_opportunity_renormalizes_over_present() {
        let engine = AnalysisEngine::with_defaults().unwrap();
        // Only engagement present among opportunity contributors.
        let results = vec![AlgorithmResult::new(names::ENGAGEMENT, 0.8, 0.9)];
        let analysis = engine.integrate(&results);
        assert!((analysis.opportunity_score - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_insight_order_follows_declaration_order() {
        let engine = AnalysisEngine::with_defaults().unwrap();
        let results = vec![
            AlgorithmResult::new(names::FRUSTRATION, 0.9, 0.9).with_insight(Insight::new(
                InsightKind::Warning,
                "first",
                0.9,
            )),
            AlgorithmResult::new(names::ENGAGEMENT, 0.9, 0.9).with_insight(Insight::new(
                InsightKind::Opportunity,
                "second",
                0.9,
            )),
        ];
        let analysis = engine.integrate(&results);
        assert_eq!(analysis.insights[0].message, "first");
        assert_eq!(analysis.insights[1].message, "second");
    }

    #[tokio::test]
    async fn test_parallel_full_pass_matches_serial() {
        let engine = Arc::new(AnalysisEngine::with_defaults().unwrap());
        let window = sample_window();
        let serial = engine.run_full(&profile(), &window);
        let parallel = Arc::clone(&engine)
            .run_full_parallel(&profile(), &window)
            .await;

        assert_eq!(serial.len(), parallel.len());
        for (s, p) in serial.iter().zip(parallel.iter()) {
            assert_eq!(s.algorithm_name, p.algorithm_name);
            assert!((s.score - p.score).abs() < 1e-9);
        }
    }
}
