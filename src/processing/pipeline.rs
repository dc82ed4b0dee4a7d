//! One estimation cycle: registry -> path-loss model -> solver

use crate::algorithms::multilateration::{MultilaterationSolver, RangeMeasurement};
use crate::algorithms::signal_model::PathLossModel;
use crate::core::{CalibrationParams, DistanceEstimate, PositionEstimate, ACTIVE_SET_SIZE};
use crate::processing::registry::{BeaconRegistry, SelectionPolicy};
use crate::validation::error::{PositioningError, PositioningResult, UnavailableReason};
use serde::Serialize;
use tracing::debug;

/// Result handed to the presentation layer after every cycle
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "status")]
pub enum PositionOutcome {
    Available(PositionEstimate),
    Unavailable { reason: UnavailableReason },
}

impl PositionOutcome {
    pub fn position(&self) -> Option<PositionEstimate> {
        match self {
            PositionOutcome::Available(position) => Some(*position),
            PositionOutcome::Unavailable { .. } => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, PositionOutcome::Available(_))
    }
}

/// Outcome plus the intermediate values that produced it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EstimationReport {
    pub outcome: PositionOutcome,
    /// Ids of the beacons used, in the order passed to the solver
    pub active_set: Vec<String>,
    pub path_loss_exponent: Option<f64>,
    pub distances: Vec<DistanceEstimate>,
    pub residual_rms: Option<f64>,
}

impl EstimationReport {
    fn unavailable(error: &PositioningError) -> Self {
        Self {
            outcome: PositionOutcome::Unavailable { reason: error.reason() },
            active_set: Vec::new(),
            path_loss_exponent: None,
            distances: Vec::new(),
            residual_rms: None,
        }
    }
}

/// Configurable estimation pipeline
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EstimationPipeline {
    pub model: PathLossModel,
    pub solver: MultilaterationSolver,
    pub active_set_size: usize,
    pub selection_policy: SelectionPolicy,
}

impl Default for EstimationPipeline {
    fn default() -> Self {
        Self::new(CalibrationParams::default())
    }
}

impl EstimationPipeline {
    pub fn new(calibration: CalibrationParams) -> Self {
        Self {
            model: PathLossModel::new(calibration),
            solver: MultilaterationSolver::default(),
            active_set_size: ACTIVE_SET_SIZE,
            selection_policy: SelectionPolicy::default(),
        }
    }

    /// Upper bound on beacons per fix; values below three are raised to three.
    /// When fewer beacons are known (but at least three), all of them are used.
    pub fn with_active_set_size(mut self, size: usize) -> Self {
        self.active_set_size = size.max(ACTIVE_SET_SIZE);
        self
    }

    pub fn with_selection_policy(mut self, policy: SelectionPolicy) -> Self {
        self.selection_policy = policy;
        self
    }

    pub fn with_min_distance(mut self, min_distance: f64) -> Self {
        self.model = self.model.with_min_distance(min_distance);
        self
    }

    pub fn with_solver(mut self, solver: MultilaterationSolver) -> Self {
        self.solver = solver;
        self
    }

    /// Run one cycle. Never fails: errors become `PositionOutcome::Unavailable`.
    pub fn run(&self, registry: &BeaconRegistry) -> EstimationReport {
        match self.try_run(registry) {
            Ok(report) => report,
            Err(error) => {
                debug!(%error, "position unavailable");
                EstimationReport::unavailable(&error)
            }
        }
    }

    pub fn estimate(&self, registry: &BeaconRegistry) -> PositionOutcome {
        self.run(registry).outcome
    }

    fn try_run(&self, registry: &BeaconRegistry) -> PositioningResult<EstimationReport> {
        let size = self.active_set_size.min(registry.len()).max(ACTIVE_SET_SIZE);
        let active = registry.select_with_policy(size, self.selection_policy)?;
        let active_set: Vec<String> = active.iter().map(|o| o.id.clone()).collect();
        debug!(beacons = ?active_set, "selected active set");

        let (exponent, distances) = self.model.distances(&active)?;
        debug!(exponent, "path-loss exponent");

        let measurements: Vec<RangeMeasurement> = active
            .iter()
            .zip(&distances)
            .map(|(obs, estimate)| RangeMeasurement::new(obs.coordinate, estimate.distance))
            .collect();

        let fix = self.solver.solve(&measurements)?;
        debug!(x = fix.position.x, y = fix.position.y, residual = fix.residual_rms, "position available");

        Ok(EstimationReport {
            outcome: PositionOutcome::Available(fix.position),
            active_set,
            path_loss_exponent: Some(exponent),
            distances,
            residual_rms: Some(fix.residual_rms),
        })
    }
}

/// Three-beacon estimate with default solver settings
pub fn estimate(registry: &BeaconRegistry, calib: &CalibrationParams) -> PositionOutcome {
    EstimationPipeline::new(*calib).estimate(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::BeaconObservation;
    use approx::assert_relative_eq;

    fn reference_registry() -> BeaconRegistry {
        let mut registry = BeaconRegistry::new();
        registry.upsert(BeaconObservation::new("b1", -50.0, (5.0, 4.2))).unwrap();
        registry.upsert(BeaconObservation::new("b2", -55.0, (3.6, 3.4))).unwrap();
        registry.upsert(BeaconObservation::new("b3", -60.0, (2.3, 1.5))).unwrap();
        registry
    }

    #[test]
    fn test_reference_scenario() {
        let outcome = estimate(&reference_registry(), &CalibrationParams::default());
        let position = outcome.position().expect("position available");
        assert_relative_eq!(position.x, 6.429_774_968_465_517, epsilon = 1e-6);
        assert_relative_eq!(position.y, 0.068_893_694_262_159_8, epsilon = 1e-6);
    }

    #[test]
    fn test_report_carries_intermediates() {
        let report = EstimationPipeline::default().run(&reference_registry());
        assert!(report.outcome.is_available());
        assert_eq!(report.active_set, vec!["b1", "b2", "b3"]);
        assert_relative_eq!(report.path_loss_exponent.unwrap(), 1.1, epsilon = 1e-12);
        assert_eq!(report.distances.len(), 3);
        assert!(report.residual_rms.unwrap().is_finite());
    }

    #[test]
    fn test_not_enough_beacons() {
        let mut registry = BeaconRegistry::new();
        registry.upsert(BeaconObservation::new("b1", -50.0, (5.0, 4.2))).unwrap();
        registry.upsert(BeaconObservation::new("b2", -55.0, (3.6, 3.4))).unwrap();

        let outcome = estimate(&registry, &CalibrationParams::default());
        assert_eq!(outcome, PositionOutcome::Unavailable { reason: UnavailableReason::NotEnoughBeacons });
        assert_eq!(outcome.position(), None);
    }

    #[test]
    fn test_degenerate_model() {
        let mut registry = BeaconRegistry::new();
        registry.upsert(BeaconObservation::new("b1", -44.0, (5.0, 4.2))).unwrap();
        registry.upsert(BeaconObservation::new("b2", -44.0, (3.6, 3.4))).unwrap();
        registry.upsert(BeaconObservation::new("b3", -44.0, (2.3, 1.5))).unwrap();

        let outcome = estimate(&registry, &CalibrationParams::default());
        assert_eq!(outcome, PositionOutcome::Unavailable { reason: UnavailableReason::DegenerateModel });
    }

    #[test]
    fn test_singular_geometry() {
        let mut registry = BeaconRegistry::new();
        registry.upsert(BeaconObservation::new("b1", -50.0, (0.0, 0.0))).unwrap();
        registry.upsert(BeaconObservation::new("b2", -55.0, (1.0, 0.0))).unwrap();
        registry.upsert(BeaconObservation::new("b3", -60.0, (2.0, 0.0))).unwrap();

        let report = EstimationPipeline::default().run(&registry);
        assert_eq!(
            report.outcome,
            PositionOutcome::Unavailable { reason: UnavailableReason::SingularGeometry }
        );
        assert!(report.distances.is_empty());
    }

    #[test]
    fn test_only_first_three_beacons_are_used() {
        let mut registry = reference_registry();
        registry.upsert(BeaconObservation::new("b4", -40.0, (9.0, 9.0))).unwrap();

        let report = EstimationPipeline::default().run(&registry);
        assert_eq!(report.active_set, vec!["b1", "b2", "b3"]);
        let position = report.outcome.position().unwrap();
        assert_relative_eq!(position.x, 6.429_774_968_465_517, epsilon = 1e-6);
    }

    #[test]
    fn test_extended_active_set() {
        let mut registry = reference_registry();
        registry.upsert(BeaconObservation::new("b4", -52.0, (0.0, 5.0))).unwrap();

        let pipeline = EstimationPipeline::default().with_active_set_size(4);
        let report = pipeline.run(&registry);
        assert_eq!(report.active_set.len(), 4);
        assert!(report.outcome.is_available());

        assert_eq!(EstimationPipeline::default().with_active_set_size(1).active_set_size, 3);
    }

    #[test]
    fn test_extended_active_set_falls_back_to_known_beacons() {
        let pipeline = EstimationPipeline::default().with_active_set_size(5);
        let report = pipeline.run(&reference_registry());
        assert_eq!(report.active_set, vec!["b1", "b2", "b3"]);
        let position = report.outcome.position().unwrap();
        assert_relative_eq!(position.x, 6.429_774_968_465_517, epsilon = 1e-6);

        let mut registry = BeaconRegistry::new();
        registry.upsert(BeaconObservation::new("b1", -50.0, (5.0, 4.2))).unwrap();
        registry.upsert(BeaconObservation::new("b2", -55.0, (3.6, 3.4))).unwrap();
        assert_eq!(
            pipeline.estimate(&registry),
            PositionOutcome::Unavailable { reason: UnavailableReason::NotEnoughBeacons }
        );
    }

    #[test]
    fn test_invalid_solver_epsilon_still_rejects_collinear() {
        let mut registry = BeaconRegistry::new();
        registry.upsert(BeaconObservation::new("b1", -50.0, (0.0, 0.0))).unwrap();
        registry.upsert(BeaconObservation::new("b2", -55.0, (1.0, 1e-9))).unwrap();
        registry.upsert(BeaconObservation::new("b3", -60.0, (2.0, 0.0))).unwrap();

        for epsilon in [f64::NAN, -1.0] {
            let pipeline = EstimationPipeline::default()
                .with_solver(MultilaterationSolver::new().with_singularity_epsilon(epsilon));
            assert_eq!(
                pipeline.estimate(&registry),
                PositionOutcome::Unavailable { reason: UnavailableReason::SingularGeometry }
            );
        }
    }

    #[test]
    fn test_outcome_serializes_tagged() {
        let outcome = PositionOutcome::Unavailable { reason: UnavailableReason::SingularGeometry };
        let json = serde_json::to_value(outcome).unwrap();
        assert_eq!(json["status"], "Unavailable");
        assert_eq!(json["reason"], "SingularGeometry");

        let json = serde_json::to_value(PositionOutcome::Available(PositionEstimate::new(1.0, 2.0))).unwrap();
        assert_eq!(json["status"], "Available");
        assert_eq!(json["x"], 1.0);
    }
}
