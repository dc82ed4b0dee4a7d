use nalgebra::{DMatrix, DVector, Matrix2, Vector2};
use crate::core::{Coordinate, PositionEstimate, ACTIVE_SET_SIZE, SINGULARITY_EPSILON};
use crate::validation::error::{PositioningError, PositioningResult};
use tracing::trace;

/// Known beacon position paired with its estimated distance
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeMeasurement {
    pub coordinate: Coordinate,
    pub distance: f64,
}

impl RangeMeasurement {
    pub fn new(coordinate: impl Into<Coordinate>, distance: f64) -> Self {
        Self {
            coordinate: coordinate.into(),
            distance,
        }
    }
}

/// Solver output with fit diagnostics
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Multilateration {
    pub position: PositionEstimate,
    /// RMS of `|p - c_i| - d_i` over all measurements
    pub residual_rms: f64,
    /// det(AᵀA) / trace(AᵀA)², 1/4 for perfectly conditioned geometry
    pub normalized_determinant: f64,
}

/// Linearized least-squares multilateration in the plane
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MultilaterationSolver {
    /// Geometry whose normalized determinant is at or below this is rejected
    pub singularity_epsilon: f64,
}

impl Default for MultilaterationSolver {
    fn default() -> Self {
        Self {
            singularity_epsilon: SINGULARITY_EPSILON,
        }
    }
}

impl MultilaterationSolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Values outside `(0, 0.25)` fall back to `SINGULARITY_EPSILON`
    pub fn with_singularity_epsilon(mut self, epsilon: f64) -> Self {
        self.singularity_epsilon = sanitize_epsilon(epsilon);
        self
    }

    /// Solve for the receiver position.
    ///
    /// The last measurement is the reference. Subtracting its circle
    /// equation from every other one gives, per row i,
    /// `2(x_i - x_r) x + 2(y_i - y_r) y = x_i² - x_r² + y_i² - y_r² + d_r² - d_i²`,
    /// solved through the normal equations `(AᵀA)⁻¹ Aᵀ b`. With three
    /// beacons A is square and this is the exact 2×2 solution.
    pub fn solve(&self, measurements: &[RangeMeasurement]) -> PositioningResult<Multilateration> {
        if measurements.len() < ACTIVE_SET_SIZE {
            return Err(PositioningError::NotEnoughBeacons {
                available: measurements.len(),
                required: ACTIVE_SET_SIZE,
            });
        }

        if let Some(bad) = measurements
            .iter()
            .find(|m| !m.coordinate.is_finite() || !m.distance.is_finite())
        {
            return Err(PositioningError::DegenerateModel {
                detail: format!(
                    "non-finite range measurement: coordinate ({}, {}), distance {}",
                    bad.coordinate.x, bad.coordinate.y, bad.distance
                ),
            });
        }

        let (others, reference) = measurements.split_at(measurements.len() - 1);
        let r = reference[0];
        let rows = others.len();

        let mut a_matrix = DMatrix::<f64>::zeros(rows, 2);
        let mut b_vector = DVector::<f64>::zeros(rows);

        for (row, m) in others.iter().enumerate() {
            let c = m.coordinate;
            a_matrix[(row, 0)] = 2.0 * (c.x - r.coordinate.x);
            a_matrix[(row, 1)] = 2.0 * (c.y - r.coordinate.y);
            b_vector[row] = c.x.powi(2) - r.coordinate.x.powi(2)
                + c.y.powi(2) - r.coordinate.y.powi(2)
                + r.distance.powi(2) - m.distance.powi(2);
        }

        let at = a_matrix.transpose();
        let ata_dyn = &at * &a_matrix;
        let atb_dyn = &at * &b_vector;
        let ata = Matrix2::new(ata_dyn[(0, 0)], ata_dyn[(0, 1)], ata_dyn[(1, 0)], ata_dyn[(1, 1)]);
        let atb = Vector2::new(atb_dyn[0], atb_dyn[1]);

        let trace = ata.trace();
        let determinant = ata.determinant();
        let normalized_determinant = if trace > 0.0 { determinant / (trace * trace) } else { 0.0 };

        trace!(determinant, normalized_determinant, "normal matrix conditioning");

        // the field is public, so re-check what the builder already guarantees
        let epsilon = sanitize_epsilon(self.singularity_epsilon);
        if !normalized_determinant.is_finite() || normalized_determinant <= epsilon {
            return Err(PositioningError::SingularGeometry { normalized_determinant });
        }

        let inverse = ata
            .try_inverse()
            .ok_or(PositioningError::SingularGeometry { normalized_determinant })?;
        let solution = inverse * atb;

        if !solution.x.is_finite() || !solution.y.is_finite() {
            return Err(PositioningError::SingularGeometry { normalized_determinant });
        }

        let position = PositionEstimate::new(solution.x, solution.y);
        let residual_rms = residual_rms(&position, measurements);

        Ok(Multilateration {
            position,
            residual_rms,
            normalized_determinant,
        })
    }
}

/// det/trace² of a 2×2 PSD matrix never exceeds 1/4
fn sanitize_epsilon(epsilon: f64) -> f64 {
    if epsilon.is_finite() && epsilon > 0.0 && epsilon < 0.25 {
        epsilon
    } else {
        SINGULARITY_EPSILON
    }
}

fn residual_rms(position: &PositionEstimate, measurements: &[RangeMeasurement]) -> f64 {
    let p = position.as_coordinate();
    let sum_sq: f64 = measurements
        .iter()
        .map(|m| (p.distance_to(&m.coordinate) - m.distance).powi(2))
        .sum();
    (sum_sq / measurements.len() as f64).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn exact_ranges(beacons: &[(f64, f64)], truth: Coordinate) -> Vec<RangeMeasurement> {
        beacons
            .iter()
            .map(|&(x, y)| {
                let c = Coordinate::new(x, y);
                RangeMeasurement::new(c, c.distance_to(&truth))
            })
            .collect()
    }

    #[test]
    fn test_round_trip_three_beacons() {
        let truth = Coordinate::new(3.0, 2.5);
        let ranges = exact_ranges(&[(5.0, 4.2), (3.6, 3.4), (2.3, 1.5)], truth);

        let fix = MultilaterationSolver::new().solve(&ranges).unwrap();
        assert_relative_eq!(fix.position.x, 3.0, epsilon = 1e-9);
        assert_relative_eq!(fix.position.y, 2.5, epsilon = 1e-9);
        assert!(fix.residual_rms < 1e-9);
    }

    #[test]
    fn test_reference_scenario_distances() {
        let ranges = vec![
            RangeMeasurement::new((5.0, 4.2), 0.085_441_076_053_074_06),
            RangeMeasurement::new((3.6, 3.4), 0.03),
            RangeMeasurement::new((2.3, 1.5), 0.010_533_575_202_645_392),
        ];
        let fix = MultilaterationSolver::new().solve(&ranges).unwrap();
        assert_relative_eq!(fix.position.x, 6.429_774_968_465_517, epsilon = 1e-6);
        assert_relative_eq!(fix.position.y, 0.068_893_694_262_159_8, epsilon = 1e-6);
    }

    #[test]
    fn test_overdetermined_least_squares() {
        let truth = Coordinate::new(-1.5, 4.0);
        let ranges = exact_ranges(&[(0.0, 0.0), (10.0, 0.0), (0.0, 10.0), (10.0, 10.0), (5.0, -3.0)], truth);

        let fix = MultilaterationSolver::new().solve(&ranges).unwrap();
        assert_relative_eq!(fix.position.x, -1.5, epsilon = 1e-9);
        assert_relative_eq!(fix.position.y, 4.0, epsilon = 1e-9);
    }

    #[test]
    fn test_collinear_is_singular() {
        let ranges = vec![
            RangeMeasurement::new((0.0, 0.0), 1.0),
            RangeMeasurement::new((1.0, 0.0), 1.0),
            RangeMeasurement::new((2.0, 0.0), 1.0),
        ];
        let err = MultilaterationSolver::new().solve(&ranges).unwrap_err();
        assert!(matches!(err, PositioningError::SingularGeometry { .. }));
    }

    #[test]
    fn test_nearly_collinear_is_singular() {
        let ranges = vec![
            RangeMeasurement::new((0.0, 0.0), 1.0),
            RangeMeasurement::new((1.0, 1e-9), 1.0),
            RangeMeasurement::new((2.0, 0.0), 1.0),
        ];
        let err = MultilaterationSolver::new().solve(&ranges).unwrap_err();
        assert!(matches!(err, PositioningError::SingularGeometry { .. }));
    }

    #[test]
    fn test_invalid_epsilon_keeps_collinearity_guard() {
        let ranges = vec![
            RangeMeasurement::new((0.0, 0.0), 1.0),
            RangeMeasurement::new((1.0, 1e-9), 1.0),
            RangeMeasurement::new((2.0, 0.0), 1.0),
        ];
        for epsilon in [f64::NAN, -1.0, 0.0, f64::INFINITY, 0.5] {
            let solver = MultilaterationSolver::new().with_singularity_epsilon(epsilon);
            assert_eq!(solver.singularity_epsilon, SINGULARITY_EPSILON);
            let err = solver.solve(&ranges).unwrap_err();
            assert!(matches!(err, PositioningError::SingularGeometry { .. }));
        }

        // field set directly, bypassing the builder
        let solver = MultilaterationSolver { singularity_epsilon: f64::NAN };
        assert!(matches!(solver.solve(&ranges), Err(PositioningError::SingularGeometry { .. })));

        let solver = MultilaterationSolver::new().with_singularity_epsilon(1e-6);
        assert_eq!(solver.singularity_epsilon, 1e-6);
    }

    #[test]
    fn test_non_finite_inputs_are_degenerate_model() {
        let ranges = vec![
            RangeMeasurement::new((0.0, 0.0), f64::NAN),
            RangeMeasurement::new((5.0, 0.0), 1.0),
            RangeMeasurement::new((0.0, 5.0), 1.0),
        ];
        let err = MultilaterationSolver::new().solve(&ranges).unwrap_err();
        assert!(matches!(err, PositioningError::DegenerateModel { .. }));

        let ranges = vec![
            RangeMeasurement::new((0.0, 0.0), 1.0),
            RangeMeasurement::new((f64::INFINITY, 0.0), 1.0),
            RangeMeasurement::new((0.0, 5.0), 1.0),
        ];
        let err = MultilaterationSolver::new().solve(&ranges).unwrap_err();
        assert!(matches!(err, PositioningError::DegenerateModel { .. }));
    }

    #[test]
    fn test_coincident_beacons_are_singular() {
        let ranges = vec![RangeMeasurement::new((1.0, 1.0), 2.0); 3];
        let err = MultilaterationSolver::new().solve(&ranges).unwrap_err();
        assert!(matches!(err, PositioningError::SingularGeometry { .. }));
    }

    #[test]
    fn test_too_few_measurements() {
        let ranges = vec![
            RangeMeasurement::new((0.0, 0.0), 1.0),
            RangeMeasurement::new((1.0, 0.0), 1.0),
        ];
        let err = MultilaterationSolver::new().solve(&ranges).unwrap_err();
        assert_eq!(err, PositioningError::NotEnoughBeacons { available: 2, required: 3 });
    }

    #[test]
    fn test_translation_invariance() {
        let beacons = [(0.0, 0.0), (8.0, 1.0), (3.0, 7.0)];
        let ranges = vec![
            RangeMeasurement::new(beacons[0], 4.0),
            RangeMeasurement::new(beacons[1], 5.0),
            RangeMeasurement::new(beacons[2], 3.5),
        ];
        let shifted: Vec<_> = ranges
            .iter()
            .map(|m| RangeMeasurement::new((m.coordinate.x + 100.0, m.coordinate.y - 40.0), m.distance))
            .collect();

        let solver = MultilaterationSolver::new();
        let a = solver.solve(&ranges).unwrap().position;
        let b = solver.solve(&shifted).unwrap().position;
        assert_relative_eq!(b.x - 100.0, a.x, epsilon = 1e-8);
        assert_relative_eq!(b.y + 40.0, a.y, epsilon = 1e-8);
    }
}
