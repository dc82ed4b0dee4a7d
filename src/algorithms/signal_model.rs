//! Log-distance path-loss model
//!
//! RSSI is converted to distance with a single exponent shared by every
//! beacon in a batch. The exponent is the mean of the per-sample estimates
//! `n_i = (rssi_0 - rssi_i) / 10`, which is less sensitive to one noisy
//! reading than solving an exponent per beacon.

use crate::core::{BeaconObservation, CalibrationParams, DistanceEstimate, DEFAULT_MIN_DISTANCE, MODEL_EPSILON};
use crate::validation::error::{PositioningError, PositioningResult};
use tracing::trace;

/// Mean path-loss exponent over a batch of simultaneous RSSI samples
pub fn estimate_path_loss_exponent(samples: &[f64], calib: &CalibrationParams) -> PositioningResult<f64> {
    if samples.is_empty() {
        return Err(PositioningError::DegenerateModel {
            detail: "no RSSI samples to estimate the path-loss exponent from".to_string(),
        });
    }

    let sum: f64 = samples
        .iter()
        .map(|rssi| (calib.reference_rssi - rssi) / 10.0)
        .sum();
    let exponent = sum / samples.len() as f64;

    if !exponent.is_finite() || exponent.abs() < MODEL_EPSILON {
        return Err(PositioningError::DegenerateModel {
            detail: format!("mean path-loss exponent {} is zero or undefined", exponent),
        });
    }

    trace!(exponent, samples = samples.len(), "estimated path-loss exponent");
    Ok(exponent)
}

/// `d = d_0 * 10^((rssi - rssi_0) / (10 n))`
pub fn estimate_distance(rssi: f64, calib: &CalibrationParams, exponent: f64) -> PositioningResult<f64> {
    if !exponent.is_finite() || exponent.abs() < MODEL_EPSILON {
        return Err(PositioningError::DegenerateModel {
            detail: format!("path-loss exponent {} is zero or undefined", exponent),
        });
    }

    let distance = calib.reference_distance * 10f64.powf((rssi - calib.reference_rssi) / (10.0 * exponent));
    if !distance.is_finite() {
        return Err(PositioningError::DegenerateModel {
            detail: format!("RSSI {} dBm yields a non-finite distance", rssi),
        });
    }
    Ok(distance)
}

/// Calibration plus the distance floor, applied to whole observation batches
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathLossModel {
    pub calibration: CalibrationParams,
    /// Distances below this are raised to it
    pub min_distance: f64,
}

impl Default for PathLossModel {
    fn default() -> Self {
        Self::new(CalibrationParams::default())
    }
}

impl PathLossModel {
    pub fn new(calibration: CalibrationParams) -> Self {
        Self {
            calibration,
            min_distance: DEFAULT_MIN_DISTANCE,
        }
    }

    pub fn with_min_distance(mut self, min_distance: f64) -> Self {
        self.min_distance = min_distance;
        self
    }

    pub fn exponent_for(&self, observations: &[BeaconObservation]) -> PositioningResult<f64> {
        let samples: Vec<f64> = observations.iter().map(|o| o.rssi).collect();
        estimate_path_loss_exponent(&samples, &self.calibration)
    }

    /// Distances for a batch, sharing one exponent. Returns the exponent too.
    pub fn distances(&self, observations: &[BeaconObservation]) -> PositioningResult<(f64, Vec<DistanceEstimate>)> {
        let exponent = self.exponent_for(observations)?;

        let distances = observations
            .iter()
            .map(|obs| {
                let distance = estimate_distance(obs.rssi, &self.calibration, exponent)?;
                Ok(DistanceEstimate {
                    beacon_id: obs.id.clone(),
                    distance: distance.max(self.min_distance),
                })
            })
            .collect::<PositioningResult<Vec<_>>>()?;

        Ok((exponent, distances))
    }
}
