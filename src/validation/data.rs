use crate::core::BeaconObservation;
use crate::validation::error::ObservationError;
use tracing::warn;

/// Plausibility limits for incoming observations
#[derive(Debug, Clone)]
pub struct ValidationConfig {
    /// Weakest RSSI considered physically plausible (dBm)
    pub rssi_floor_dbm: f64,
    /// Strongest RSSI considered physically plausible (dBm)
    pub rssi_ceiling_dbm: f64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            rssi_floor_dbm: -120.0,
            rssi_ceiling_dbm: 0.0,
        }
    }
}

/// Checks observations before they reach the registry.
///
/// Malformed input (empty id, NaN/infinite values) is rejected. Readings
/// outside the plausible RSSI window are accepted but reported, since the
/// path-loss model deliberately passes implausible values through.
#[derive(Debug, Clone, Default)]
pub struct DataValidator {
    config: ValidationConfig,
}

impl DataValidator {
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    /// Returns warnings for a well-formed observation, or the reason it is malformed
    pub fn validate(&self, observation: &BeaconObservation) -> Result<Vec<String>, ObservationError> {
        if observation.id.trim().is_empty() {
            return Err(ObservationError::EmptyId);
        }
        if !observation.rssi.is_finite() {
            return Err(ObservationError::NonFiniteRssi {
                id: observation.id.clone(),
                rssi: observation.rssi,
            });
        }
        if !observation.coordinate.is_finite() {
            return Err(ObservationError::NonFiniteCoordinate {
                id: observation.id.clone(),
                x: observation.coordinate.x,
                y: observation.coordinate.y,
            });
        }

        let mut warnings = Vec::new();
        if observation.rssi > self.config.rssi_ceiling_dbm {
            warnings.push(format!(
                "beacon {}: RSSI {} dBm above plausible ceiling {} dBm",
                observation.id, observation.rssi, self.config.rssi_ceiling_dbm
            ));
        } else if observation.rssi < self.config.rssi_floor_dbm {
            warnings.push(format!(
                "beacon {}: RSSI {} dBm below plausible floor {} dBm",
                observation.id, observation.rssi, self.config.rssi_floor_dbm
            ));
        }

        for warning in &warnings {
            warn!("{}", warning);
        }
        Ok(warnings)
    }
}
