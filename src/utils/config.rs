use crate::algorithms::multilateration::MultilaterationSolver;
use crate::core::{
    BeaconObservation, CalibrationParams, Coordinate, ACTIVE_SET_SIZE, DEFAULT_MIN_DISTANCE, SINGULARITY_EPSILON,
};
use crate::processing::pipeline::EstimationPipeline;
use crate::processing::registry::SelectionPolicy;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

/// System-wide estimation parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    /// Path-loss calibration shared by every beacon
    pub calibration: CalibrationParams,
    /// Maximum beacons per fix (3 for plain trilateration); fixes use every
    /// known beacon when fewer than this but at least 3 are available
    pub active_set_size: usize,
    /// How the active set is picked from known beacons
    pub selection_policy: SelectionPolicy,
    /// Floor applied to every distance estimate
    pub min_distance: f64,
    /// Relative determinant threshold for rejecting near-collinear geometry
    pub singularity_epsilon: f64,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            calibration: CalibrationParams::default(),
            active_set_size: ACTIVE_SET_SIZE,
            selection_policy: SelectionPolicy::DiscoveryOrder,
            min_distance: DEFAULT_MIN_DISTANCE,
            singularity_epsilon: SINGULARITY_EPSILON,
        }
    }
}

impl SystemConfig {
    pub fn pipeline(&self) -> EstimationPipeline {
        EstimationPipeline::new(self.calibration)
            .with_active_set_size(self.active_set_size)
            .with_selection_policy(self.selection_policy)
            .with_min_distance(self.min_distance)
            .with_solver(MultilaterationSolver::new().with_singularity_epsilon(self.singularity_epsilon))
    }
}

/// Fixed position of one deployed beacon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeaconConfig {
    pub id: String,
    pub x: f64,
    pub y: f64,
}

impl BeaconConfig {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.x, self.y)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigFileData {
    #[serde(default)]
    system: SystemConfig,
    beacons: Vec<BeaconConfig>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid parameter '{parameter}' = '{value}': {reason}")]
    InvalidParameter {
        parameter: String,
        value: String,
        reason: String,
    },

    #[error("duplicate beacon id '{id}'")]
    DuplicateBeacon { id: String },

    #[error("failed to access config file '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("no file path set for saving configuration")]
    NoFilePath,
}

/// Configuration validation result
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigError>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn into_first_error(self) -> Result<Vec<String>, ConfigError> {
        match self.errors.into_iter().next() {
            Some(error) => Err(error),
            None => Ok(self.warnings),
        }
    }
}

/// Owns the deployment: estimation parameters and beacon coordinates
#[derive(Debug, Default)]
pub struct ConfigurationManager {
    system_config: SystemConfig,
    beacons: Vec<BeaconConfig>,
    beacon_index: HashMap<String, usize>,
    config_file_path: Option<PathBuf>,
    is_modified: bool,
}

impl ConfigurationManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut manager = Self::new();
        manager.load_from_file(path)?;
        Ok(manager)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let data: ConfigFileData = serde_json::from_str(json)?;
        let mut manager = Self::new();
        manager.apply(data)?;
        Ok(manager)
    }

    pub fn get_system_config(&self) -> &SystemConfig {
        &self.system_config
    }

    /// Replace the system configuration. Returns the validation warnings.
    pub fn update_system_config(&mut self, config: SystemConfig) -> Result<Vec<String>, ConfigError> {
        let warnings = Self::validate_system_config(&config).into_first_error()?;
        for warning in &warnings {
            warn!("{}", warning);
        }
        self.system_config = config;
        self.is_modified = true;
        Ok(warnings)
    }

    pub fn beacons(&self) -> &[BeaconConfig] {
        &self.beacons
    }

    pub fn beacon_coordinate(&self, id: &str) -> Option<Coordinate> {
        self.beacon_index.get(id).map(|&i| self.beacons[i].coordinate())
    }

    /// Add a beacon or move an existing one
    pub fn set_beacon(&mut self, beacon: BeaconConfig) -> Result<(), ConfigError> {
        Self::validate_beacon_config(&beacon)?;
        match self.beacon_index.get(&beacon.id) {
            Some(&i) => self.beacons[i] = beacon,
            None => {
                self.beacon_index.insert(beacon.id.clone(), self.beacons.len());
                self.beacons.push(beacon);
            }
        }
        self.is_modified = true;
        Ok(())
    }

    pub fn remove_beacon(&mut self, id: &str) -> Option<BeaconConfig> {
        let slot = self.beacon_index.remove(id)?;
        let removed = self.beacons.remove(slot);
        self.reindex();
        self.is_modified = true;
        Some(removed)
    }

    /// Attach the configured coordinate to a raw `(id, rssi)` reading.
    /// Unknown beacons yield `None`.
    pub fn observation(&self, id: &str, rssi: f64) -> Option<BeaconObservation> {
        self.beacon_coordinate(id)
            .map(|coordinate| BeaconObservation::new(id, rssi, coordinate))
    }

    pub fn pipeline(&self) -> EstimationPipeline {
        self.system_config.pipeline()
    }

    pub fn load_from_file<P: AsRef<Path>>(&mut self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref().to_path_buf();
        let content = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;

        let data: ConfigFileData = serde_json::from_str(&content)?;
        self.apply(data)?;

        info!(path = %path.display(), beacons = self.beacons.len(), "loaded deployment configuration");
        self.config_file_path = Some(path);
        self.is_modified = false;
        Ok(())
    }

    pub fn save_to_file<P: AsRef<Path>>(&mut self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref().to_path_buf();
        let data = ConfigFileData {
            system: self.system_config.clone(),
            beacons: self.beacons.clone(),
        };
        let content = serde_json::to_string_pretty(&data)?;
        fs::write(&path, content).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;

        self.config_file_path = Some(path);
        self.is_modified = false;
        Ok(())
    }

    pub fn save(&mut self) -> Result<(), ConfigError> {
        match self.config_file_path.clone() {
            Some(path) => self.save_to_file(path),
            None => Err(ConfigError::NoFilePath),
        }
    }

    pub fn is_modified(&self) -> bool {
        self.is_modified
    }

    pub fn validate_system_config(config: &SystemConfig) -> ValidationResult {
        let mut result = ValidationResult::default();
        let calib = &config.calibration;

        if !calib.reference_rssi.is_finite() {
            result.errors.push(invalid("calibration.reference_rssi", calib.reference_rssi, "must be finite"));
        } else if calib.reference_rssi > 0.0 {
            result
                .warnings
                .push(format!("reference RSSI {} dBm is positive; RSSI is normally negative", calib.reference_rssi));
        }

        if !(calib.reference_distance.is_finite() && calib.reference_distance > 0.0) {
            result.errors.push(invalid(
                "calibration.reference_distance",
                calib.reference_distance,
                "must be positive",
            ));
        }

        if config.active_set_size < ACTIVE_SET_SIZE {
            result.errors.push(invalid(
                "active_set_size",
                config.active_set_size,
                "at least 3 beacons are required for 2D positioning",
            ));
        }

        if !(config.min_distance.is_finite() && config.min_distance >= 0.0) {
            result.errors.push(invalid("min_distance", config.min_distance, "must be non-negative"));
        }

        if !(config.singularity_epsilon.is_finite() && config.singularity_epsilon > 0.0) {
            result
                .errors
                .push(invalid("singularity_epsilon", config.singularity_epsilon, "must be positive"));
        } else if config.singularity_epsilon >= 0.25 {
            // 0.25 is the best achievable normalized determinant
            result.errors.push(invalid(
                "singularity_epsilon",
                config.singularity_epsilon,
                "must be below 0.25 or every geometry is rejected",
            ));
        }

        if config.selection_policy != SelectionPolicy::DiscoveryOrder {
            result
                .warnings
                .push("non-default beacon selection policy in use".to_string());
        }

        result
    }

    pub fn validate_beacon_config(beacon: &BeaconConfig) -> Result<(), ConfigError> {
        if beacon.id.trim().is_empty() {
            return Err(invalid("beacon.id", &beacon.id, "must not be empty"));
        }
        if !beacon.coordinate().is_finite() {
            return Err(invalid(
                &format!("beacon[{}].coordinate", beacon.id),
                format!("({}, {})", beacon.x, beacon.y),
                "must be finite",
            ));
        }
        Ok(())
    }

    fn apply(&mut self, data: ConfigFileData) -> Result<(), ConfigError> {
        let warnings = Self::validate_system_config(&data.system).into_first_error()?;

        let mut seen = HashSet::new();
        for beacon in &data.beacons {
            Self::validate_beacon_config(beacon)?;
            if !seen.insert(beacon.id.as_str()) {
                return Err(ConfigError::DuplicateBeacon { id: beacon.id.clone() });
            }
        }

        if data.beacons.len() < data.system.active_set_size {
            warn!(
                configured = data.beacons.len(),
                required = data.system.active_set_size,
                "fewer beacons configured than needed for a fix"
            );
        }
        for warning in warnings {
            warn!("{}", warning);
        }

        self.system_config = data.system;
        self.beacons = data.beacons;
        self.reindex();
        Ok(())
    }

    fn reindex(&mut self) {
        self.beacon_index = self
            .beacons
            .iter()
            .enumerate()
            .map(|(i, b)| (b.id.clone(), i))
            .collect();
    }
}

fn invalid(parameter: &str, value: impl ToString, reason: &str) -> ConfigError {
    ConfigError::InvalidParameter {
        parameter: parameter.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
