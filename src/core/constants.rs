//! Calibration defaults and numeric thresholds

/// Expected RSSI at the reference distance for the reference deployment (dBm)
pub const DEFAULT_REFERENCE_RSSI_DBM: f64 = -44.0;

/// Distance at which the reference RSSI was measured (plane units)
pub const DEFAULT_REFERENCE_DISTANCE: f64 = 0.3;

/// Number of beacons used for a plain trilateration fix
pub const ACTIVE_SET_SIZE: usize = 3;

/// Mean path-loss exponents closer to zero than this are degenerate
pub const MODEL_EPSILON: f64 = 1e-12;

/// Relative threshold on det(AᵀA) / trace(AᵀA)² below which geometry is singular
pub const SINGULARITY_EPSILON: f64 = 1e-10;

/// Lower bound applied to every distance estimate
pub const DEFAULT_MIN_DISTANCE: f64 = 1e-3;
