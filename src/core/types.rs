//! Core data types for the positioning system

use serde::{Deserialize, Serialize};
use std::fmt;

use super::constants::{DEFAULT_REFERENCE_DISTANCE, DEFAULT_REFERENCE_RSSI_DBM};

/// Point in the shared 2D plane beacons and receiver live in
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Coordinate {
    pub x: f64,
    pub y: f64,
}

impl Coordinate {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &Coordinate) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl From<(f64, f64)> for Coordinate {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

/// One RSSI reading from a beacon at a known, fixed coordinate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeaconObservation {
    /// Stable external identifier, unique per beacon
    pub id: String,
    /// Received signal strength (dBm)
    pub rssi: f64,
    /// Fixed position of the beacon
    pub coordinate: Coordinate,
}

impl BeaconObservation {
    pub fn new(id: impl Into<String>, rssi: f64, coordinate: impl Into<Coordinate>) -> Self {
        Self {
            id: id.into(),
            rssi,
            coordinate: coordinate.into(),
        }
    }
}

/// Process-wide path-loss calibration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationParams {
    /// Expected RSSI at `reference_distance` (dBm)
    pub reference_rssi: f64,
    /// Distance the reference RSSI was measured at
    pub reference_distance: f64,
}

impl Default for CalibrationParams {
    fn default() -> Self {
        Self {
            reference_rssi: DEFAULT_REFERENCE_RSSI_DBM,
            reference_distance: DEFAULT_REFERENCE_DISTANCE,
        }
    }
}

/// Distance derived from one beacon's RSSI
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistanceEstimate {
    pub beacon_id: String,
    pub distance: f64,
}

/// Estimated receiver position, same units as beacon coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PositionEstimate {
    pub x: f64,
    pub y: f64,
}

impl PositionEstimate {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn as_coordinate(&self) -> Coordinate {
        Coordinate::new(self.x, self.y)
    }
}

impl fmt::Display for PositionEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_calibration_matches_reference_deployment() {
        let calib = CalibrationParams::default();
        assert_eq!(calib.reference_rssi, -44.0);
        assert_eq!(calib.reference_distance, 0.3);
    }

    #[test]
    fn test_coordinate_distance() {
        let a = Coordinate::new(0.0, 0.0);
        let b = Coordinate::new(3.0, 4.0);
        assert_eq!(a.distance_to(&b), 5.0);
        assert!(!Coordinate::new(f64::NAN, 0.0).is_finite());
    }

    #[test]
    fn test_observation_serde() {
        let obs = BeaconObservation::new("b1", -50.0, (5.0, 4.2));
        let json = serde_json::to_string(&obs).unwrap();
        let back: BeaconObservation = serde_json::from_str(&json).unwrap();
        assert_eq!(obs, back);
    }
}
