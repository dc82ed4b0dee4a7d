use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub type PositioningResult<T> = Result<T, PositioningError>;

/// Failures of one estimation cycle. All are recoverable: the cycle simply
/// produces no position.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PositioningError {
    #[error("not enough beacons: {available} known, {required} required")]
    NotEnoughBeacons { available: usize, required: usize },

    #[error("degenerate path-loss model: {detail}")]
    DegenerateModel { detail: String },

    #[error("singular beacon geometry (normalized determinant {normalized_determinant:e})")]
    SingularGeometry { normalized_determinant: f64 },
}

impl PositioningError {
    pub fn reason(&self) -> UnavailableReason {
        match self {
            PositioningError::NotEnoughBeacons { .. } => UnavailableReason::NotEnoughBeacons,
            PositioningError::DegenerateModel { .. } => UnavailableReason::DegenerateModel,
            PositioningError::SingularGeometry { .. } => UnavailableReason::SingularGeometry,
        }
    }
}

/// Why a cycle produced no position, as reported to the presentation layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnavailableReason {
    NotEnoughBeacons,
    DegenerateModel,
    SingularGeometry,
}

impl UnavailableReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnavailableReason::NotEnoughBeacons => "NotEnoughBeacons",
            UnavailableReason::DegenerateModel => "DegenerateModel",
            UnavailableReason::SingularGeometry => "SingularGeometry",
        }
    }
}

impl fmt::Display for UnavailableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&PositioningError> for UnavailableReason {
    fn from(error: &PositioningError) -> Self {
        error.reason()
    }
}

/// Observations rejected at the registry boundary
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ObservationError {
    #[error("observation has an empty beacon id")]
    EmptyId,

    #[error("beacon {id}: RSSI {rssi} is not a finite number")]
    NonFiniteRssi { id: String, rssi: f64 },

    #[error("beacon {id}: coordinate ({x}, {y}) is not finite")]
    NonFiniteCoordinate { id: String, x: f64, y: f64 },
}
