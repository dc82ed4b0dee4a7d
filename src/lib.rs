//! Beacon Trilateration
//!
//! Estimates a receiver's 2D position from the RSSI of three or more fixed
//! beacons: a log-distance path-loss model turns signal strength into
//! distances and a linearized least-squares solve recovers the position.

pub mod core;
pub mod algorithms;
pub mod processing;
pub mod validation;
pub mod utils;
pub mod api;

// Re-export commonly used types
pub use self::core::{BeaconObservation, CalibrationParams, Coordinate, DistanceEstimate, PositionEstimate};
pub use algorithms::multilateration::{Multilateration, MultilaterationSolver, RangeMeasurement};
pub use algorithms::signal_model::{estimate_distance, estimate_path_loss_exponent, PathLossModel};
pub use processing::pipeline::{estimate, EstimationPipeline, EstimationReport, PositionOutcome};
pub use processing::registry::{BeaconRegistry, SelectionPolicy, SharedRegistry, UpsertOutcome};
pub use validation::error::{ObservationError, PositioningError, PositioningResult, UnavailableReason};
pub use utils::config::{BeaconConfig, ConfigError, ConfigurationManager, SystemConfig};
pub use api::formatting::{OutputFormat, PositionFormatter};
