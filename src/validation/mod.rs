//! Error taxonomy and input validation

pub mod data;
pub mod error;

pub use data::{DataValidator, ValidationConfig};
pub use error::{ObservationError, PositioningError, PositioningResult, UnavailableReason};
