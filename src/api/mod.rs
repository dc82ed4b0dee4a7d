//! Presentation-facing output of estimation cycles

pub mod formatting;

pub use formatting::{FormattedOutcome, OutputFormat, PositionFormatter};
