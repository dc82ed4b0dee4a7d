//! Observation bookkeeping and the estimation cycle

pub mod registry;
pub mod pipeline;

pub use pipeline::EstimationPipeline;
pub use registry::BeaconRegistry;
