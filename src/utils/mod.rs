//! Deployment configuration

pub mod config;

pub use config::{BeaconConfig, ConfigError, ConfigurationManager, SystemConfig, ValidationResult};
