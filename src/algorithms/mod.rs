//! Core positioning algorithms

pub mod signal_model;
pub mod multilateration;

pub use multilateration::MultilaterationSolver;
pub use signal_model::PathLossModel;
