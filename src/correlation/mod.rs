//! # Correlation Module
//!
//! Keyed join of the telemetry and assignment streams per vehicle identity,
//! with staleness eviction and aggregate health scoring.

pub mod correlator;

pub use correlator::{Correlator, SweepReport};
