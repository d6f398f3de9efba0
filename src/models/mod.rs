//! # Data Models
//!
//! Immutable provider records and the correlation types built from them.

pub mod assignment;
pub mod correlation;
pub mod telemetry;

pub use assignment::AssignmentRecord;
pub use correlation::{CorrelationEntry, CorrelationStatistics};
pub use telemetry::TelemetrySample;

use crate::error::FleetSyncResult;

/// Common behaviour of records produced by an upstream provider
pub trait ProviderRecord: Clone + Send + Sync + std::fmt::Debug + 'static {
    /// Vehicle identity the record is keyed by
    fn vehicle_id(&self) -> &str;

    /// Structural validation of a single record
    fn validate(&self) -> FleetSyncResult<()>;
}
