use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ProviderRecord;
use crate::error::{FleetSyncError, FleetSyncResult};

/// Position report for one vehicle, produced by the telemetry provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySample {
    pub vehicle_id: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Horizontal accuracy in metres
    pub accuracy: f64,
    pub speed_kmh: Option<f64>,
    pub bearing_deg: Option<f64>,
    pub captured_at: DateTime<Utc>,
    pub source_tag: String,
}

impl TelemetrySample {
    /// Minimal sample used by adapters that only report a position
    pub fn at_position(
        vehicle_id: impl Into<String>,
        latitude: f64,
        longitude: f64,
        captured_at: DateTime<Utc>,
        source_tag: impl Into<String>,
    ) -> Self {
        Self {
            vehicle_id: vehicle_id.into(),
            latitude,
            longitude,
            accuracy: 0.0,
            speed_kmh: None,
            bearing_deg: None,
            captured_at,
            source_tag: source_tag.into(),
        }
    }
}

impl ProviderRecord for TelemetrySample {
    fn vehicle_id(&self) -> &str {
        &self.vehicle_id
    }

    fn validate(&self) -> FleetSyncResult<()> {
        if self.vehicle_id.trim().is_empty() {
            return Err(FleetSyncError::ValidationError(
                "telemetry sample has an empty vehicle_id".to_string(),
            ));
        }

        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(FleetSyncError::ValidationError(format!(
                "latitude {} out of range for vehicle {}",
                self.latitude, self.vehicle_id
            )));
        }

        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(FleetSyncError::ValidationError(format!(
                "longitude {} out of range for vehicle {}",
                self.longitude, self.vehicle_id
            )));
        }

        if !self.accuracy.is_finite() || self.accuracy < 0.0 {
            return Err(FleetSyncError::ValidationError(format!(
                "accuracy {} is invalid for vehicle {}",
                self.accuracy, self.vehicle_id
            )));
        }

        if let Some(bearing) = self.bearing_deg {
            if !(0.0..=360.0).contains(&bearing) {
                return Err(FleetSyncError::ValidationError(format!(
                    "bearing {bearing} out of range for vehicle {}",
                    self.vehicle_id
                )));
            }
        }

        Ok(())
    }
}
