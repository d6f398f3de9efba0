use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::ProviderRecord;
use crate::error::{FleetSyncError, FleetSyncResult};

/// Route assignment for one vehicle on one shift, produced by the roster provider
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssignmentRecord {
    pub vehicle_id: String,
    pub route_number: String,
    pub assignment_date: NaiveDate,
    pub shift_index: i32,
}

impl AssignmentRecord {
    pub fn new(
        vehicle_id: impl Into<String>,
        route_number: impl Into<String>,
        assignment_date: NaiveDate,
        shift_index: i32,
    ) -> Self {
        Self {
            vehicle_id: vehicle_id.into(),
            route_number: route_number.into(),
            assignment_date,
            shift_index,
        }
    }
}

impl ProviderRecord for AssignmentRecord {
    fn vehicle_id(&self) -> &str {
        &self.vehicle_id
    }

    fn validate(&self) -> FleetSyncResult<()> {
        if self.vehicle_id.trim().is_empty() {
            return Err(FleetSyncError::ValidationError(
                "assignment has an empty vehicle_id".to_string(),
            ));
        }

        if self.route_number.trim().is_empty() {
            return Err(FleetSyncError::ValidationError(format!(
                "assignment for vehicle {} has an empty route_number",
                self.vehicle_id
            )));
        }

        if self.shift_index < 0 {
            return Err(FleetSyncError::ValidationError(format!(
                "shift_index {} is negative for vehicle {}",
                self.shift_index, self.vehicle_id
            )));
        }

        Ok(())
    }
}
