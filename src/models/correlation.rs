use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{AssignmentRecord, TelemetrySample};
use crate::clock::saturating_sub;

/// Best-effort join of the latest telemetry and assignment for one vehicle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationEntry {
    pub vehicle_id: String,
    pub latest_telemetry: Option<TelemetrySample>,
    pub latest_assignment: Option<AssignmentRecord>,
    /// Arrival time of the most recent upsert, never decreasing
    pub last_updated_at: DateTime<Utc>,
}

impl CorrelationEntry {
    pub fn new(vehicle_id: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            vehicle_id: vehicle_id.into(),
            latest_telemetry: None,
            latest_assignment: None,
            last_updated_at: created_at,
        }
    }

    /// Both sides of the join are present
    pub fn is_complete(&self) -> bool {
        self.latest_telemetry.is_some() && self.latest_assignment.is_some()
    }

    pub fn is_recent(&self, now: DateTime<Utc>, threshold: Duration) -> bool {
        self.last_updated_at >= saturating_sub(now, threshold)
    }

    pub(crate) fn touch(&mut self, now: DateTime<Utc>) {
        if now > self.last_updated_at {
            self.last_updated_at = now;
        }
    }
}

/// Aggregate counts over the correlation store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrelationStatistics {
    pub total: usize,
    /// Entries with both telemetry and assignment present
    pub complete: usize,
    /// Entries updated within the recency threshold
    pub recent: usize,
    pub telemetry_only: usize,
    pub assignment_only: usize,
}

impl CorrelationStatistics {
    pub fn completeness_ratio(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.complete as f64 / self.total as f64
    }

    pub fn freshness_ratio(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.recent as f64 / self.total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, NaiveDate};

    #[test]
    fn test_entry_completeness() {
        let now = Utc::now();
        let mut entry = CorrelationEntry::new("bus-1", now);
        assert!(!entry.is_complete());

        entry.latest_telemetry = Some(TelemetrySample::at_position(
            "bus-1", 44.0, 20.0, now, "gps",
        ));
        assert!(!entry.is_complete());

        entry.latest_assignment = Some(AssignmentRecord::new(
            "bus-1",
            "26",
            NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            0,
        ));
        assert!(entry.is_complete());
    }

    #[test]
    fn test_touch_is_monotonic() {
        let now = Utc::now();
        let mut entry = CorrelationEntry::new("bus-1", now);

        entry.touch(now - ChronoDuration::seconds(30));
        assert_eq!(entry.last_updated_at, now);

        entry.touch(now + ChronoDuration::seconds(30));
        assert_eq!(entry.last_updated_at, now + ChronoDuration::seconds(30));
    }

    #[test]
    fn test_recency() {
        let now = Utc::now();
        let entry = CorrelationEntry::new("bus-1", now - ChronoDuration::minutes(45));

        assert!(!entry.is_recent(now, Duration::from_secs(30 * 60)));
        assert!(entry.is_recent(now, Duration::from_secs(60 * 60)));
    }

    #[test]
    fn test_recency_with_unbounded_threshold() {
        let now = Utc::now();
        let entry = CorrelationEntry::new("bus-1", now - ChronoDuration::days(3650));

        assert!(entry.is_recent(now, Duration::MAX));
        assert!(!entry.is_recent(now, Duration::from_secs(60)));
    }

    #[test]
    fn test_ratios_on_empty_store() {
        let stats = CorrelationStatistics::default();
        assert_eq!(stats.completeness_ratio(), 0.0);
        assert_eq!(stats.freshness_ratio(), 0.0);
    }
}
