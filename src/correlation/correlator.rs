//! # Correlator
//!
//! Maintains the latest telemetry sample and the latest route assignment per
//! vehicle in a single concurrent keyed store.
//!
//! Upserts from either poller and the periodic sweep may run concurrently.
//! Each upsert holds the entry's shard lock for the duration of the update, so
//! an entry is never observed half-written. Readers always receive copies;
//! the correlator offers no read-modify-write beyond its own upserts.
//!
//! Entries are ordered by arrival time (last write wins), not by the
//! records' own `captured_at` / `assignment_date`.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use crate::clock::{saturating_sub, SharedClock};
use crate::health::CorrelationHealth;
use crate::models::{AssignmentRecord, CorrelationEntry, CorrelationStatistics, TelemetrySample};
use crate::provider::RecordSink;

/// Result of one staleness sweep
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepReport {
    pub evicted: usize,
    pub retained: usize,
    pub health: CorrelationHealth,
}

#[derive(Debug)]
pub struct Correlator {
    entries: DashMap<String, CorrelationEntry>,
    clock: SharedClock,
    recency_threshold: Duration,
}

impl Correlator {
    /// Default window within which an entry counts as recent
    pub const DEFAULT_RECENCY_THRESHOLD: Duration = Duration::from_secs(30 * 60);

    pub fn new(clock: SharedClock) -> Self {
        Self::with_recency_threshold(clock, Self::DEFAULT_RECENCY_THRESHOLD)
    }

    pub fn with_recency_threshold(clock: SharedClock, recency_threshold: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
            recency_threshold,
        }
    }

    pub fn recency_threshold(&self) -> Duration {
        self.recency_threshold
    }

    /// Replace the telemetry side of the sample's vehicle entry
    pub fn upsert_telemetry(&self, sample: TelemetrySample) {
        let now = self.clock.now();
        let vehicle_id = sample.vehicle_id.clone();

        let mut entry = self
            .entries
            .entry(vehicle_id.clone())
            .or_insert_with(|| CorrelationEntry::new(vehicle_id.clone(), now));
        entry.latest_telemetry = Some(sample);
        entry.touch(now);

        debug!(vehicle_id = %vehicle_id, complete = entry.is_complete(), "Telemetry upserted");
    }

    /// Replace the assignment side of the record's vehicle entry
    pub fn upsert_assignment(&self, record: AssignmentRecord) {
        let now = self.clock.now();
        let vehicle_id = record.vehicle_id.clone();

        let mut entry = self
            .entries
            .entry(vehicle_id.clone())
            .or_insert_with(|| CorrelationEntry::new(vehicle_id.clone(), now));
        entry.latest_assignment = Some(record);
        entry.touch(now);

        debug!(vehicle_id = %vehicle_id, complete = entry.is_complete(), "Assignment upserted");
    }

    /// Remove every entry last updated before `now - retention`
    ///
    /// Returns the number of evicted entries.
    pub fn sweep(&self, retention: Duration) -> usize {
        let cutoff = saturating_sub(self.clock.now(), retention);
        let mut evicted = 0usize;

        self.entries.retain(|_, entry| {
            let keep = entry.last_updated_at >= cutoff;
            if !keep {
                evicted += 1;
            }
            keep
        });

        if evicted > 0 {
            info!(
                evicted = evicted,
                retention_seconds = retention.as_secs(),
                "🧹 Evicted stale correlation entries"
            );
        }
        evicted
    }

    /// Sweep and then score the remaining entries
    pub fn sweep_and_report(&self, retention: Duration) -> SweepReport {
        let evicted = self.sweep(retention);
        let health = self.health();

        SweepReport {
            evicted,
            retained: health.statistics.total,
            health,
        }
    }

    pub fn statistics(&self) -> CorrelationStatistics {
        let now = self.clock.now();
        let mut stats = CorrelationStatistics::default();

        for entry in self.entries.iter() {
            stats.total += 1;
            match (&entry.latest_telemetry, &entry.latest_assignment) {
                (Some(_), Some(_)) => stats.complete += 1,
                (Some(_), None) => stats.telemetry_only += 1,
                (None, Some(_)) => stats.assignment_only += 1,
                (None, None) => {}
            }
            if entry.is_recent(now, self.recency_threshold) {
                stats.recent += 1;
            }
        }

        stats
    }

    pub fn health(&self) -> CorrelationHealth {
        CorrelationHealth::from_statistics(self.statistics(), self.clock.now())
    }

    /// Copy of one vehicle's entry
    pub fn get(&self, vehicle_id: &str) -> Option<CorrelationEntry> {
        self.entries.get(vehicle_id).map(|entry| entry.value().clone())
    }

    /// Copies of all current entries, in no particular order
    pub fn snapshot(&self) -> Vec<CorrelationEntry> {
        self.entries
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Visit a copy of each entry without collecting them all first
    pub fn for_each_entry<F>(&self, mut visit: F)
    where
        F: FnMut(CorrelationEntry),
    {
        for entry in self.entries.iter() {
            visit(entry.value().clone());
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl RecordSink<TelemetrySample> for Correlator {
    fn accept(&self, record: TelemetrySample) {
        self.upsert_telemetry(record);
    }
}

impl RecordSink<AssignmentRecord> for Correlator {
    fn accept(&self, record: AssignmentRecord) {
        self.upsert_assignment(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::health::HealthStatus;
    use chrono::NaiveDate;
    use std::sync::Arc;

    fn telemetry(vehicle_id: &str, clock: &ManualClock) -> TelemetrySample {
        use crate::clock::Clock;
        TelemetrySample::at_position(vehicle_id, 44.81, 20.46, clock.now(), "gps_primary")
    }

    fn assignment(vehicle_id: &str) -> AssignmentRecord {
        AssignmentRecord::new(
            vehicle_id,
            "26",
            NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            1,
        )
    }

    #[test]
    fn test_complete_only_after_both_sides() {
        let clock = ManualClock::starting_now();
        let correlator = Correlator::new(clock.clone());

        correlator.upsert_telemetry(telemetry("v1", &clock));
        assert_eq!(correlator.statistics().complete, 0);
        assert_eq!(correlator.statistics().telemetry_only, 1);

        clock.advance(Duration::from_secs(5));
        correlator.upsert_assignment(assignment("v1"));

        let stats = correlator.statistics();
        assert_eq!(stats.total, 1);
        assert_eq!(stats.complete, 1);
        assert_eq!(stats.recent, 1);
    }

    #[test]
    fn test_last_write_wins_by_arrival() {
        let clock = ManualClock::starting_now();
        let correlator = Correlator::new(clock.clone());

        let mut newer = telemetry("v1", &clock);
        newer.latitude = 45.0;
        let mut older = telemetry("v1", &clock);
        older.captured_at = newer.captured_at - chrono::Duration::minutes(10);
        older.latitude = 43.0;

        correlator.upsert_telemetry(newer);
        clock.advance(Duration::from_secs(1));
        correlator.upsert_telemetry(older);

        let entry = correlator.get("v1").unwrap();
        assert_eq!(entry.latest_telemetry.unwrap().latitude, 43.0);
    }

    #[test]
    fn test_last_updated_never_decreases() {
        let clock = ManualClock::starting_now();
        let correlator = Correlator::new(clock.clone());

        correlator.upsert_assignment(assignment("v1"));
        let first = correlator.get("v1").unwrap().last_updated_at;

        clock.set(first - chrono::Duration::minutes(5));
        correlator.upsert_telemetry(telemetry("v1", &clock));

        assert_eq!(correlator.get("v1").unwrap().last_updated_at, first);
    }

    #[test]
    fn test_sweep_evicts_only_stale_entries() {
        let clock = ManualClock::starting_now();
        let correlator = Correlator::new(clock.clone());

        correlator.upsert_telemetry(telemetry("stale", &clock));
        clock.advance(Duration::from_secs(60 * 60));
        correlator.upsert_telemetry(telemetry("fresh", &clock));
        clock.advance(Duration::from_secs(30 * 60));

        // stale was updated 90 minutes ago, fresh 30 minutes ago
        let evicted = correlator.sweep(Duration::from_secs(60 * 60));

        assert_eq!(evicted, 1);
        assert!(correlator.get("stale").is_none());
        assert!(correlator.get("fresh").is_some());
    }

    #[test]
    fn test_recent_uses_threshold() {
        let clock = ManualClock::starting_now();
        let correlator = Correlator::new(clock.clone());

        correlator.upsert_telemetry(telemetry("v1", &clock));
        clock.advance(Duration::from_secs(31 * 60));
        correlator.upsert_telemetry(telemetry("v2", &clock));

        let stats = correlator.statistics();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.recent, 1);
    }

    #[test]
    fn test_unbounded_retention_keeps_everything() {
        let clock = ManualClock::starting_now();
        let correlator = Correlator::new(clock.clone());

        correlator.upsert_telemetry(telemetry("v1", &clock));
        clock.advance(Duration::from_secs(365 * 24 * 3600));

        assert_eq!(correlator.sweep(Duration::from_secs(10_000_000_000_000)), 0);
        assert_eq!(correlator.sweep(Duration::MAX), 0);
        assert_eq!(correlator.len(), 1);
    }

    #[test]
    fn test_unbounded_recency_threshold_counts_every_entry() {
        let clock = ManualClock::starting_now();
        let correlator =
            Correlator::with_recency_threshold(clock.clone(), Duration::from_secs(10_000_000_000_000));

        correlator.upsert_telemetry(telemetry("v1", &clock));
        correlator.upsert_assignment(assignment("v1"));
        clock.advance(Duration::from_secs(365 * 24 * 3600));

        let health = correlator.health();
        assert_eq!(health.statistics.recent, 1);
        assert_eq!(health.score, 100);
    }

    #[test]
    fn test_sweep_and_report() {
        let clock = ManualClock::starting_now();
        let correlator = Correlator::new(clock.clone());

        correlator.upsert_telemetry(telemetry("v1", &clock));
        correlator.upsert_assignment(assignment("v1"));

        let report = correlator.sweep_and_report(Duration::from_secs(3600));
        assert_eq!(report.evicted, 0);
        assert_eq!(report.retained, 1);
        assert_eq!(report.health.score, 100);
        assert_eq!(report.health.status, HealthStatus::Healthy);
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let clock = ManualClock::starting_now();
        let correlator = Correlator::new(clock.clone());
        correlator.upsert_assignment(assignment("v1"));

        let mut snapshot = correlator.snapshot();
        snapshot[0].latest_assignment = None;

        assert!(correlator.get("v1").unwrap().latest_assignment.is_some());

        let mut visited = 0;
        correlator.for_each_entry(|_| visited += 1);
        assert_eq!(visited, 1);
    }

    #[test]
    fn test_record_sink_routes_by_type() {
        let clock = ManualClock::starting_now();
        let correlator = Arc::new(Correlator::new(clock.clone()));

        let applied = RecordSink::<TelemetrySample>::accept_batch(
            correlator.as_ref(),
            vec![telemetry("v1", &clock), telemetry("v2", &clock)],
        );
        RecordSink::<AssignmentRecord>::accept(correlator.as_ref(), assignment("v1"));

        assert_eq!(applied, 2);
        assert_eq!(correlator.len(), 2);
        assert_eq!(correlator.statistics().complete, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_upserts_and_sweeps() {
        let clock = ManualClock::starting_now();
        let correlator = Arc::new(Correlator::new(clock.clone()));
        let mut handles = Vec::new();

        for worker in 0..4 {
            let correlator = Arc::clone(&correlator);
            let clock = Arc::clone(&clock);
            handles.push(tokio::spawn(async move {
                for i in 0..250 {
                    let vehicle = format!("v{}", i % 50);
                    if worker % 2 == 0 {
                        correlator.upsert_telemetry(telemetry(&vehicle, &clock));
                    } else {
                        correlator.upsert_assignment(assignment(&vehicle));
                    }
                    if i % 25 == 0 {
                        correlator.sweep(Duration::from_secs(3600));
                    }
                }
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }

        let stats = correlator.statistics();
        assert_eq!(stats.total, 50);
        assert_eq!(stats.complete, 50);
    }
}
