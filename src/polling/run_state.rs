//! Per-poller run state.
//!
//! The single-flight flag is one atomic boolean acquired by compare-and-swap
//! and released by [`FlightGuard`] on drop, so every exit path of a cycle
//! (success, failure, fallback, panic unwinding) releases it. Counters are
//! atomics so health checks can read them while a cycle is running.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

#[derive(Debug, Default)]
pub struct PollerRunState {
    running: AtomicBool,
    poll_count: AtomicU64,
    skipped_count: AtomicU64,
    success_count: AtomicU64,
    failure_count: AtomicU64,
    rejected_count: AtomicU64,
    fallback_count: AtomicU64,
    consecutive_failures: AtomicU64,
    records_forwarded: AtomicU64,
    fetch_attempts: AtomicU64,
    total_fetch_micros: AtomicU64,
    last_poll_at: RwLock<Option<DateTime<Utc>>>,
    last_success_at: RwLock<Option<DateTime<Utc>>>,
}

/// Holds the single-flight flag for the duration of one cycle
#[derive(Debug)]
pub struct FlightGuard<'a> {
    running: &'a AtomicBool,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

/// Serializable copy of the run state counters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollerStats {
    pub running: bool,
    pub poll_count: u64,
    pub skipped_count: u64,
    pub success_count: u64,
    pub failure_count: u64,
    pub rejected_count: u64,
    pub fallback_count: u64,
    pub consecutive_failures: u64,
    pub records_forwarded: u64,
    pub fetch_attempts: u64,
    pub average_fetch_time: Duration,
    pub last_poll_at: Option<DateTime<Utc>>,
    pub last_success_at: Option<DateTime<Utc>>,
}

impl PollerRunState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the single-flight flag, or `None` if a cycle is in progress
    pub fn try_acquire(&self) -> Option<FlightGuard<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| FlightGuard {
                running: &self.running,
            })
    }

    pub(crate) fn record_skip(&self) -> u64 {
        self.skipped_count.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub(crate) fn record_poll_started(&self, now: DateTime<Utc>) {
        self.poll_count.fetch_add(1, Ordering::Relaxed);
        *self.last_poll_at.write() = Some(now);
    }

    pub(crate) fn record_success(&self, now: DateTime<Utc>) {
        self.success_count.fetch_add(1, Ordering::Relaxed);
        self.consecutive_failures.store(0, Ordering::Relaxed);
        *self.last_success_at.write() = Some(now);
    }

    pub(crate) fn record_failure(&self) -> u64 {
        self.failure_count.fetch_add(1, Ordering::Relaxed);
        self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub(crate) fn record_rejected(&self) {
        self.rejected_count.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_fallback(&self) {
        self.fallback_count.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_forwarded(&self, records: usize) {
        self.records_forwarded
            .fetch_add(records as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_fetch_duration(&self, elapsed: Duration) {
        self.fetch_attempts.fetch_add(1, Ordering::Relaxed);
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.total_fetch_micros.fetch_add(micros, Ordering::Relaxed);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Accepted cycles, including breaker-rejected ones
    pub fn poll_count(&self) -> u64 {
        self.poll_count.load(Ordering::Relaxed)
    }

    /// Triggers dropped because a cycle was already in progress
    pub fn skipped_count(&self) -> u64 {
        self.skipped_count.load(Ordering::Relaxed)
    }

    pub fn success_count(&self) -> u64 {
        self.success_count.load(Ordering::Relaxed)
    }

    pub fn failure_count(&self) -> u64 {
        self.failure_count.load(Ordering::Relaxed)
    }

    pub fn rejected_count(&self) -> u64 {
        self.rejected_count.load(Ordering::Relaxed)
    }

    pub fn fallback_count(&self) -> u64 {
        self.fallback_count.load(Ordering::Relaxed)
    }

    pub fn consecutive_failures(&self) -> u64 {
        self.consecutive_failures.load(Ordering::Relaxed)
    }

    pub fn records_forwarded(&self) -> u64 {
        self.records_forwarded.load(Ordering::Relaxed)
    }

    pub fn last_poll_at(&self) -> Option<DateTime<Utc>> {
        *self.last_poll_at.read()
    }

    pub fn last_success_at(&self) -> Option<DateTime<Utc>> {
        *self.last_success_at.read()
    }

    pub fn average_fetch_time(&self) -> Duration {
        let attempts = self.fetch_attempts.load(Ordering::Relaxed);
        if attempts == 0 {
            return Duration::ZERO;
        }
        Duration::from_micros(self.total_fetch_micros.load(Ordering::Relaxed) / attempts)
    }

    /// Successful cycles over cycles that reached the provider
    pub fn success_rate(&self) -> f64 {
        let successes = self.success_count();
        let attempted = successes + self.failure_count();
        if attempted == 0 {
            return 1.0;
        }
        successes as f64 / attempted as f64
    }

    pub fn stats(&self) -> PollerStats {
        PollerStats {
            running: self.is_running(),
            poll_count: self.poll_count(),
            skipped_count: self.skipped_count(),
            success_count: self.success_count(),
            failure_count: self.failure_count(),
            rejected_count: self.rejected_count(),
            fallback_count: self.fallback_count(),
            consecutive_failures: self.consecutive_failures(),
            records_forwarded: self.records_forwarded(),
            fetch_attempts: self.fetch_attempts.load(Ordering::Relaxed),
            average_fetch_time: self.average_fetch_time(),
            last_poll_at: self.last_poll_at(),
            last_success_at: self.last_success_at(),
        }
    }
}
