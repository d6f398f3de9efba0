//! # Polling Module
//!
//! Per-provider pollers driven by the scheduling facility. Each trigger runs
//! at most one cycle at a time; a cycle consults the provider's circuit
//! breaker, fetches through the retry executor, forwards records to the sink
//! and degrades through the fallback strategy when the provider is
//! unavailable. Cycles never return errors to the scheduler.

pub mod poller;
pub mod run_state;

pub use poller::Poller;
pub use run_state::{FlightGuard, PollerRunState, PollerStats};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{FallbackError, FleetSyncError, FleetSyncResult};
use crate::health::ProviderHealth;
use crate::resilience::{FallbackCause, FallbackSource};

/// How the circuit breaker wraps a polling cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerScope {
    /// One permission check and one recorded outcome per cycle
    #[default]
    PerCycle,
    /// Every retry attempt asks permission and records its own outcome
    PerAttempt,
}

/// Runtime settings for one poller
#[derive(Debug, Clone, PartialEq)]
pub struct PollerConfig {
    pub poll_interval: Duration,
    pub health_check_interval: Duration,
    /// Watchdog bound on every fetch attempt
    pub fetch_timeout: Duration,
    pub breaker_scope: BreakerScope,
    /// Run `validate()` over every fetched record
    pub validate_records: bool,
    /// Consecutive failed cycles after which the provider reports unhealthy
    pub unhealthy_after_failures: u64,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(30),
            health_check_interval: Duration::from_secs(60),
            fetch_timeout: Duration::from_secs(10),
            breaker_scope: BreakerScope::PerCycle,
            validate_records: true,
            unhealthy_after_failures: 3,
        }
    }
}

impl PollerConfig {
    /// Deadline for a whole fallback strategy call
    ///
    /// An alternate-provider fetch is itself bounded by `fetch_timeout`; the
    /// extra headroom lets that inner failure surface first.
    pub fn fallback_timeout(&self) -> Duration {
        self.fetch_timeout.saturating_mul(2)
    }

    pub fn validate(&self) -> FleetSyncResult<()> {
        if self.poll_interval.is_zero() {
            return Err(FleetSyncError::ConfigurationError(
                "poll_interval must be greater than 0".to_string(),
            ));
        }
        if self.health_check_interval.is_zero() {
            return Err(FleetSyncError::ConfigurationError(
                "health_check_interval must be greater than 0".to_string(),
            ));
        }
        if self.fetch_timeout.is_zero() {
            return Err(FleetSyncError::ConfigurationError(
                "fetch_timeout must be greater than 0".to_string(),
            ));
        }
        if self.unhealthy_after_failures == 0 {
            return Err(FleetSyncError::ConfigurationError(
                "unhealthy_after_failures must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Result of one trigger, for callers and tests; the scheduler discards it
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// A previous cycle was still running
    Skipped,
    Succeeded {
        records: usize,
    },
    /// The fallback strategy supplied a degraded result
    Degraded {
        cause: FallbackCause,
        source: FallbackSource,
        records: usize,
        /// Whether the records were forwarded to the sink
        forwarded: bool,
    },
    /// Neither the provider nor the fallback produced records
    Failed {
        cause: FallbackCause,
        fallback_error: FallbackError,
    },
}

impl CycleOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            CycleOutcome::Skipped => "skipped",
            CycleOutcome::Succeeded { .. } => "succeeded",
            CycleOutcome::Degraded { .. } => "degraded",
            CycleOutcome::Failed { .. } => "failed",
        }
    }
}

/// Type-erased view of a poller, used by the engine
#[async_trait]
pub trait PollingTask: Send + Sync {
    fn provider_name(&self) -> &str;

    fn config(&self) -> &PollerConfig;

    async fn on_trigger(&self) -> CycleOutcome;

    fn health_check(&self) -> ProviderHealth;

    fn stats(&self) -> PollerStats;
}
