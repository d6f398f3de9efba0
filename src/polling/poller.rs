//! # Provider Poller
//!
//! One poller per provider. The scheduler calls [`Poller::on_trigger`] on
//! every poll tick and [`Poller::health_check`] on every health tick; the two
//! share nothing but read-only counters.

use async_trait::async_trait;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::{BreakerScope, CycleOutcome, PollerConfig, PollerRunState, PollerStats, PollingTask};
use crate::clock::SharedClock;
use crate::error::{FallbackError, FetchError, FleetSyncError, FleetSyncResult};
use crate::health::{HealthStatus, ProviderHealth};
use crate::logging::log_cycle_outcome;
use crate::models::ProviderRecord;
use crate::provider::{guarded_fetch, panic_reason, validate_batch, RecordSink, SharedFetcher};
use crate::resilience::{
    CircuitBreaker, CircuitBreakerConfig, FallbackCause, FallbackResult, FallbackSource,
    FallbackStrategy, InMemoryLastKnownGood, NoFallback, RetryExecutor, RetryPolicy,
};
use crate::scheduling::{trigger_fn, TriggerCallback};

pub struct Poller<R: ProviderRecord> {
    poller_id: Uuid,
    provider: String,
    fetcher: SharedFetcher<R>,
    sink: Arc<dyn RecordSink<R>>,
    breaker: CircuitBreaker,
    retry_policy: RetryPolicy<FetchError>,
    executor: RetryExecutor,
    fallback: Arc<dyn FallbackStrategy<R>>,
    last_known_good: Option<Arc<InMemoryLastKnownGood<R>>>,
    config: PollerConfig,
    clock: SharedClock,
    state: PollerRunState,
}

impl<R: ProviderRecord> std::fmt::Debug for Poller<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Poller")
            .field("poller_id", &self.poller_id)
            .field("provider", &self.provider)
            .field("breaker", &self.breaker)
            .field("retry_policy", &self.retry_policy)
            .field("fallback", &self.fallback.strategy_name())
            .field("config", &self.config)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl<R: ProviderRecord> Poller<R> {
    /// Create a poller with no fallback path
    pub fn new(
        fetcher: SharedFetcher<R>,
        sink: Arc<dyn RecordSink<R>>,
        config: PollerConfig,
        retry_policy: RetryPolicy<FetchError>,
        breaker_config: CircuitBreakerConfig,
        clock: SharedClock,
    ) -> FleetSyncResult<Self> {
        config.validate()?;
        breaker_config.validate().map_err(|reason| {
            FleetSyncError::ConfigurationError(format!("circuit breaker: {reason}"))
        })?;

        let provider = fetcher.provider_name().to_string();
        let poller_id = Uuid::new_v4();

        info!(
            poller_id = %poller_id,
            provider = %provider,
            poll_interval_ms = config.poll_interval.as_millis() as u64,
            fetch_timeout_ms = config.fetch_timeout.as_millis() as u64,
            breaker_scope = ?config.breaker_scope,
            max_attempts = retry_policy.max_attempts(),
            "📡 Provider poller created"
        );

        Ok(Self {
            poller_id,
            breaker: CircuitBreaker::new(provider.clone(), breaker_config, Arc::clone(&clock)),
            executor: RetryExecutor::new(provider.clone()),
            provider,
            fetcher,
            sink,
            retry_policy,
            fallback: Arc::new(NoFallback),
            last_known_good: None,
            config,
            clock,
            state: PollerRunState::new(),
        })
    }

    pub fn with_fallback(mut self, fallback: Arc<dyn FallbackStrategy<R>>) -> Self {
        self.fallback = fallback;
        self
    }

    /// Record every successful page in `store` for later cache fallbacks
    pub fn with_last_known_good(mut self, store: Arc<InMemoryLastKnownGood<R>>) -> Self {
        self.last_known_good = Some(store);
        self
    }

    pub fn poller_id(&self) -> Uuid {
        self.poller_id
    }

    pub fn provider_name(&self) -> &str {
        &self.provider
    }

    pub fn config(&self) -> &PollerConfig {
        &self.config
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn run_state(&self) -> &PollerRunState {
        &self.state
    }

    /// Run one polling cycle unless the previous one is still in progress
    pub async fn on_trigger(&self) -> CycleOutcome {
        let Some(_flight) = self.state.try_acquire() else {
            let skipped = self.state.record_skip();
            debug!(
                provider = %self.provider,
                skipped_total = skipped,
                "⏭️ Previous cycle still running, skipping trigger"
            );
            return CycleOutcome::Skipped;
        };

        self.state.record_poll_started(self.clock.now());

        match self.config.breaker_scope {
            BreakerScope::PerCycle => self.run_breaker_per_cycle().await,
            BreakerScope::PerAttempt => self.run_breaker_per_attempt().await,
        }
    }

    async fn run_breaker_per_cycle(&self) -> CycleOutcome {
        if !self.breaker.allow_call() {
            return self.reject().await;
        }

        let result = self
            .executor
            .execute(move || self.fetch_once(), &self.retry_policy)
            .await;
        self.breaker.record_outcome(result.is_ok());

        self.settle(result).await
    }

    async fn run_breaker_per_attempt(&self) -> CycleOutcome {
        let reached_provider = AtomicBool::new(false);
        let reached = &reached_provider;

        let result = self
            .executor
            .execute(
                move || async move {
                    if !self.breaker.allow_call() {
                        return Err(FetchError::CircuitOpen {
                            provider: self.provider.clone(),
                        });
                    }
                    reached.store(true, Ordering::Relaxed);

                    let attempt = self.fetch_once().await;
                    self.breaker.record_outcome(attempt.is_ok());
                    attempt
                },
                &self.retry_policy,
            )
            .await;

        match result {
            Err(FetchError::CircuitOpen { .. }) if !reached_provider.load(Ordering::Relaxed) => {
                self.reject().await
            }
            other => self.settle(other).await,
        }
    }

    /// One fetch attempt bounded by the watchdog, with panics contained
    async fn fetch_once(&self) -> Result<Vec<R>, FetchError> {
        let started = Instant::now();
        let result = guarded_fetch(self.fetcher.as_ref(), self.config.fetch_timeout).await;
        self.state.record_fetch_duration(started.elapsed());

        let records = result?;
        if self.config.validate_records {
            validate_batch(&self.provider, records)
        } else {
            Ok(records)
        }
    }

    async fn reject(&self) -> CycleOutcome {
        self.state.record_rejected();
        debug!(
            provider = %self.provider,
            breaker_state = %self.breaker.state(),
            "🚫 Circuit breaker rejected polling cycle"
        );
        self.degrade(FallbackCause::CircuitOpen).await
    }

    async fn settle(&self, result: Result<Vec<R>, FetchError>) -> CycleOutcome {
        match result {
            Ok(records) => {
                self.state.record_success(self.clock.now());
                if let Some(store) = &self.last_known_good {
                    store.put(self.provider.clone(), records.clone());
                }

                let count = records.len();
                let applied = self.sink.accept_batch(records);
                self.state.record_forwarded(applied);

                debug!(
                    provider = %self.provider,
                    records = count,
                    "✅ Polling cycle succeeded"
                );
                CycleOutcome::Succeeded { records: count }
            }
            Err(error) => {
                let streak = self.state.record_failure();
                warn!(
                    provider = %self.provider,
                    error = %error,
                    code = error.code(),
                    consecutive_failures = streak,
                    "🔴 Polling cycle failed"
                );
                self.degrade(FallbackCause::Exhausted(error)).await
            }
        }
    }

    async fn degrade(&self, cause: FallbackCause) -> CycleOutcome {
        self.state.record_fallback();

        let outcome = match self.run_fallback(&cause).await {
            Ok(result) => self.accept_fallback(result),
            Err(fallback_error) => Err(fallback_error),
        };

        match outcome {
            Ok((source, records, forwarded)) => {
                debug!(
                    provider = %self.provider,
                    strategy = self.fallback.strategy_name(),
                    cause = %cause,
                    records = records,
                    forwarded = forwarded,
                    "🟡 Serving degraded result"
                );
                CycleOutcome::Degraded {
                    cause,
                    source,
                    records,
                    forwarded,
                }
            }
            Err(fallback_error) => {
                debug!(
                    provider = %self.provider,
                    strategy = self.fallback.strategy_name(),
                    cause = %cause,
                    error = %fallback_error,
                    "Polling cycle produced no records"
                );
                CycleOutcome::Failed {
                    cause,
                    fallback_error,
                }
            }
        }
    }

    /// Run the fallback strategy under the degraded-path deadline, containing panics
    async fn run_fallback(&self, cause: &FallbackCause) -> Result<FallbackResult<R>, FallbackError> {
        let deadline = self.config.fallback_timeout();
        let strategy = self.fallback.strategy_name();
        let attempt = AssertUnwindSafe(self.fallback.fallback(&self.provider, cause)).catch_unwind();

        match tokio::time::timeout(deadline, attempt).await {
            Ok(Ok(result)) => result,
            Ok(Err(panic)) => {
                let reason = panic_reason(panic.as_ref());
                error!(
                    provider = %self.provider,
                    strategy = strategy,
                    reason = %reason,
                    "💥 Fallback strategy panicked"
                );
                Err(FallbackError::StrategyFailed {
                    provider: self.provider.clone(),
                    strategy: strategy.to_string(),
                    reason: format!("panicked: {reason}"),
                })
            }
            Err(_) => {
                warn!(
                    provider = %self.provider,
                    strategy = strategy,
                    deadline_ms = deadline.as_millis() as u64,
                    "⏱️ Fallback strategy timed out"
                );
                Err(FallbackError::StrategyFailed {
                    provider: self.provider.clone(),
                    strategy: strategy.to_string(),
                    reason: format!("timed out after {deadline:?}"),
                })
            }
        }
    }

    /// Forward live fallback records; cached records are reported but not re-applied
    fn accept_fallback(
        &self,
        result: FallbackResult<R>,
    ) -> Result<(FallbackSource, usize, bool), FallbackError> {
        let FallbackResult { source, records } = result;
        let count = records.len();

        let FallbackSource::AlternateProvider(alternate) = &source else {
            return Ok((source, count, false));
        };

        let records = if self.config.validate_records {
            validate_batch(alternate, records).map_err(|e| FallbackError::AlternateFailed {
                provider: self.provider.clone(),
                alternate: alternate.clone(),
                source: e,
            })?
        } else {
            records
        };

        let applied = self.sink.accept_batch(records);
        self.state.record_forwarded(applied);
        Ok((source, count, true))
    }

    /// Observability snapshot; touches neither the flight flag nor the breaker
    pub fn health_check(&self) -> ProviderHealth {
        let breaker_state = self.breaker.state();
        let consecutive_failures = self.state.consecutive_failures();
        let poll_count = self.state.poll_count();

        let health = ProviderHealth {
            provider: self.provider.clone(),
            status: ProviderHealth::classify(
                breaker_state,
                consecutive_failures,
                self.config.unhealthy_after_failures,
                poll_count,
            ),
            success_rate: self.state.success_rate(),
            average_fetch_time: self.state.average_fetch_time(),
            consecutive_failures,
            breaker_state,
            poll_count,
            skipped_count: self.state.skipped_count(),
            fallback_count: self.state.fallback_count(),
            last_poll_at: self.state.last_poll_at(),
            last_success_at: self.state.last_success_at(),
            checked_at: self.clock.now(),
        };

        match health.status {
            HealthStatus::Healthy | HealthStatus::Unknown => debug!(
                provider = %health.provider,
                status = %health.status,
                success_rate = health.success_rate,
                average_fetch_ms = health.average_fetch_time.as_millis() as u64,
                "Provider health check"
            ),
            HealthStatus::Degraded | HealthStatus::Unhealthy => warn!(
                provider = %health.provider,
                status = %health.status,
                success_rate = health.success_rate,
                consecutive_failures = health.consecutive_failures,
                breaker_state = %health.breaker_state,
                "⚠️ Provider health check"
            ),
        }

        health
    }

    pub fn stats(&self) -> PollerStats {
        self.state.stats()
    }

    /// Scheduler callback running one cycle per tick
    pub fn trigger_callback(self: &Arc<Self>) -> TriggerCallback {
        let poller = Arc::clone(self);
        trigger_fn(move || {
            let poller = Arc::clone(&poller);
            async move {
                let outcome = poller.on_trigger().await;
                log_cycle_outcome(poller.provider_name(), &outcome);
            }
        })
    }

    /// Scheduler callback running one health check per tick
    pub fn health_check_callback(self: &Arc<Self>) -> TriggerCallback {
        let poller = Arc::clone(self);
        trigger_fn(move || {
            let poller = Arc::clone(&poller);
            async move {
                poller.health_check();
            }
        })
    }
}

#[async_trait]
impl<R: ProviderRecord> PollingTask for Poller<R> {
    fn provider_name(&self) -> &str {
        Poller::provider_name(self)
    }

    fn config(&self) -> &PollerConfig {
        Poller::config(self)
    }

    async fn on_trigger(&self) -> CycleOutcome {
        Poller::on_trigger(self).await
    }

    fn health_check(&self) -> ProviderHealth {
        Poller::health_check(self)
    }

    fn stats(&self) -> PollerStats {
        Poller::stats(self)
    }
}
