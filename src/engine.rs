//! # Ingestion Engine
//!
//! Wires one poller per provider, the shared correlator and the scheduling
//! facility together. [`IngestionEngine::start`] registers three kinds of
//! triggers:
//!
//! - `{provider}.poll` runs one polling cycle per tick
//! - `{provider}.health` logs a provider health snapshot per tick
//! - `correlation.sweep` evicts stale correlation entries
//!
//! Disabled providers get no poller and no triggers.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

use crate::clock::{SharedClock, SystemClock};
use crate::config::{FallbackMode, FleetSyncConfig, ProviderConfig};
use crate::correlation::{Correlator, SweepReport};
use crate::error::{FleetSyncError, FleetSyncResult};
use crate::health::EngineHealthReport;
use crate::logging::{log_health_report, log_sweep};
use crate::models::{AssignmentRecord, ProviderRecord, TelemetrySample};
use crate::polling::{Poller, PollingTask};
use crate::provider::{RecordSink, SharedFetcher};
use crate::resilience::{AlternateProviderFallback, CacheFallback, InMemoryLastKnownGood};
use crate::scheduling::{trigger_fn, ScheduleHandle, Scheduler, TokioScheduler};

/// Registration name of the correlation sweep trigger
pub const SWEEP_TRIGGER: &str = "correlation.sweep";

/// Registration name of a provider's poll trigger
pub fn poll_trigger_name(provider: &str) -> String {
    format!("{provider}.poll")
}

/// Registration name of a provider's health-check trigger
pub fn health_trigger_name(provider: &str) -> String {
    format!("{provider}.health")
}

/// Fallback inputs for one record type
struct FallbackInputs<R> {
    alternates: Vec<SharedFetcher<R>>,
    cache: Option<Arc<InMemoryLastKnownGood<R>>>,
}

impl<R> Default for FallbackInputs<R> {
    fn default() -> Self {
        Self {
            alternates: Vec::new(),
            cache: None,
        }
    }
}

/// Builder for [`IngestionEngine`]
pub struct IngestionEngineBuilder {
    config: FleetSyncConfig,
    telemetry_fetcher: Option<SharedFetcher<TelemetrySample>>,
    assignment_fetcher: Option<SharedFetcher<AssignmentRecord>>,
    telemetry_fallback: FallbackInputs<TelemetrySample>,
    assignment_fallback: FallbackInputs<AssignmentRecord>,
    scheduler: Option<Arc<dyn Scheduler>>,
    clock: Option<SharedClock>,
}

impl IngestionEngineBuilder {
    pub fn new(config: FleetSyncConfig) -> Self {
        Self {
            config,
            telemetry_fetcher: None,
            assignment_fetcher: None,
            telemetry_fallback: FallbackInputs::default(),
            assignment_fallback: FallbackInputs::default(),
            scheduler: None,
            clock: None,
        }
    }

    pub fn telemetry_fetcher(mut self, fetcher: SharedFetcher<TelemetrySample>) -> Self {
        self.telemetry_fetcher = Some(fetcher);
        self
    }

    pub fn assignment_fetcher(mut self, fetcher: SharedFetcher<AssignmentRecord>) -> Self {
        self.assignment_fetcher = Some(fetcher);
        self
    }

    /// Alternate telemetry provider used when `fallback = "alternate_provider"`
    pub fn telemetry_alternate(mut self, fetcher: SharedFetcher<TelemetrySample>) -> Self {
        self.telemetry_fallback.alternates.push(fetcher);
        self
    }

    /// Alternate assignment provider used when `fallback = "alternate_provider"`
    pub fn assignment_alternate(mut self, fetcher: SharedFetcher<AssignmentRecord>) -> Self {
        self.assignment_fallback.alternates.push(fetcher);
        self
    }

    /// Shared last known-good store used when `fallback = "cache"`
    pub fn telemetry_cache(mut self, store: Arc<InMemoryLastKnownGood<TelemetrySample>>) -> Self {
        self.telemetry_fallback.cache = Some(store);
        self
    }

    pub fn assignment_cache(mut self, store: Arc<InMemoryLastKnownGood<AssignmentRecord>>) -> Self {
        self.assignment_fallback.cache = Some(store);
        self
    }

    /// Defaults to a [`TokioScheduler`] on the current runtime
    pub fn scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Defaults to [`SystemClock`]
    pub fn clock(mut self, clock: SharedClock) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> FleetSyncResult<IngestionEngine> {
        self.config.validate()?;

        let clock = self.clock.unwrap_or_else(SystemClock::shared);
        let (scheduler, owns_scheduler): (Arc<dyn Scheduler>, bool) = match self.scheduler {
            Some(scheduler) => (scheduler, false),
            None => (Arc::new(TokioScheduler::new()?), true),
        };

        let correlator = Arc::new(Correlator::with_recency_threshold(
            Arc::clone(&clock),
            self.config.correlation.recency_threshold(),
        ));

        let telemetry_sink: Arc<dyn RecordSink<TelemetrySample>> = correlator.clone();
        let assignment_sink: Arc<dyn RecordSink<AssignmentRecord>> = correlator.clone();

        let telemetry_poller = build_poller(
            &self.config.telemetry_provider,
            self.telemetry_fetcher,
            telemetry_sink,
            self.telemetry_fallback,
            &clock,
        )?;
        let assignment_poller = build_poller(
            &self.config.assignment_provider,
            self.assignment_fetcher,
            assignment_sink,
            self.assignment_fallback,
            &clock,
        )?;

        info!(
            telemetry_enabled = telemetry_poller.is_some(),
            assignment_enabled = assignment_poller.is_some(),
            retention_seconds = self.config.correlation.retention_seconds,
            "🚀 Ingestion engine built"
        );

        Ok(IngestionEngine {
            config: self.config,
            clock,
            scheduler,
            owns_scheduler,
            correlator,
            telemetry_poller,
            assignment_poller,
            handles: Mutex::new(Vec::new()),
            running: AtomicBool::new(false),
        })
    }
}

fn build_poller<R: ProviderRecord>(
    provider: &ProviderConfig,
    fetcher: Option<SharedFetcher<R>>,
    sink: Arc<dyn RecordSink<R>>,
    fallback: FallbackInputs<R>,
    clock: &SharedClock,
) -> FleetSyncResult<Option<Arc<Poller<R>>>> {
    if !provider.enabled {
        info!(provider = %provider.name, "Provider disabled, no poller created");
        return Ok(None);
    }

    let fetcher = fetcher.ok_or_else(|| {
        FleetSyncError::ConfigurationError(format!(
            "no fetcher registered for enabled provider '{}'",
            provider.name
        ))
    })?;
    if fetcher.provider_name() != provider.name {
        return Err(FleetSyncError::ConfigurationError(format!(
            "fetcher '{}' registered for provider '{}'",
            fetcher.provider_name(),
            provider.name
        )));
    }

    let poller = Poller::new(
        fetcher,
        sink,
        provider.to_poller_config(),
        provider.to_retry_policy()?,
        provider.to_breaker_config(),
        Arc::clone(clock),
    )?;

    let poller = match provider.fallback {
        FallbackMode::None => poller,
        FallbackMode::Cache => {
            let store = fallback
                .cache
                .unwrap_or_else(|| Arc::new(InMemoryLastKnownGood::new()));
            poller
                .with_fallback(Arc::new(CacheFallback::new(store.clone())))
                .with_last_known_good(store)
        }
        FallbackMode::AlternateProvider => {
            if fallback.alternates.is_empty() {
                return Err(FleetSyncError::ConfigurationError(format!(
                    "provider '{}' uses alternate_provider fallback but no alternates are registered",
                    provider.name
                )));
            }
            let strategy = AlternateProviderFallback::new(fallback.alternates)
                .with_fetch_timeout(provider.fetch_timeout());
            poller.with_fallback(Arc::new(strategy))
        }
    };

    Ok(Some(Arc::new(poller)))
}

/// Running ingestion engine
pub struct IngestionEngine {
    config: FleetSyncConfig,
    clock: SharedClock,
    scheduler: Arc<dyn Scheduler>,
    /// Only a scheduler built by the engine is shut down with it
    owns_scheduler: bool,
    correlator: Arc<Correlator>,
    telemetry_poller: Option<Arc<Poller<TelemetrySample>>>,
    assignment_poller: Option<Arc<Poller<AssignmentRecord>>>,
    handles: Mutex<Vec<ScheduleHandle>>,
    running: AtomicBool,
}

impl std::fmt::Debug for IngestionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestionEngine")
            .field("telemetry_poller", &self.telemetry_poller)
            .field("assignment_poller", &self.assignment_poller)
            .field("scheduler", &self.scheduler)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl IngestionEngine {
    pub fn builder(config: FleetSyncConfig) -> IngestionEngineBuilder {
        IngestionEngineBuilder::new(config)
    }

    /// Register every poll, health and sweep trigger with the scheduler
    pub fn start(&self) -> FleetSyncResult<()> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(FleetSyncError::SchedulerError(
                "ingestion engine already started".to_string(),
            ));
        }

        let registered = self.register_triggers();
        if let Err(e) = registered {
            warn!(error = %e, "Failed to register triggers, rolling back");
            self.cancel_triggers();
            self.running.store(false, Ordering::Release);
            return Err(e);
        }

        info!(
            registrations = self.handles.lock().len(),
            "▶️ Ingestion engine started"
        );
        Ok(())
    }

    fn register_triggers(&self) -> FleetSyncResult<()> {
        if let Some(poller) = &self.telemetry_poller {
            self.register_poller(poller)?;
        }
        if let Some(poller) = &self.assignment_poller {
            self.register_poller(poller)?;
        }

        let correlator = Arc::clone(&self.correlator);
        let retention = self.config.correlation.retention();
        let handle = self.scheduler.schedule(
            SWEEP_TRIGGER,
            self.config.correlation.sweep_interval(),
            trigger_fn(move || {
                let correlator = Arc::clone(&correlator);
                async move {
                    let report = correlator.sweep_and_report(retention);
                    log_sweep(&report);
                }
            }),
        )?;
        self.handles.lock().push(handle);
        Ok(())
    }

    fn register_poller<R: ProviderRecord>(&self, poller: &Arc<Poller<R>>) -> FleetSyncResult<()> {
        let config = poller.config();
        let name = poller.provider_name();

        let poll = self.scheduler.schedule(
            &poll_trigger_name(name),
            config.poll_interval,
            poller.trigger_callback(),
        )?;
        self.handles.lock().push(poll);

        let health = self.scheduler.schedule(
            &health_trigger_name(name),
            config.health_check_interval,
            poller.health_check_callback(),
        )?;
        self.handles.lock().push(health);
        Ok(())
    }

    fn cancel_triggers(&self) {
        for handle in self.handles.lock().drain(..) {
            handle.cancel();
        }
    }

    /// Cancel this engine's triggers, and shut the scheduler down when the
    /// engine created it
    ///
    /// An injected scheduler may carry other registrations and is left
    /// running. Cycles already in flight run to completion.
    pub fn shutdown(&self) {
        self.cancel_triggers();
        if self.owns_scheduler {
            self.scheduler.shutdown();
        }
        if self.running.swap(false, Ordering::AcqRel) {
            info!("⏹️ Ingestion engine stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Run one staleness sweep immediately
    pub fn run_sweep(&self) -> SweepReport {
        let report = self
            .correlator
            .sweep_and_report(self.config.correlation.retention());
        log_sweep(&report);
        report
    }

    /// Type-erased view of every enabled poller
    pub fn pollers(&self) -> Vec<Arc<dyn PollingTask>> {
        let mut pollers: Vec<Arc<dyn PollingTask>> = Vec::new();
        if let Some(poller) = &self.telemetry_poller {
            pollers.push(poller.clone());
        }
        if let Some(poller) = &self.assignment_poller {
            pollers.push(poller.clone());
        }
        pollers
    }

    pub fn health_report(&self) -> EngineHealthReport {
        let providers = self
            .pollers()
            .iter()
            .map(|poller| poller.health_check())
            .collect();

        let report = EngineHealthReport::new(providers, self.correlator.health(), self.clock.now());
        log_health_report(&report);
        report
    }

    pub fn config(&self) -> &FleetSyncConfig {
        &self.config
    }

    pub fn correlator(&self) -> &Arc<Correlator> {
        &self.correlator
    }

    pub fn telemetry_poller(&self) -> Option<&Arc<Poller<TelemetrySample>>> {
        self.telemetry_poller.as_ref()
    }

    pub fn assignment_poller(&self) -> Option<&Arc<Poller<AssignmentRecord>>> {
        self.assignment_poller.as_ref()
    }
}

impl Drop for IngestionEngine {
    fn drop(&mut self) {
        for handle in self.handles.get_mut().drain(..) {
            handle.cancel();
        }
    }
}
