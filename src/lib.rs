#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Fleet Sync Core
//!
//! Resilient ingestion engine for vehicle telemetry and route assignment
//! feeds.
//!
//! ## Overview
//!
//! Two upstream providers are polled on independent schedules: a telemetry
//! provider reporting vehicle positions and an assignment provider reporting
//! which route each vehicle is serving. Each provider is wrapped in retry with
//! exponential backoff, a sliding-window circuit breaker and a fallback
//! strategy, so an unreliable provider degrades to stale or alternate data
//! instead of taking the engine down. Successful records are merged into a
//! per-vehicle correlation store that is periodically swept for stale entries.
//!
//! ## Module Organization
//!
//! - [`resilience`] - Retry executor, circuit breaker and fallback strategies
//! - [`polling`] - Single-flight per-provider pollers
//! - [`correlation`] - Concurrent per-vehicle correlation store
//! - [`scheduling`] - Periodic trigger facility (tokio-backed and manual)
//! - [`engine`] - Wiring of pollers, correlator and scheduler
//! - [`health`] - Provider, correlation and engine health snapshots
//! - [`config`] - Layered configuration loading
//! - [`models`] - Telemetry, assignment and correlation records
//! - [`error`] - Structured error handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use fleet_sync::config::ConfigManager;
//! use fleet_sync::engine::IngestionEngine;
//! use fleet_sync::error::FetchError;
//! use fleet_sync::models::{AssignmentRecord, TelemetrySample};
//! use fleet_sync::provider::RecordFetcher;
//! use std::sync::Arc;
//!
//! #[derive(Debug)]
//! struct GpsFeed;
//!
//! #[async_trait]
//! impl RecordFetcher<TelemetrySample> for GpsFeed {
//!     fn provider_name(&self) -> &str {
//!         "telemetry"
//!     }
//!
//!     async fn fetch(&self) -> Result<Vec<TelemetrySample>, FetchError> {
//!         Ok(Vec::new())
//!     }
//! }
//!
//! #[derive(Debug)]
//! struct Roster;
//!
//! #[async_trait]
//! impl RecordFetcher<AssignmentRecord> for Roster {
//!     fn provider_name(&self) -> &str {
//!         "assignments"
//!     }
//!
//!     async fn fetch(&self) -> Result<Vec<AssignmentRecord>, FetchError> {
//!         Ok(Vec::new())
//!     }
//! }
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! fleet_sync::logging::init_structured_logging();
//!
//! let manager = ConfigManager::load()?;
//! let engine = IngestionEngine::builder(manager.config().clone())
//!     .telemetry_fetcher(Arc::new(GpsFeed))
//!     .assignment_fetcher(Arc::new(Roster))
//!     .build()?;
//!
//! engine.start()?;
//! tokio::signal::ctrl_c().await?;
//! engine.shutdown();
//! # Ok(())
//! # }
//! ```

pub mod clock;
pub mod config;
pub mod correlation;
pub mod engine;
pub mod error;
pub mod health;
pub mod logging;
pub mod models;
pub mod polling;
pub mod provider;
pub mod resilience;
pub mod scheduling;

pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use config::{ConfigManager, FleetSyncConfig};
pub use correlation::{Correlator, SweepReport};
pub use engine::{IngestionEngine, IngestionEngineBuilder};
pub use error::{FailureKind, FallbackError, FetchError, FleetSyncError, FleetSyncResult};
pub use health::{CorrelationHealth, EngineHealthReport, HealthStatus, ProviderHealth};
pub use models::{AssignmentRecord, CorrelationEntry, CorrelationStatistics, TelemetrySample};
pub use polling::{BreakerScope, CycleOutcome, Poller, PollerConfig, PollingTask};
pub use provider::{RecordFetcher, RecordSink, SharedFetcher};
pub use resilience::{
    CircuitBreaker, CircuitBreakerConfig, CircuitState, FallbackStrategy, RetryExecutor,
    RetryPolicy,
};
pub use scheduling::{ManualScheduler, Scheduler, TokioScheduler};
