//! # Resilience Module
//!
//! Fault tolerance primitives used by the pollers: retry with exponential
//! backoff, a sliding-window circuit breaker per provider, and fallback
//! strategies that supply degraded results instead of hard failures.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use fleet_sync::clock::SystemClock;
//! use fleet_sync::error::FetchError;
//! use fleet_sync::resilience::{CircuitBreaker, CircuitBreakerConfig, RetryExecutor, RetryPolicy};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let breaker = CircuitBreaker::new("gps_primary", CircuitBreakerConfig::for_provider(), SystemClock::shared());
//! let policy = RetryPolicy::transient_only(3, Duration::from_millis(500))?;
//!
//! if breaker.allow_call() {
//!     let result = RetryExecutor::new("gps_primary")
//!         .execute(|| async { Ok::<_, FetchError>(vec![1, 2, 3]) }, &policy)
//!         .await;
//!     breaker.record_outcome(result.is_ok());
//! }
//! # Ok(())
//! # }
//! ```

pub mod circuit_breaker;
pub mod config;
pub mod fallback;
pub mod metrics;
pub mod retry;

pub use circuit_breaker::{CircuitBreaker, CircuitState};
pub use config::CircuitBreakerConfig;
pub use fallback::{
    AlternateProviderFallback, CacheFallback, FallbackCause, FallbackResult, FallbackSource,
    FallbackStrategy, InMemoryLastKnownGood, LastKnownGood, NoFallback,
};
pub use metrics::CircuitBreakerMetrics;
pub use retry::{execute_with_retry, RetryClassifier, RetryExecutor, RetryPolicy};
