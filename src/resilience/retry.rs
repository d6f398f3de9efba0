//! # Retry With Exponential Backoff
//!
//! Call-scoped retry wrapper around any fallible async operation. Failures are
//! classified by a caller-supplied [`RetryClassifier`]; only
//! [`FailureKind::Transient`] failures are retried. The delay before retry `n`
//! (attempts counted from 1) is `base_delay * 2^(n-1)`, optionally capped.
//!
//! The executor holds no state between calls. At most one attempt is
//! outstanding at a time: the next attempt starts only after the previous
//! future settles and the backoff sleep completes.
//!
//! ```rust
//! use fleet_sync::error::FetchError;
//! use fleet_sync::resilience::{RetryExecutor, RetryPolicy};
//! use std::sync::atomic::{AtomicU32, Ordering};
//! use std::time::Duration;
//!
//! # tokio_test::block_on(async {
//! let policy = RetryPolicy::transient_only(3, Duration::from_millis(1)).unwrap();
//! let attempts = AtomicU32::new(0);
//!
//! let result = RetryExecutor::new("telemetry")
//!     .execute(
//!         || async {
//!             if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
//!                 Err(FetchError::Timeout {
//!                     provider: "telemetry".to_string(),
//!                     elapsed: Duration::from_secs(10),
//!                 })
//!             } else {
//!                 Ok(42)
//!             }
//!         },
//!         &policy,
//!     )
//!     .await;
//!
//! assert_eq!(result.unwrap(), 42);
//! assert_eq!(attempts.load(Ordering::SeqCst), 2);
//! # });
//! ```

use crate::error::{FailureKind, FetchError, FleetSyncError, FleetSyncResult};
use std::fmt::{self, Debug, Display};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Explicit failure classification injected into a retry policy
pub type RetryClassifier<E> = Arc<dyn Fn(&E) -> FailureKind + Send + Sync>;

/// Immutable retry policy supplied per call site
pub struct RetryPolicy<E> {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Option<Duration>,
    classifier: RetryClassifier<E>,
}

impl<E> Clone for RetryPolicy<E> {
    fn clone(&self) -> Self {
        Self {
            max_attempts: self.max_attempts,
            base_delay: self.base_delay,
            max_delay: self.max_delay,
            classifier: Arc::clone(&self.classifier),
        }
    }
}

impl<E> Debug for RetryPolicy<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish_non_exhaustive()
    }
}

impl<E> RetryPolicy<E> {
    pub fn new(
        max_attempts: u32,
        base_delay: Duration,
        classifier: RetryClassifier<E>,
    ) -> FleetSyncResult<Self> {
        if max_attempts == 0 {
            return Err(FleetSyncError::ConfigurationError(
                "max_attempts must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            max_attempts,
            base_delay,
            max_delay: None,
            classifier,
        })
    }

    /// Cap every computed backoff delay at `max_delay`
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = Some(max_delay);
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    pub fn classify(&self, failure: &E) -> FailureKind {
        (self.classifier)(failure)
    }

    pub fn is_retryable(&self, failure: &E) -> bool {
        self.classify(failure) == FailureKind::Transient
    }

    /// Delay to wait after failed attempt number `attempt` (1-based)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let factor = 2u32.checked_pow(exponent).unwrap_or(u32::MAX);
        let delay = self.base_delay.checked_mul(factor).unwrap_or(Duration::MAX);

        match self.max_delay {
            Some(cap) => delay.min(cap),
            None => delay,
        }
    }
}

impl RetryPolicy<FetchError> {
    /// Retry exactly the failures [`FetchError::kind`] reports as transient
    pub fn transient_only(max_attempts: u32, base_delay: Duration) -> FleetSyncResult<Self> {
        Self::new(max_attempts, base_delay, Arc::new(FetchError::kind))
    }
}

/// Retry executor carrying a label for structured logs
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    label: String,
}

impl RetryExecutor {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Run `operation` until it succeeds, fails permanently or exhausts the policy
    ///
    /// The failure of the final attempt is returned unchanged.
    pub async fn execute<T, E, F, Fut>(&self, mut operation: F, policy: &RetryPolicy<E>) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut attempt: u32 = 1;

        loop {
            let failure = match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(operation = %self.label, attempt = attempt, "Operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(failure) => failure,
            };

            let kind = policy.classify(&failure);
            if kind == FailureKind::Permanent {
                warn!(
                    operation = %self.label,
                    attempt = attempt,
                    error = %failure,
                    "Non-retryable failure, giving up"
                );
                return Err(failure);
            }

            if attempt >= policy.max_attempts {
                error!(
                    operation = %self.label,
                    attempts = attempt,
                    error = %failure,
                    "Retry attempts exhausted"
                );
                return Err(failure);
            }

            let delay = policy.delay_for_attempt(attempt);
            warn!(
                operation = %self.label,
                attempt = attempt,
                max_attempts = policy.max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %failure,
                "Transient failure, retrying after backoff"
            );

            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

/// Convenience wrapper around [`RetryExecutor::execute`] with a generic label
pub async fn execute_with_retry<T, E, F, Fut>(operation: F, policy: &RetryPolicy<E>) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    RetryExecutor::new("operation").execute(operation, policy).await
}
