//! # Fallback Strategies
//!
//! Degraded responses used when a provider is unavailable: either the last
//! known-good record set (cache fallback) or a fetch from an alternate
//! provider offering the same capability. A strategy that cannot produce
//! anything reports [`FallbackError::NoFallbackAvailable`]; it never returns
//! an empty default.

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{FallbackError, FetchError};
use crate::provider::{guarded_fetch, SharedFetcher};

/// Why the poller is asking for a fallback
#[derive(Debug, Clone, PartialEq)]
pub enum FallbackCause {
    /// Breaker rejected the cycle without reaching the provider
    CircuitOpen,
    /// Retries exhausted or a non-retryable failure occurred
    Exhausted(FetchError),
}

impl std::fmt::Display for FallbackCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FallbackCause::CircuitOpen => write!(f, "circuit open"),
            FallbackCause::Exhausted(error) => write!(f, "fetch failed: {error}"),
        }
    }
}

/// Where a degraded result came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "provider", rename_all = "snake_case")]
pub enum FallbackSource {
    Cache,
    AlternateProvider(String),
}

impl FallbackSource {
    /// Freshly fetched data, as opposed to a replay of older records
    pub fn is_live(&self) -> bool {
        matches!(self, FallbackSource::AlternateProvider(_))
    }
}

/// Degraded record set returned by a fallback strategy
#[derive(Debug, Clone, PartialEq)]
pub struct FallbackResult<R> {
    pub source: FallbackSource,
    pub records: Vec<R>,
}

#[async_trait]
pub trait FallbackStrategy<R>: Send + Sync + Debug {
    fn strategy_name(&self) -> &'static str;

    async fn fallback(
        &self,
        provider: &str,
        cause: &FallbackCause,
    ) -> Result<FallbackResult<R>, FallbackError>;
}

/// External store of the most recent known-good record set per provider
pub trait LastKnownGood<R>: Send + Sync + Debug {
    fn get(&self, provider: &str) -> Option<Vec<R>>;
}

/// In-process [`LastKnownGood`] store
#[derive(Debug)]
pub struct InMemoryLastKnownGood<R> {
    entries: DashMap<String, Vec<R>>,
}

impl<R> Default for InMemoryLastKnownGood<R> {
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

impl<R: Clone + Send + Sync + Debug> InMemoryLastKnownGood<R> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, provider: impl Into<String>, records: Vec<R>) {
        self.entries.insert(provider.into(), records);
    }

    pub fn clear(&self, provider: &str) {
        self.entries.remove(provider);
    }
}

impl<R: Clone + Send + Sync + Debug> LastKnownGood<R> for InMemoryLastKnownGood<R> {
    fn get(&self, provider: &str) -> Option<Vec<R>> {
        self.entries.get(provider).map(|entry| entry.value().clone())
    }
}

/// Serve the last known-good record set for the failed provider
#[derive(Debug)]
pub struct CacheFallback<R> {
    store: Arc<dyn LastKnownGood<R>>,
}

impl<R> CacheFallback<R> {
    pub fn new(store: Arc<dyn LastKnownGood<R>>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<R: Send + Sync + Debug + 'static> FallbackStrategy<R> for CacheFallback<R> {
    fn strategy_name(&self) -> &'static str {
        "cache"
    }

    async fn fallback(
        &self,
        provider: &str,
        cause: &FallbackCause,
    ) -> Result<FallbackResult<R>, FallbackError> {
        match self.store.get(provider) {
            Some(records) => {
                info!(
                    provider = %provider,
                    cause = %cause,
                    records = records.len(),
                    "Serving last known-good records"
                );
                Ok(FallbackResult {
                    source: FallbackSource::Cache,
                    records,
                })
            }
            None => Err(FallbackError::NoFallbackAvailable {
                provider: provider.to_string(),
                reason: "no last known-good records".to_string(),
            }),
        }
    }
}

/// Fetch once from the first alternate provider not equal to the failed one
///
/// The alternate fetch gets the same watchdog and panic containment as a
/// primary attempt.
#[derive(Debug)]
pub struct AlternateProviderFallback<R> {
    providers: Vec<SharedFetcher<R>>,
    fetch_timeout: Duration,
}

impl<R> AlternateProviderFallback<R> {
    pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new(providers: Vec<SharedFetcher<R>>) -> Self {
        Self {
            providers,
            fetch_timeout: Self::DEFAULT_FETCH_TIMEOUT,
        }
    }

    pub fn with_fetch_timeout(mut self, fetch_timeout: Duration) -> Self {
        self.fetch_timeout = fetch_timeout;
        self
    }

    pub fn fetch_timeout(&self) -> Duration {
        self.fetch_timeout
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.provider_name()).collect()
    }
}

#[async_trait]
impl<R: Send + Sync + Debug + 'static> FallbackStrategy<R> for AlternateProviderFallback<R> {
    fn strategy_name(&self) -> &'static str {
        "alternate_provider"
    }

    async fn fallback(
        &self,
        provider: &str,
        cause: &FallbackCause,
    ) -> Result<FallbackResult<R>, FallbackError> {
        let Some(alternate) = self
            .providers
            .iter()
            .find(|candidate| candidate.provider_name() != provider)
        else {
            return Err(FallbackError::NoFallbackAvailable {
                provider: provider.to_string(),
                reason: "no alternate provider configured".to_string(),
            });
        };

        let alternate_name = alternate.provider_name().to_string();
        debug!(
            provider = %provider,
            alternate = %alternate_name,
            cause = %cause,
            "Fetching from alternate provider"
        );

        match guarded_fetch(alternate.as_ref(), self.fetch_timeout).await {
            Ok(records) => Ok(FallbackResult {
                source: FallbackSource::AlternateProvider(alternate_name),
                records,
            }),
            Err(source) => {
                warn!(
                    provider = %provider,
                    alternate = %alternate_name,
                    error = %source,
                    "Alternate provider failed"
                );
                Err(FallbackError::AlternateFailed {
                    provider: provider.to_string(),
                    alternate: alternate_name,
                    source,
                })
            }
        }
    }
}

/// Strategy for deployments without any degraded path
#[derive(Debug, Default, Clone, Copy)]
pub struct NoFallback;

#[async_trait]
impl<R: Send + Sync + 'static> FallbackStrategy<R> for NoFallback {
    fn strategy_name(&self) -> &'static str {
        "none"
    }

    async fn fallback(
        &self,
        provider: &str,
        _cause: &FallbackCause,
    ) -> Result<FallbackResult<R>, FallbackError> {
        Err(FallbackError::NoFallbackAvailable {
            provider: provider.to_string(),
            reason: "fallback disabled".to_string(),
        })
    }
}
