//! # Configuration
//!
//! Layered configuration for the ingestion engine: a base TOML file, an
//! optional environment override file and `FLEET_SYNC__` environment
//! variables, merged by [`ConfigManager`].
//!
//! Durations are stored as integer milliseconds or seconds (the suffix names
//! the unit) and converted into the runtime types through the `to_*`
//! helpers.

pub mod error;
pub mod loader;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{FetchError, FleetSyncResult};
use crate::polling::{BreakerScope, PollerConfig};
use crate::resilience::{CircuitBreakerConfig, RetryPolicy};

/// Root engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetSyncConfig {
    pub telemetry_provider: ProviderConfig,
    pub assignment_provider: ProviderConfig,
    pub correlation: CorrelationConfig,
}

impl Default for FleetSyncConfig {
    fn default() -> Self {
        Self {
            telemetry_provider: ProviderConfig {
                name: "telemetry".to_string(),
                poll_interval_ms: 30_000,
                ..ProviderConfig::default()
            },
            assignment_provider: ProviderConfig {
                name: "assignments".to_string(),
                poll_interval_ms: 300_000,
                ..ProviderConfig::default()
            },
            correlation: CorrelationConfig::default(),
        }
    }
}

impl FleetSyncConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        self.telemetry_provider.validate("telemetry_provider")?;
        self.assignment_provider.validate("assignment_provider")?;
        self.correlation.validate()?;

        if self.telemetry_provider.name == self.assignment_provider.name {
            return Err(ConfigurationError::validation_error(
                "providers",
                format!(
                    "telemetry and assignment providers share the name '{}'",
                    self.telemetry_provider.name
                ),
            ));
        }
        Ok(())
    }
}

/// Degraded path used when a provider cannot be reached
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackMode {
    #[default]
    None,
    /// Replay the provider's last known-good record set
    Cache,
    /// Fetch once from an alternate provider of the same record type
    AlternateProvider,
}

/// Settings for one provider's poller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub name: String,
    pub enabled: bool,
    pub poll_interval_ms: u64,
    pub health_check_interval_seconds: u64,
    pub fetch_timeout_ms: u64,
    pub validate_records: bool,
    pub unhealthy_after_failures: u64,
    pub breaker_scope: BreakerScope,
    pub fallback: FallbackMode,
    pub retry: RetryConfig,
    pub circuit_breaker: CircuitBreakerSection,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            enabled: true,
            poll_interval_ms: 30_000,
            health_check_interval_seconds: 60,
            fetch_timeout_ms: 10_000,
            validate_records: true,
            unhealthy_after_failures: 3,
            breaker_scope: BreakerScope::PerCycle,
            fallback: FallbackMode::None,
            retry: RetryConfig::default(),
            circuit_breaker: CircuitBreakerSection::default(),
        }
    }
}

impl ProviderConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn health_check_interval(&self) -> Duration {
        Duration::from_secs(self.health_check_interval_seconds)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn to_poller_config(&self) -> PollerConfig {
        PollerConfig {
            poll_interval: self.poll_interval(),
            health_check_interval: self.health_check_interval(),
            fetch_timeout: self.fetch_timeout(),
            breaker_scope: self.breaker_scope,
            validate_records: self.validate_records,
            unhealthy_after_failures: self.unhealthy_after_failures,
        }
    }

    pub fn to_retry_policy(&self) -> FleetSyncResult<RetryPolicy<FetchError>> {
        let policy = RetryPolicy::transient_only(
            self.retry.max_attempts,
            Duration::from_millis(self.retry.base_delay_ms),
        )?;

        Ok(match self.retry.max_delay_ms {
            Some(max_delay_ms) => policy.with_max_delay(Duration::from_millis(max_delay_ms)),
            None => policy,
        })
    }

    pub fn to_breaker_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            window_size: self.circuit_breaker.window_size,
            failure_rate_threshold: self.circuit_breaker.failure_rate_threshold,
            minimum_calls: self.circuit_breaker.minimum_calls,
            cooldown: Duration::from_secs(self.circuit_breaker.cooldown_seconds),
        }
    }

    pub fn validate(&self, section: &str) -> ConfigResult<()> {
        if self.name.trim().is_empty() {
            return Err(ConfigurationError::validation_error(
                section,
                "provider name must not be empty",
            ));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                format!("{section}.poll_interval_ms"),
                self.poll_interval_ms,
                "must be greater than 0",
            ));
        }
        if self.health_check_interval_seconds == 0 {
            return Err(ConfigurationError::invalid_value(
                format!("{section}.health_check_interval_seconds"),
                self.health_check_interval_seconds,
                "must be greater than 0",
            ));
        }
        if self.fetch_timeout_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                format!("{section}.fetch_timeout_ms"),
                self.fetch_timeout_ms,
                "must be greater than 0",
            ));
        }
        if self.unhealthy_after_failures == 0 {
            return Err(ConfigurationError::invalid_value(
                format!("{section}.unhealthy_after_failures"),
                self.unhealthy_after_failures,
                "must be greater than 0",
            ));
        }

        self.retry.validate(section)?;
        self.to_breaker_config()
            .validate()
            .map_err(|reason| ConfigurationError::validation_error(format!("{section}.circuit_breaker"), reason))
    }
}

/// Retry settings for a provider fetch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    /// Optional cap applied to every backoff delay
    pub max_delay_ms: Option<u64>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: None,
        }
    }
}

impl RetryConfig {
    fn validate(&self, section: &str) -> ConfigResult<()> {
        if self.max_attempts == 0 {
            return Err(ConfigurationError::invalid_value(
                format!("{section}.retry.max_attempts"),
                self.max_attempts,
                "must be at least 1",
            ));
        }
        if let Some(max_delay_ms) = self.max_delay_ms {
            if max_delay_ms < self.base_delay_ms {
                return Err(ConfigurationError::invalid_value(
                    format!("{section}.retry.max_delay_ms"),
                    max_delay_ms,
                    "must not be less than base_delay_ms",
                ));
            }
        }
        Ok(())
    }
}

/// Circuit breaker settings as written in configuration files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerSection {
    pub window_size: usize,
    pub failure_rate_threshold: f64,
    pub minimum_calls: usize,
    pub cooldown_seconds: u64,
}

impl Default for CircuitBreakerSection {
    fn default() -> Self {
        let defaults = CircuitBreakerConfig::for_provider();
        Self {
            window_size: defaults.window_size,
            failure_rate_threshold: defaults.failure_rate_threshold,
            minimum_calls: defaults.minimum_calls,
            cooldown_seconds: defaults.cooldown.as_secs(),
        }
    }
}

/// Correlation store maintenance settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrelationConfig {
    pub sweep_interval_seconds: u64,
    /// Entries not updated within this window are evicted by the sweep
    pub retention_seconds: u64,
    /// Entries updated within this window count as recent
    pub recency_threshold_seconds: u64,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            sweep_interval_seconds: 300,
            retention_seconds: 3600,
            recency_threshold_seconds: 1800,
        }
    }
}

impl CorrelationConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_seconds)
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_seconds)
    }

    pub fn recency_threshold(&self) -> Duration {
        Duration::from_secs(self.recency_threshold_seconds)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        for (field, value) in [
            ("sweep_interval_seconds", self.sweep_interval_seconds),
            ("retention_seconds", self.retention_seconds),
            ("recency_threshold_seconds", self.recency_threshold_seconds),
        ] {
            if value == 0 {
                return Err(ConfigurationError::invalid_value(
                    format!("correlation.{field}"),
                    value,
                    "must be greater than 0",
                ));
            }
        }
        Ok(())
    }
}
