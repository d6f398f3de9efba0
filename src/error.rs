//! Error types for the fleet sync engine.
//!
//! Provider failures are modelled by [`FetchError`], whose [`FetchError::kind`]
//! gives the explicit transient/permanent classification consumed by retry
//! policies. Crate-level plumbing errors use [`FleetSyncError`].

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Crate-level error for configuration, scheduling and validation plumbing
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FleetSyncError {
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
    #[error("Scheduler error: {0}")]
    SchedulerError(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for FleetSyncError {
    fn from(error: serde_json::Error) -> Self {
        FleetSyncError::ValidationError(format!("JSON serialization error: {error}"))
    }
}

pub type FleetSyncResult<T> = std::result::Result<T, FleetSyncError>;

/// Closed set of failure kinds a retry classifier can return
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// May succeed if attempted again
    Transient,
    /// Will never succeed if retried
    Permanent,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::Transient => write!(f, "transient"),
            FailureKind::Permanent => write!(f, "permanent"),
        }
    }
}

/// Failure reported by a provider fetch adapter
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Upstream refused the connection
    #[error("Connection refused by {provider}: {reason}")]
    ConnectionRefused { provider: String, reason: String },

    /// Attempt exceeded its deadline
    #[error("Fetch from {provider} timed out after {elapsed:?}")]
    Timeout { provider: String, elapsed: Duration },

    /// Provider host could not be resolved
    #[error("Name resolution failed for {provider}: {host}")]
    NameResolution { provider: String, host: String },

    /// Upstream reported itself unavailable (503 and friends)
    #[error("Provider {provider} unavailable: {reason}")]
    Unavailable { provider: String, reason: String },

    /// Payload could not be decoded or failed validation
    #[error("Malformed payload from {provider}: {reason}")]
    MalformedPayload { provider: String, reason: String },

    /// Credentials rejected by the provider
    #[error("Unauthorized by {provider}: {reason}")]
    Unauthorized { provider: String, reason: String },

    /// Programming error inside the adapter
    #[error("Internal adapter error for {provider}: {reason}")]
    Internal { provider: String, reason: String },

    /// Rejected by the circuit breaker without reaching the provider
    #[error("Circuit breaker open for {provider}")]
    CircuitOpen { provider: String },
}

impl FetchError {
    /// Explicit classification used by the default retry policy
    pub fn kind(&self) -> FailureKind {
        match self {
            FetchError::ConnectionRefused { .. }
            | FetchError::Timeout { .. }
            | FetchError::NameResolution { .. }
            | FetchError::Unavailable { .. } => FailureKind::Transient,
            FetchError::MalformedPayload { .. }
            | FetchError::Unauthorized { .. }
            | FetchError::Internal { .. }
            | FetchError::CircuitOpen { .. } => FailureKind::Permanent,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind() == FailureKind::Transient
    }

    /// Name of the provider the failure originated from
    pub fn provider(&self) -> &str {
        match self {
            FetchError::ConnectionRefused { provider, .. }
            | FetchError::Timeout { provider, .. }
            | FetchError::NameResolution { provider, .. }
            | FetchError::Unavailable { provider, .. }
            | FetchError::MalformedPayload { provider, .. }
            | FetchError::Unauthorized { provider, .. }
            | FetchError::Internal { provider, .. }
            | FetchError::CircuitOpen { provider } => provider,
        }
    }

    /// Short machine-readable code for logs and health reports
    pub fn code(&self) -> &'static str {
        match self {
            FetchError::ConnectionRefused { .. } => "connection_refused",
            FetchError::Timeout { .. } => "timeout",
            FetchError::NameResolution { .. } => "name_resolution",
            FetchError::Unavailable { .. } => "unavailable",
            FetchError::MalformedPayload { .. } => "malformed_payload",
            FetchError::Unauthorized { .. } => "unauthorized",
            FetchError::Internal { .. } => "internal",
            FetchError::CircuitOpen { .. } => "circuit_open",
        }
    }
}

/// Outcome of a fallback strategy that could not produce a degraded result
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FallbackError {
    #[error("No fallback available for {provider}: {reason}")]
    NoFallbackAvailable { provider: String, reason: String },

    #[error("Alternate provider {alternate} failed while covering for {provider}: {source}")]
    AlternateFailed {
        provider: String,
        alternate: String,
        #[source]
        source: FetchError,
    },

    /// The strategy itself stalled past its deadline or panicked
    #[error("Fallback strategy {strategy} failed for {provider}: {reason}")]
    StrategyFailed {
        provider: String,
        strategy: String,
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        let errors = [
            FetchError::ConnectionRefused {
                provider: "gps".to_string(),
                reason: "refused".to_string(),
            },
            FetchError::Timeout {
                provider: "gps".to_string(),
                elapsed: Duration::from_secs(5),
            },
            FetchError::NameResolution {
                provider: "gps".to_string(),
                host: "gps.example".to_string(),
            },
            FetchError::Unavailable {
                provider: "gps".to_string(),
                reason: "503".to_string(),
            },
        ];

        for error in errors {
            assert_eq!(error.kind(), FailureKind::Transient, "{error}");
            assert!(error.is_transient());
        }
    }

    #[test]
    fn test_permanent_classification() {
        let malformed = FetchError::MalformedPayload {
            provider: "roster".to_string(),
            reason: "missing vehicle id".to_string(),
        };
        let unauthorized = FetchError::Unauthorized {
            provider: "roster".to_string(),
            reason: "token expired".to_string(),
        };
        let open = FetchError::CircuitOpen {
            provider: "roster".to_string(),
        };

        assert_eq!(malformed.kind(), FailureKind::Permanent);
        assert_eq!(unauthorized.kind(), FailureKind::Permanent);
        assert_eq!(open.kind(), FailureKind::Permanent);
        assert_eq!(open.provider(), "roster");
        assert_eq!(malformed.code(), "malformed_payload");
    }

    #[test]
    fn test_fallback_error_display() {
        let error = FallbackError::AlternateFailed {
            provider: "gps_primary".to_string(),
            alternate: "gps_backup".to_string(),
            source: FetchError::Unavailable {
                provider: "gps_backup".to_string(),
                reason: "maintenance".to_string(),
            },
        };

        let message = error.to_string();
        assert!(message.contains("gps_backup"));
        assert!(message.contains("gps_primary"));
    }
}
