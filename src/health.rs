//! # Health Reporting
//!
//! Read-only health snapshots for providers, the correlation store and the
//! engine as a whole. These are consumed by external health-check and
//! metrics collaborators; nothing in the engine changes behaviour based on
//! them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::models::CorrelationStatistics;
use crate::resilience::CircuitState;

/// Coarse health classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
    /// Not enough data to judge
    Unknown,
}

impl HealthStatus {
    /// Severity level (0 = healthy, 10 = critical)
    pub fn severity_level(&self) -> u8 {
        match self {
            HealthStatus::Healthy => 0,
            HealthStatus::Unknown => 2,
            HealthStatus::Degraded => 5,
            HealthStatus::Unhealthy => 10,
        }
    }

    /// The more severe of two statuses
    pub fn worst(self, other: HealthStatus) -> HealthStatus {
        if other.severity_level() > self.severity_level() {
            other
        } else {
            self
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Degraded => write!(f, "degraded"),
            HealthStatus::Unhealthy => write!(f, "unhealthy"),
            HealthStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// Observability snapshot of one provider's poller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderHealth {
    pub provider: String,
    pub status: HealthStatus,
    /// Successful cycles over accepted cycles; 1.0 before the first cycle
    pub success_rate: f64,
    pub average_fetch_time: Duration,
    pub consecutive_failures: u64,
    pub breaker_state: CircuitState,
    pub poll_count: u64,
    pub skipped_count: u64,
    pub fallback_count: u64,
    pub last_poll_at: Option<DateTime<Utc>>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub checked_at: DateTime<Utc>,
}

impl ProviderHealth {
    /// Derive a status from breaker state and the consecutive failure streak
    pub fn classify(
        breaker_state: CircuitState,
        consecutive_failures: u64,
        unhealthy_after: u64,
        poll_count: u64,
    ) -> HealthStatus {
        match breaker_state {
            CircuitState::Open => HealthStatus::Unhealthy,
            CircuitState::HalfOpen => HealthStatus::Degraded,
            CircuitState::Closed if consecutive_failures >= unhealthy_after => {
                HealthStatus::Unhealthy
            }
            CircuitState::Closed if consecutive_failures > 0 => HealthStatus::Degraded,
            CircuitState::Closed if poll_count == 0 => HealthStatus::Unknown,
            CircuitState::Closed => HealthStatus::Healthy,
        }
    }
}

/// Aggregate health of the correlation store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationHealth {
    pub statistics: CorrelationStatistics,
    pub completeness_ratio: f64,
    pub freshness_ratio: f64,
    /// Weighted score in 0..=100
    pub score: u8,
    pub status: HealthStatus,
    pub computed_at: DateTime<Utc>,
}

impl CorrelationHealth {
    const COMPLETENESS_WEIGHT: f64 = 0.6;
    const FRESHNESS_WEIGHT: f64 = 0.4;

    pub fn from_statistics(statistics: CorrelationStatistics, computed_at: DateTime<Utc>) -> Self {
        let completeness_ratio = statistics.completeness_ratio();
        let freshness_ratio = statistics.freshness_ratio();

        if statistics.total == 0 {
            return Self {
                statistics,
                completeness_ratio,
                freshness_ratio,
                score: 0,
                status: HealthStatus::Unknown,
                computed_at,
            };
        }

        let weighted = completeness_ratio * Self::COMPLETENESS_WEIGHT
            + freshness_ratio * Self::FRESHNESS_WEIGHT;
        let score = (weighted * 100.0).round().clamp(0.0, 100.0) as u8;

        let status = match score {
            80..=100 => HealthStatus::Healthy,
            50..=79 => HealthStatus::Degraded,
            _ => HealthStatus::Unhealthy,
        };

        Self {
            statistics,
            completeness_ratio,
            freshness_ratio,
            score,
            status,
            computed_at,
        }
    }
}

/// Engine-wide health report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineHealthReport {
    pub status: HealthStatus,
    pub providers: Vec<ProviderHealth>,
    pub correlation: CorrelationHealth,
    pub generated_at: DateTime<Utc>,
}

impl EngineHealthReport {
    pub fn new(
        providers: Vec<ProviderHealth>,
        correlation: CorrelationHealth,
        generated_at: DateTime<Utc>,
    ) -> Self {
        let status = providers
            .iter()
            .map(|p| p.status)
            .fold(correlation.status, HealthStatus::worst);

        Self {
            status,
            providers,
            correlation,
            generated_at,
        }
    }
}
