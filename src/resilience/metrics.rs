//! # Circuit Breaker Metrics
//!
//! Point-in-time metrics for a circuit breaker, exposed read-only to health
//! checks and external metrics collectors.

use crate::resilience::CircuitState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metrics snapshot for a single circuit breaker instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitBreakerMetrics {
    /// Total number of outcomes recorded
    pub total_calls: u64,

    /// Number of successful outcomes
    pub success_count: u64,

    /// Number of failed outcomes
    pub failure_count: u64,

    /// Calls rejected without reaching the provider
    pub rejected_calls: u64,

    /// Number of outcomes currently held in the sliding window
    pub window_samples: usize,

    /// Failure rate over the sliding window (0.0 to 1.0)
    pub window_failure_rate: f64,

    /// Number of state transitions since creation
    pub state_transitions: u64,

    /// Current circuit breaker state
    pub current_state: CircuitState,

    /// When the breaker last opened, if it is open or half-open
    pub opened_at: Option<DateTime<Utc>>,
}

impl CircuitBreakerMetrics {
    pub fn new() -> Self {
        Self {
            total_calls: 0,
            success_count: 0,
            failure_count: 0,
            rejected_calls: 0,
            window_samples: 0,
            window_failure_rate: 0.0,
            state_transitions: 0,
            current_state: CircuitState::Closed,
            opened_at: None,
        }
    }

    /// Lifetime success rate; 1.0 when nothing has been recorded yet
    pub fn success_rate(&self) -> f64 {
        if self.total_calls == 0 {
            return 1.0;
        }
        self.success_count as f64 / self.total_calls as f64
    }

    /// Get human-readable state description
    pub fn state_description(&self) -> &'static str {
        match self.current_state {
            CircuitState::Closed => "Healthy - Normal operation",
            CircuitState::Open => "Failing - Rejecting all calls",
            CircuitState::HalfOpen => "Recovering - Admitting trial call",
        }
    }

    /// Format metrics for logging
    pub fn format_summary(&self) -> String {
        format!(
            "State: {} | Calls: {} | Success: {:.1}% | Window failure rate: {:.1}% | Rejected: {}",
            self.state_description(),
            self.total_calls,
            self.success_rate() * 100.0,
            self.window_failure_rate * 100.0,
            self.rejected_calls
        )
    }
}

impl Default for CircuitBreakerMetrics {
    fn default() -> Self {
        Self::new()
    }
}
