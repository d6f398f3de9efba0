//! # Circuit Breaker Configuration
//!
//! Runtime configuration for a single sliding-window circuit breaker. The
//! file-facing shape lives in [`crate::config::CircuitBreakerSection`] and is
//! converted into this struct with `to_breaker_config()`.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a single circuit breaker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Number of most recent outcomes kept in the sliding window
    pub window_size: usize,

    /// Failure rate (0.0 - 1.0) at or above which a closed breaker opens
    pub failure_rate_threshold: f64,

    /// Samples required in the window before the failure rate is evaluated
    pub minimum_calls: usize,

    /// Time to wait in open state before admitting a trial call
    pub cooldown: Duration,
}

impl CircuitBreakerConfig {
    /// Configuration suited to a polled upstream provider
    pub fn for_provider() -> Self {
        Self {
            window_size: 10,
            failure_rate_threshold: 0.5,
            minimum_calls: 10,
            cooldown: Duration::from_secs(60),
        }
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<(), String> {
        if self.window_size == 0 {
            return Err("window_size must be greater than 0".to_string());
        }

        if self.window_size > 1000 {
            return Err("window_size should not exceed 1000".to_string());
        }

        if !(self.failure_rate_threshold > 0.0 && self.failure_rate_threshold <= 1.0) {
            return Err("failure_rate_threshold must be within (0.0, 1.0]".to_string());
        }

        if self.minimum_calls == 0 {
            return Err("minimum_calls must be greater than 0".to_string());
        }

        if self.minimum_calls > self.window_size {
            return Err("minimum_calls cannot exceed window_size".to_string());
        }

        if self.cooldown.is_zero() {
            return Err("cooldown must be greater than 0".to_string());
        }

        Ok(())
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self::for_provider()
    }
}
