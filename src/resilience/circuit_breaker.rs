//! # Circuit Breaker Implementation
//!
//! Sliding-window circuit breaker with three states: Closed (normal
//! operation), Open (failing fast) and Half-Open (one trial call admitted).
//!
//! Each breaker is owned by exactly one poller and is driven by that poller's
//! sequential cycles. The window lives behind an uncontended mutex so the
//! breaker stays `Sync`; the state itself is an atomic so health checks can
//! read it without touching the window.

use crate::clock::{elapsed_between, SharedClock};
use crate::resilience::{CircuitBreakerConfig, CircuitBreakerMetrics};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU8, Ordering};
use tracing::{debug, error, info, warn};

/// Circuit breaker states representing the current operational mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CircuitState {
    /// Normal operation - all calls are allowed through
    Closed = 0,
    /// Failure mode - all calls fail fast without executing
    Open = 1,
    /// Testing recovery - a single trial call is admitted
    HalfOpen = 2,
}

impl From<u8> for CircuitState {
    fn from(value: u8) -> Self {
        match value {
            0 => CircuitState::Closed,
            1 => CircuitState::Open,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Open, // Default to safest state
        }
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half_open"),
        }
    }
}

#[derive(Debug, Default)]
struct BreakerWindow {
    /// Most recent outcomes, `true` for success
    outcomes: VecDeque<bool>,
    opened_at: Option<DateTime<Utc>>,
    trial_in_flight: bool,
    total_calls: u64,
    success_count: u64,
    failure_count: u64,
    rejected_calls: u64,
    state_transitions: u64,
}

impl BreakerWindow {
    fn failure_rate(&self) -> f64 {
        if self.outcomes.is_empty() {
            return 0.0;
        }
        let failures = self.outcomes.iter().filter(|success| !**success).count();
        failures as f64 / self.outcomes.len() as f64
    }

    fn push(&mut self, success: bool, capacity: usize) {
        if self.outcomes.len() == capacity {
            self.outcomes.pop_front();
        }
        self.outcomes.push_back(success);
    }
}

/// Sliding-window circuit breaker guarding one provider
#[derive(Debug)]
pub struct CircuitBreaker {
    /// Component name for logging and metrics
    name: String,

    /// Current circuit state (atomic for lock-free reads)
    state: AtomicU8,

    config: CircuitBreakerConfig,

    clock: SharedClock,

    window: Mutex<BreakerWindow>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig, clock: SharedClock) -> Self {
        let name = name.into();
        info!(
            component = %name,
            window_size = config.window_size,
            failure_rate_threshold = config.failure_rate_threshold,
            minimum_calls = config.minimum_calls,
            cooldown_seconds = config.cooldown.as_secs(),
            "🛡️ Circuit breaker initialized"
        );

        Self {
            name,
            state: AtomicU8::new(CircuitState::Closed as u8),
            window: Mutex::new(BreakerWindow {
                outcomes: VecDeque::with_capacity(config.window_size),
                ..BreakerWindow::default()
            }),
            config,
            clock,
        }
    }

    /// Get current circuit state
    pub fn state(&self) -> CircuitState {
        CircuitState::from(self.state.load(Ordering::Acquire))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Ask permission to invoke the guarded operation
    ///
    /// An open breaker whose cooldown has elapsed moves to half-open and
    /// admits the caller as the single trial call.
    pub fn allow_call(&self) -> bool {
        let mut window = self.window.lock();

        match self.state() {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let now = self.clock.now();
                let cooled_down = match window.opened_at {
                    Some(opened_at) => elapsed_between(opened_at, now) >= self.config.cooldown,
                    None => {
                        warn!(component = %self.name, "Circuit open but no timestamp recorded");
                        true
                    }
                };

                if cooled_down {
                    self.transition_to_half_open(&mut window);
                    window.trial_in_flight = true;
                    true
                } else {
                    window.rejected_calls += 1;
                    debug!(component = %self.name, "Call rejected by open circuit");
                    false
                }
            }
            CircuitState::HalfOpen => {
                if window.trial_in_flight {
                    window.rejected_calls += 1;
                    false
                } else {
                    window.trial_in_flight = true;
                    true
                }
            }
        }
    }

    /// Record the outcome of an admitted call
    pub fn record_outcome(&self, success: bool) {
        let mut window = self.window.lock();
        window.total_calls += 1;
        if success {
            window.success_count += 1;
        } else {
            window.failure_count += 1;
        }

        match self.state() {
            CircuitState::Closed => {
                window.push(success, self.config.window_size);
                if !success
                    && window.outcomes.len() >= self.config.minimum_calls
                    && window.failure_rate() >= self.config.failure_rate_threshold
                {
                    self.transition_to_open(&mut window);
                }
            }
            CircuitState::HalfOpen => {
                window.trial_in_flight = false;
                if success {
                    self.transition_to_closed(&mut window);
                } else {
                    self.transition_to_open(&mut window);
                }
            }
            CircuitState::Open => {
                // Late outcome from a call admitted before the breaker opened
                debug!(
                    component = %self.name,
                    success = success,
                    "Outcome recorded while circuit is open"
                );
            }
        }
    }

    fn transition_to_closed(&self, window: &mut BreakerWindow) {
        self.state.store(CircuitState::Closed as u8, Ordering::Release);
        window.outcomes.clear();
        window.opened_at = None;
        window.trial_in_flight = false;
        window.state_transitions += 1;

        info!(
            component = %self.name,
            total_calls = window.total_calls,
            "🟢 Circuit breaker closed (recovered)"
        );
    }

    fn transition_to_open(&self, window: &mut BreakerWindow) {
        self.state.store(CircuitState::Open as u8, Ordering::Release);
        window.opened_at = Some(self.clock.now());
        window.trial_in_flight = false;
        window.state_transitions += 1;

        error!(
            component = %self.name,
            window_failure_rate = window.failure_rate(),
            failure_rate_threshold = self.config.failure_rate_threshold,
            cooldown_seconds = self.config.cooldown.as_secs(),
            "🔴 Circuit breaker opened (failing fast)"
        );
    }

    fn transition_to_half_open(&self, window: &mut BreakerWindow) {
        self.state.store(CircuitState::HalfOpen as u8, Ordering::Release);
        window.state_transitions += 1;

        info!(
            component = %self.name,
            "🟡 Circuit breaker half-open (admitting trial call)"
        );
    }

    /// Force circuit to open state (for emergency situations)
    pub fn force_open(&self) {
        warn!(component = %self.name, "🚨 Circuit breaker forced open");
        let mut window = self.window.lock();
        self.transition_to_open(&mut window);
    }

    /// Force circuit to closed state (for emergency recovery)
    pub fn force_closed(&self) {
        warn!(component = %self.name, "🚨 Circuit breaker forced closed");
        let mut window = self.window.lock();
        self.transition_to_closed(&mut window);
    }

    /// Get current metrics snapshot
    pub fn metrics(&self) -> CircuitBreakerMetrics {
        let window = self.window.lock();
        CircuitBreakerMetrics {
            total_calls: window.total_calls,
            success_count: window.success_count,
            failure_count: window.failure_count,
            rejected_calls: window.rejected_calls,
            window_samples: window.outcomes.len(),
            window_failure_rate: window.failure_rate(),
            state_transitions: window.state_transitions,
            current_state: self.state(),
            opened_at: window.opened_at,
        }
    }

    /// Closed and below the configured failure-rate threshold
    pub fn is_healthy(&self) -> bool {
        if self.state() != CircuitState::Closed {
            return false;
        }
        self.window.lock().failure_rate() < self.config.failure_rate_threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::sync::Arc;
    use std::time::Duration;

    fn breaker(clock: Arc<ManualClock>) -> CircuitBreaker {
        let config = CircuitBreakerConfig {
            window_size: 10,
            failure_rate_threshold: 0.5,
            minimum_calls: 10,
            cooldown: Duration::from_secs(30),
        };
        CircuitBreaker::new("test", config, clock)
    }

    #[test]
    fn test_circuit_breaker_normal_operation() {
        let circuit = breaker(ManualClock::starting_now());

        assert_eq!(circuit.state(), CircuitState::Closed);
        assert!(circuit.allow_call());
        circuit.record_outcome(true);

        let metrics = circuit.metrics();
        assert_eq!(metrics.total_calls, 1);
        assert_eq!(metrics.success_count, 1);
        assert_eq!(metrics.failure_count, 0);
        assert!(circuit.is_healthy());
    }

    #[test]
    fn test_opens_at_half_of_window() {
        let circuit = breaker(ManualClock::starting_now());

        for _ in 0..5 {
            circuit.record_outcome(true);
        }
        for _ in 0..4 {
            circuit.record_outcome(false);
        }
        // 4 failures in 9 samples: below minimum sample count
        assert_eq!(circuit.state(), CircuitState::Closed);

        circuit.record_outcome(false);
        assert_eq!(circuit.state(), CircuitState::Open);
        assert!(!circuit.allow_call());
        assert_eq!(circuit.metrics().rejected_calls, 1);
    }

    #[test]
    fn test_window_slides_past_old_failures() {
        let circuit = breaker(ManualClock::starting_now());

        for _ in 0..4 {
            circuit.record_outcome(false);
        }
        for _ in 0..10 {
            circuit.record_outcome(true);
        }
        // Old failures have been pushed out of the window
        circuit.record_outcome(false);
        assert_eq!(circuit.state(), CircuitState::Closed);
        assert!((circuit.metrics().window_failure_rate - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_half_open_admits_single_trial() {
        let clock = ManualClock::starting_now();
        let circuit = breaker(clock.clone());
        circuit.force_open();

        clock.advance(Duration::from_secs(29));
        assert!(!circuit.allow_call());

        clock.advance(Duration::from_secs(1));
        assert!(circuit.allow_call());
        assert_eq!(circuit.state(), CircuitState::HalfOpen);
        assert!(!circuit.allow_call());

        circuit.record_outcome(true);
        assert_eq!(circuit.state(), CircuitState::Closed);
        assert_eq!(circuit.metrics().window_samples, 0);
    }

    #[test]
    fn test_failed_trial_restarts_cooldown() {
        let clock = ManualClock::starting_now();
        let circuit = breaker(clock.clone());
        circuit.force_open();

        clock.advance(Duration::from_secs(30));
        assert!(circuit.allow_call());
        circuit.record_outcome(false);
        assert_eq!(circuit.state(), CircuitState::Open);

        clock.advance(Duration::from_secs(10));
        assert!(!circuit.allow_call());

        clock.advance(Duration::from_secs(20));
        assert!(circuit.allow_call());
    }

    #[test]
    fn test_force_operations() {
        let circuit = breaker(ManualClock::starting_now());

        circuit.force_open();
        assert_eq!(circuit.state(), CircuitState::Open);
        assert!(circuit.metrics().opened_at.is_some());

        circuit.force_closed();
        assert_eq!(circuit.state(), CircuitState::Closed);
        assert!(circuit.metrics().opened_at.is_none());
    }
}
