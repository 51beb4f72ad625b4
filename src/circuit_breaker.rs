//! # Circuit Breaker Module
//!
//! Stops spawning the diagram renderer after it fails repeatedly, so a broken
//! headless browser install degrades proposals to the placeholder diagram
//! instead of costing every request a full render timeout.

use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::config::RecoveryConfig;

#[derive(Debug, Default)]
struct BreakerState {
    failure_count: u32,
    last_failure_time: Option<Instant>,
}

/// Circuit breaker guarding the rendering subprocess
///
/// # State Machine
///
/// - **Closed**: renders run normally
/// - **Open**: failure threshold reached, renders fail fast
/// - **Reset**: after `circuit_breaker_reset_secs` the breaker closes again
///   and the next render is attempted
#[derive(Debug)]
pub struct CircuitBreaker {
    state: Mutex<BreakerState>,
    config: RecoveryConfig,
}

impl CircuitBreaker {
    /// Create a new circuit breaker
    ///
    /// ```rust
    /// use pitchbot::circuit_breaker::CircuitBreaker;
    /// use pitchbot::config::RecoveryConfig;
    ///
    /// let breaker = CircuitBreaker::new(RecoveryConfig::default());
    /// assert!(!breaker.is_open());
    /// ```
    pub fn new(config: RecoveryConfig) -> Self {
        Self {
            state: Mutex::new(BreakerState::default()),
            config,
        }
    }

    fn state(&self) -> MutexGuard<'_, BreakerState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// `true` while the breaker blocks renders
    pub fn is_open(&self) -> bool {
        let mut state = self.state();
        if state.failure_count < self.config.circuit_breaker_threshold {
            return false;
        }
        let reset_after = Duration::from_secs(self.config.circuit_breaker_reset_secs);
        match state.last_failure_time {
            Some(last) if last.elapsed() < reset_after => true,
            _ => {
                *state = BreakerState::default();
                false
            }
        }
    }

    pub fn record_failure(&self) {
        let mut state = self.state();
        state.failure_count += 1;
        state.last_failure_time = Some(Instant::now());
    }

    pub fn record_success(&self) {
        *self.state() = BreakerState::default();
    }

    pub fn failure_count(&self) -> u32 {
        self.state().failure_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(threshold: u32, reset_secs: u64) -> RecoveryConfig {
        RecoveryConfig {
            circuit_breaker_threshold: threshold,
            circuit_breaker_reset_secs: reset_secs,
        }
    }

    #[test]
    fn test_opens_at_threshold() {
        let breaker = CircuitBreaker::new(config(3, 60));
        breaker.record_failure();
        breaker.record_failure();
        assert!(!breaker.is_open());
        breaker.record_failure();
        assert!(breaker.is_open());
    }

    #[test]
    fn test_success_closes() {
        let breaker = CircuitBreaker::new(config(1, 60));
        breaker.record_failure();
        assert!(breaker.is_open());
        breaker.record_success();
        assert!(!breaker.is_open());
        assert_eq!(breaker.failure_count(), 0);
    }

    #[test]
    fn test_resets_after_timeout() {
        let breaker = CircuitBreaker::new(config(1, 0));
        breaker.record_failure();
        assert!(!breaker.is_open());
        assert_eq!(breaker.failure_count(), 0);
    }
}
