//! # Circuit Breaker
//!
//! Lock-free circuit breaker shielding one downstream service. All state
//! lives in atomics so admission checks and outcome recording never block
//! the async executor.
//!
//! State machine:
//!
//! ```text
//! CLOSED --(consecutive failures >= threshold)--> OPEN
//! OPEN   --(open timeout elapsed, lazily on next check)--> HALF_OPEN
//! HALF_OPEN --(successes >= success_threshold)--> CLOSED
//! HALF_OPEN --(any failure)--> OPEN
//! ```
//!
//! The OPEN to HALF_OPEN transition happens lazily on the next admission or
//! state check after the timeout elapses; there is no timer task.

use super::config::CircuitBreakerConfig;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

const STATE_CLOSED: u8 = 0;
const STATE_OPEN: u8 = 1;
const STATE_HALF_OPEN: u8 = 2;

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => f.write_str("closed"),
            Self::Open => f.write_str("open"),
            Self::HalfOpen => f.write_str("half_open"),
        }
    }
}

/// Coarse service health derived from breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// Circuit closed, no recent failures
    Healthy,
    /// Circuit closed but accumulating failures
    Degraded,
    /// Circuit half-open, probing the service
    Recovering,
    /// Circuit open, calls are being rejected
    Unhealthy,
}

/// Point-in-time snapshot of one breaker's counters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerMetrics {
    pub service: String,
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub total_successes: u64,
    pub total_failures: u64,
    pub rejected_calls: u64,
    pub state_transitions: u64,
}

/// Lock-free circuit breaker for one service
#[derive(Debug)]
pub struct CircuitBreaker {
    service: String,
    config: CircuitBreakerConfig,
    state: AtomicU8,
    consecutive_failures: AtomicU32,
    half_open_calls: AtomicU32,
    half_open_successes: AtomicU32,
    /// Epoch nanos of the moment the circuit last opened
    opened_at_nanos: AtomicU64,
    total_successes: AtomicU64,
    total_failures: AtomicU64,
    rejected_calls: AtomicU64,
    state_transitions: AtomicU64,
}

impl CircuitBreaker {
    pub fn new(service: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            service: service.into(),
            config,
            state: AtomicU8::new(STATE_CLOSED),
            consecutive_failures: AtomicU32::new(0),
            half_open_calls: AtomicU32::new(0),
            half_open_successes: AtomicU32::new(0),
            opened_at_nanos: AtomicU64::new(0),
            total_successes: AtomicU64::new(0),
            total_failures: AtomicU64::new(0),
            rejected_calls: AtomicU64::new(0),
            state_transitions: AtomicU64::new(0),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    /// Whether a call may proceed right now.
    ///
    /// OPEN transitions to HALF_OPEN here once the open timeout has
    /// elapsed; while HALF_OPEN, at most `half_open_max_calls` probes are
    /// admitted until an outcome decides the state.
    pub fn should_allow(&self) -> bool {
        match self.current_state() {
            CircuitState::Closed => true,
            CircuitState::Open => {
                self.rejected_calls.fetch_add(1, Ordering::Relaxed);
                false
            }
            CircuitState::HalfOpen => {
                let admitted = self.half_open_calls.fetch_add(1, Ordering::SeqCst);
                if admitted < self.config.half_open_max_calls {
                    true
                } else {
                    self.rejected_calls.fetch_add(1, Ordering::Relaxed);
                    false
                }
            }
        }
    }

    /// Record a successful call
    pub fn record_success(&self) {
        self.total_successes.fetch_add(1, Ordering::Relaxed);

        match self.state.load(Ordering::SeqCst) {
            STATE_HALF_OPEN => {
                let successes = self.half_open_successes.fetch_add(1, Ordering::SeqCst) + 1;
                if successes >= self.config.success_threshold {
                    self.transition(STATE_HALF_OPEN, STATE_CLOSED);
                }
            }
            _ => {
                self.consecutive_failures.store(0, Ordering::SeqCst);
            }
        }
    }

    /// Record a failed call
    pub fn record_failure(&self) {
        self.total_failures.fetch_add(1, Ordering::Relaxed);

        match self.state.load(Ordering::SeqCst) {
            STATE_HALF_OPEN => {
                // A single failed probe re-opens immediately
                self.transition(STATE_HALF_OPEN, STATE_OPEN);
            }
            STATE_CLOSED => {
                let failures = self.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
                if failures >= self.config.failure_threshold {
                    self.transition(STATE_CLOSED, STATE_OPEN);
                }
            }
            _ => {}
        }
    }

    /// Current state, applying the lazy OPEN to HALF_OPEN transition
    pub fn state(&self) -> CircuitState {
        self.current_state()
    }

    pub fn metrics(&self) -> CircuitBreakerMetrics {
        CircuitBreakerMetrics {
            service: self.service.clone(),
            state: self.current_state(),
            consecutive_failures: self.consecutive_failures.load(Ordering::SeqCst),
            total_successes: self.total_successes.load(Ordering::Relaxed),
            total_failures: self.total_failures.load(Ordering::Relaxed),
            rejected_calls: self.rejected_calls.load(Ordering::Relaxed),
            state_transitions: self.state_transitions.load(Ordering::Relaxed),
        }
    }

    /// Coarse health classification for readiness endpoints
    pub fn health(&self) -> HealthStatus {
        match self.current_state() {
            CircuitState::Open => HealthStatus::Unhealthy,
            CircuitState::HalfOpen => HealthStatus::Recovering,
            CircuitState::Closed => {
                if self.consecutive_failures.load(Ordering::SeqCst) > 0 {
                    HealthStatus::Degraded
                } else {
                    HealthStatus::Healthy
                }
            }
        }
    }

    /// Trip the circuit open regardless of failure counts (operator action,
    /// e.g. ahead of a known dependency maintenance window)
    pub fn force_open(&self) {
        let previous = self.state.swap(STATE_OPEN, Ordering::SeqCst);
        self.opened_at_nanos.store(now_nanos(), Ordering::SeqCst);
        if previous != STATE_OPEN {
            self.state_transitions.fetch_add(1, Ordering::Relaxed);
        }
        warn!(service = %self.service, "🛡️ Circuit breaker forced OPEN");
    }

    /// Close the circuit and clear the windowed counters (operator action).
    /// Lifetime totals are preserved.
    pub fn reset(&self) {
        self.state.store(STATE_CLOSED, Ordering::SeqCst);
        self.consecutive_failures.store(0, Ordering::SeqCst);
        self.half_open_calls.store(0, Ordering::SeqCst);
        self.half_open_successes.store(0, Ordering::SeqCst);
        info!(service = %self.service, "🛡️ Circuit breaker reset to CLOSED");
    }

    fn current_state(&self) -> CircuitState {
        match self.state.load(Ordering::SeqCst) {
            STATE_OPEN => {
                let opened_at = self.opened_at_nanos.load(Ordering::SeqCst);
                let elapsed_nanos = now_nanos().saturating_sub(opened_at);
                if elapsed_nanos >= self.config.timeout().as_nanos() as u64 {
                    // Lazy transition; CAS so only one caller wins
                    if self
                        .state
                        .compare_exchange(
                            STATE_OPEN,
                            STATE_HALF_OPEN,
                            Ordering::SeqCst,
                            Ordering::SeqCst,
                        )
                        .is_ok()
                    {
                        self.half_open_calls.store(0, Ordering::SeqCst);
                        self.half_open_successes.store(0, Ordering::SeqCst);
                        self.state_transitions.fetch_add(1, Ordering::Relaxed);
                        debug!(
                            service = %self.service,
                            "🛡️ Circuit breaker open timeout elapsed, probing (HALF_OPEN)"
                        );
                    }
                    CircuitState::HalfOpen
                } else {
                    CircuitState::Open
                }
            }
            STATE_HALF_OPEN => CircuitState::HalfOpen,
            _ => CircuitState::Closed,
        }
    }

    fn transition(&self, from: u8, to: u8) {
        if self
            .state
            .compare_exchange(from, to, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }
        self.state_transitions.fetch_add(1, Ordering::Relaxed);

        match to {
            STATE_OPEN => {
                self.opened_at_nanos.store(now_nanos(), Ordering::SeqCst);
                warn!(
                    service = %self.service,
                    consecutive_failures = self.consecutive_failures.load(Ordering::SeqCst),
                    timeout_seconds = self.config.timeout_seconds,
                    "🛡️ Circuit breaker OPENED"
                );
            }
            STATE_CLOSED => {
                self.consecutive_failures.store(0, Ordering::SeqCst);
                self.half_open_calls.store(0, Ordering::SeqCst);
                self.half_open_successes.store(0, Ordering::SeqCst);
                info!(service = %self.service, "🛡️ Circuit breaker CLOSED after successful probes");
            }
            _ => {}
        }
    }
}

fn now_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}
