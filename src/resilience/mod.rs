//! # Resilience
//!
//! Retry policies, error classification, and circuit breakers for calls to
//! external dependencies (payment gateways, search indexes, warehouse and
//! shipping APIs).
//!
//! ## Architecture
//!
//! ```text
//! ResilienceEngine
//!   ├── RetryConfig per operation type   backoff + category policy
//!   ├── CircuitBreaker per service       lock-free state machine
//!   ├── ErrorCategory classification     typed or message-pattern based
//!   └── error statistics                 per service:category counters
//! ```
//!
//! Failures are classified into a closed category set and retried (or not)
//! by category, never by concrete error type. Circuit breakers shield each
//! downstream service independently and recover through a half-open probe
//! phase.

pub mod backoff;
pub mod circuit_breaker;
pub mod classify;
pub mod config;
pub mod engine;
pub mod errors;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerMetrics, CircuitState, HealthStatus};
pub use classify::{classify_message, ErrorCategory};
pub use config::{BackoffStrategy, CircuitBreakerConfig, RetryConfig};
pub use engine::{RequestContext, ResilienceEngine};
pub use errors::ResilienceError;
