//! Resilience failure taxonomy
//!
//! The engine wraps the caller's error type rather than erasing it: a failed
//! execution hands back the final underlying error together with how the
//! engine gave up.

use super::classify::ErrorCategory;
use thiserror::Error;

/// How a resilient execution failed
///
/// `E` is the caller's own error type; `RetryExhausted` and `NonRetryable`
/// carry the last underlying error so callers can still match on it.
#[derive(Debug, Error)]
pub enum ResilienceError<E>
where
    E: std::fmt::Display + std::fmt::Debug,
{
    /// The circuit breaker for the service rejected the call without
    /// invoking the operation
    #[error("circuit breaker open for service '{service}'")]
    CircuitOpen { service: String },

    /// The failure category is not retryable under the active policy;
    /// the operation ran exactly once
    #[error("non-retryable {category} error: {error}")]
    NonRetryable { category: ErrorCategory, error: E },

    /// Every permitted attempt failed
    #[error("retries exhausted after {attempts} attempts: {error}")]
    RetryExhausted { attempts: u32, error: E },
}

impl<E> ResilienceError<E>
where
    E: std::fmt::Display + std::fmt::Debug,
{
    /// The underlying error, when the operation actually ran
    pub fn into_inner(self) -> Option<E> {
        match self {
            Self::CircuitOpen { .. } => None,
            Self::NonRetryable { error, .. } | Self::RetryExhausted { error, .. } => Some(error),
        }
    }

    pub fn is_circuit_open(&self) -> bool {
        matches!(self, Self::CircuitOpen { .. })
    }
}
