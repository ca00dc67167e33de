//! Retry and circuit breaker policy configuration
//!
//! Policies are registered per operation type (retry) and per service
//! (circuit breaker); anything unregistered falls back to the engine
//! defaults. All durations are expressed as integer fields so the
//! configuration round-trips cleanly through TOML and environment
//! variables.

use super::classify::ErrorCategory;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Delay progression between retry attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// base * multiplier^(attempt-1), the default
    Exponential,
    /// base * attempt
    Linear,
    /// base for every attempt
    Fixed,
    /// No delay between attempts
    Immediate,
}

impl Default for BackoffStrategy {
    fn default() -> Self {
        Self::Exponential
    }
}

/// Retry policy for one operation type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts including the first call
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Upper bound on any single delay, jitter included
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Growth factor for the exponential strategy
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    #[serde(default)]
    pub strategy: BackoffStrategy,

    /// Add random spread to each delay so synchronized clients do not
    /// retry in lockstep
    #[serde(default = "default_true")]
    pub jitter: bool,

    /// Jitter fraction bounds: each delay grows by a uniform factor in
    /// `[1 + lo, 1 + hi]`
    #[serde(default = "default_jitter_range")]
    pub jitter_range: (f64, f64),

    /// Allow-list of retryable categories. `None` means every category is
    /// retryable unless it appears in `non_retryable_categories`.
    #[serde(default)]
    pub retryable_categories: Option<Vec<ErrorCategory>>,

    /// Deny-list of categories that abort retrying immediately
    #[serde(default = "default_non_retryable")]
    pub non_retryable_categories: Vec<ErrorCategory>,
}

impl RetryConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    /// Whether a failure in this category should be retried.
    ///
    /// The deny-list wins over the allow-list, and `Cancelled` is fatal no
    /// matter what the policy says.
    pub fn is_retryable(&self, category: ErrorCategory) -> bool {
        if category == ErrorCategory::Cancelled {
            return false;
        }
        if self.non_retryable_categories.contains(&category) {
            return false;
        }
        match &self.retryable_categories {
            Some(allowed) => allowed.contains(&category),
            None => true,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_attempts == 0 {
            return Err("max_attempts must be at least 1".to_string());
        }
        if self.backoff_multiplier < 1.0 {
            return Err("backoff_multiplier must be at least 1.0".to_string());
        }
        if self.max_delay_ms < self.base_delay_ms {
            return Err("max_delay_ms must not be less than base_delay_ms".to_string());
        }
        let (lo, hi) = self.jitter_range;
        if !(0.0..=1.0).contains(&lo) || !(0.0..=1.0).contains(&hi) || lo > hi {
            return Err("jitter_range must satisfy 0.0 <= lo <= hi <= 1.0".to_string());
        }
        Ok(())
    }

    /// Payment providers: few, slow, well-spread attempts. Double charging
    /// is worse than failing, so permanent-looking failures stop retries
    /// and the attempt budget stays small.
    pub fn for_payment_provider() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 10_000,
            retryable_categories: Some(vec![
                ErrorCategory::Timeout,
                ErrorCategory::Network,
                ErrorCategory::DependencyFailure,
            ]),
            ..Self::default()
        }
    }

    /// Search index updates: aggressive retries, the index tolerates
    /// duplicate writes
    pub fn for_search_index() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 100,
            max_delay_ms: 5_000,
            ..Self::default()
        }
    }

    /// Webhook delivery: many attempts over a long horizon
    pub fn for_webhook_delivery() -> Self {
        Self {
            max_attempts: 8,
            base_delay_ms: 1_000,
            max_delay_ms: 60_000,
            ..Self::default()
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            strategy: BackoffStrategy::default(),
            jitter: true,
            jitter_range: default_jitter_range(),
            retryable_categories: None,
            non_retryable_categories: default_non_retryable(),
        }
    }
}

/// Circuit breaker policy for one service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that trip the circuit open
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Half-open successes required to close the circuit
    #[serde(default = "default_success_threshold")]
    pub success_threshold: u32,

    /// How long the circuit stays open before probing
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Concurrent probe budget while half-open
    #[serde(default = "default_half_open_max_calls")]
    pub half_open_max_calls: u32,
}

impl CircuitBreakerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.failure_threshold == 0 {
            return Err("failure_threshold must be at least 1".to_string());
        }
        if self.success_threshold == 0 {
            return Err("success_threshold must be at least 1".to_string());
        }
        if self.half_open_max_calls == 0 {
            return Err("half_open_max_calls must be at least 1".to_string());
        }
        Ok(())
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            success_threshold: default_success_threshold(),
            timeout_seconds: default_timeout_seconds(),
            half_open_max_calls: default_half_open_max_calls(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    100
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_jitter_range() -> (f64, f64) {
    (0.10, 0.30)
}

fn default_non_retryable() -> Vec<ErrorCategory> {
    vec![
        ErrorCategory::Permanent,
        ErrorCategory::Configuration,
        ErrorCategory::Cancelled,
    ]
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_success_threshold() -> u32 {
    2
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_half_open_max_calls() -> u32 {
    3
}
