//! Retry delay computation
//!
//! Pure function from (policy, attempt number) to a delay. The returned
//! delay never exceeds the policy's `max_delay`, jitter included. Attempts
//! are 1-based: the delay for attempt N is slept before attempt N+1 runs.

use super::config::{BackoffStrategy, RetryConfig};
use std::time::Duration;

/// Exponent cap keeping multiplier^n finite for any sane multiplier
const MAX_EXPONENT: u32 = 32;

/// Compute the delay to sleep after a failed attempt
pub fn compute_delay(config: &RetryConfig, attempt: u32) -> Duration {
    let attempt = attempt.max(1);
    let base = config.base_delay();
    let max = config.max_delay();

    let raw = match config.strategy {
        BackoffStrategy::Immediate => Duration::ZERO,
        BackoffStrategy::Fixed => base,
        BackoffStrategy::Linear => {
            let secs = base.as_secs_f64() * f64::from(attempt);
            Duration::try_from_secs_f64(secs).unwrap_or(max)
        }
        BackoffStrategy::Exponential => {
            let exponent = (attempt - 1).min(MAX_EXPONENT);
            let factor = config.backoff_multiplier.max(1.0).powi(exponent as i32);
            Duration::try_from_secs_f64(base.as_secs_f64() * factor).unwrap_or(max)
        }
    };

    let capped = raw.min(max);
    if !config.jitter || capped.is_zero() {
        return capped;
    }

    let (lo, hi) = config.jitter_range;
    let spread = 1.0 + lo + fastrand::f64() * (hi - lo).max(0.0);
    Duration::try_from_secs_f64(capped.as_secs_f64() * spread)
        .unwrap_or(max)
        .min(max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn no_jitter(strategy: BackoffStrategy) -> RetryConfig {
        RetryConfig {
            strategy,
            jitter: false,
            base_delay_ms: 100,
            max_delay_ms: 30_000,
            backoff_multiplier: 2.0,
            ..RetryConfig::default()
        }
    }

    #[test]
    fn test_exponential_progression() {
        let config = no_jitter(BackoffStrategy::Exponential);
        assert_eq!(compute_delay(&config, 1), Duration::from_millis(100));
        assert_eq!(compute_delay(&config, 2), Duration::from_millis(200));
        assert_eq!(compute_delay(&config, 3), Duration::from_millis(400));
        assert_eq!(compute_delay(&config, 4), Duration::from_millis(800));
    }

    #[test]
    fn test_linear_progression() {
        let config = no_jitter(BackoffStrategy::Linear);
        assert_eq!(compute_delay(&config, 1), Duration::from_millis(100));
        assert_eq!(compute_delay(&config, 3), Duration::from_millis(300));
    }

    #[test]
    fn test_fixed_and_immediate() {
        let fixed = no_jitter(BackoffStrategy::Fixed);
        assert_eq!(compute_delay(&fixed, 1), Duration::from_millis(100));
        assert_eq!(compute_delay(&fixed, 9), Duration::from_millis(100));

        let immediate = no_jitter(BackoffStrategy::Immediate);
        assert_eq!(compute_delay(&immediate, 1), Duration::ZERO);
    }

    #[test]
    fn test_cap_at_max_delay() {
        let config = RetryConfig {
            max_delay_ms: 1_000,
            ..no_jitter(BackoffStrategy::Exponential)
        };
        assert_eq!(compute_delay(&config, 20), Duration::from_millis(1_000));
    }

    #[test]
    fn test_huge_attempt_does_not_overflow() {
        let config = no_jitter(BackoffStrategy::Exponential);
        assert_eq!(compute_delay(&config, u32::MAX), config.max_delay());
    }

    #[test]
    fn test_jitter_stays_within_band() {
        let config = RetryConfig {
            jitter: true,
            jitter_range: (0.10, 0.30),
            strategy: BackoffStrategy::Fixed,
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
            ..RetryConfig::default()
        };
        for _ in 0..100 {
            let delay = compute_delay(&config, 1);
            assert!(delay >= Duration::from_millis(1_100), "delay {delay:?}");
            assert!(delay <= Duration::from_millis(1_300), "delay {delay:?}");
        }
    }

    proptest! {
        #[test]
        fn prop_delay_never_exceeds_max(
            attempt in 1u32..100,
            base_ms in 1u64..5_000,
            max_ms in 1u64..60_000,
            multiplier in 1.0f64..10.0,
            jitter in proptest::bool::ANY,
        ) {
            let config = RetryConfig {
                base_delay_ms: base_ms,
                max_delay_ms: base_ms.max(max_ms),
                backoff_multiplier: multiplier,
                jitter,
                ..RetryConfig::default()
            };
            let delay = compute_delay(&config, attempt);
            prop_assert!(delay <= config.max_delay());
        }

        #[test]
        fn prop_exponential_monotonic_without_jitter(
            attempt in 1u32..30,
            base_ms in 1u64..1_000,
        ) {
            let config = RetryConfig {
                base_delay_ms: base_ms,
                max_delay_ms: u64::MAX / 1_000_000,
                jitter: false,
                ..RetryConfig::default()
            };
            prop_assert!(compute_delay(&config, attempt) <= compute_delay(&config, attempt + 1));
        }
    }
}
