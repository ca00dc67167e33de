//! Resilience engine integration tests
//!
//! End-to-end retry + circuit breaker behavior with immediate backoff so
//! the suite stays fast. The half-open recovery path uses a 1-second open
//! timeout with a real sleep.

use commerce_core::resilience::{
    BackoffStrategy, CircuitBreakerConfig, CircuitState, ErrorCategory, HealthStatus,
    RequestContext, ResilienceEngine, ResilienceError, RetryConfig,
};
use std::sync::atomic::{AtomicU32, Ordering};

fn immediate_retry(max_attempts: u32) -> RetryConfig {
    RetryConfig {
        max_attempts,
        strategy: BackoffStrategy::Immediate,
        jitter: false,
        ..RetryConfig::default()
    }
}

fn breaker(failure_threshold: u32, timeout_seconds: u64) -> CircuitBreakerConfig {
    CircuitBreakerConfig {
        failure_threshold,
        success_threshold: 1,
        timeout_seconds,
        half_open_max_calls: 2,
    }
}

#[tokio::test]
async fn test_transient_failure_recovers_within_budget() {
    let engine = ResilienceEngine::default();
    engine.configure_retry("order_submit", immediate_retry(4)).unwrap();
    let ctx = RequestContext::for_tenant("acme").with_user("user-7");
    let attempts = AtomicU32::new(0);

    let order_id: Result<&str, ResilienceError<String>> = engine
        .execute_with_retry("order_service", "order_submit", &ctx, |attempt| {
            attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 3 {
                    Err("connection reset".to_string())
                } else {
                    Ok("order-123")
                }
            }
        })
        .await;

    assert_eq!(order_id.unwrap(), "order-123");
    assert_eq!(attempts.load(Ordering::SeqCst), 3);

    // Success closed the loop without tripping the breaker
    assert_eq!(
        engine.circuit_status("order_service"),
        Some(CircuitState::Closed)
    );
}

#[tokio::test]
async fn test_breaker_opens_then_recovers_through_half_open() {
    let engine = ResilienceEngine::default();
    engine
        .configure_circuit_breaker("warehouse", breaker(3, 1))
        .unwrap();
    engine.configure_retry("stock", immediate_retry(1)).unwrap();
    let ctx = RequestContext::new();

    // Three failures trip the circuit
    for _ in 0..3 {
        let _: Result<(), ResilienceError<String>> = engine
            .execute_with_retry("warehouse", "stock", &ctx, |_| async {
                Err("warehouse unavailable".to_string())
            })
            .await;
    }
    assert_eq!(engine.circuit_status("warehouse"), Some(CircuitState::Open));
    assert_eq!(
        engine.health_check().get("warehouse"),
        Some(&HealthStatus::Unhealthy)
    );

    // While open, calls are rejected without running
    let invoked = AtomicU32::new(0);
    let rejected: Result<(), ResilienceError<String>> = engine
        .execute_with_retry("warehouse", "stock", &ctx, |_| {
            invoked.fetch_add(1, Ordering::SeqCst);
            async { Ok(()) }
        })
        .await;
    assert!(matches!(rejected, Err(ResilienceError::CircuitOpen { .. })));
    assert_eq!(invoked.load(Ordering::SeqCst), 0);

    // After the open timeout a probe is admitted; success closes
    tokio::time::sleep(std::time::Duration::from_millis(1_100)).await;
    let probe: Result<(), ResilienceError<String>> = engine
        .execute_with_retry("warehouse", "stock", &ctx, |_| async { Ok(()) })
        .await;
    assert!(probe.is_ok());
    assert_eq!(
        engine.circuit_status("warehouse"),
        Some(CircuitState::Closed)
    );
}

#[tokio::test]
async fn test_failed_probe_reopens_circuit() {
    let engine = ResilienceEngine::default();
    engine
        .configure_circuit_breaker("shipping", breaker(2, 1))
        .unwrap();
    engine.configure_retry("rates", immediate_retry(1)).unwrap();
    let ctx = RequestContext::new();

    for _ in 0..2 {
        let _: Result<(), ResilienceError<String>> = engine
            .execute_with_retry("shipping", "rates", &ctx, |_| async {
                Err("shipping gateway 503".to_string())
            })
            .await;
    }
    assert_eq!(engine.circuit_status("shipping"), Some(CircuitState::Open));

    tokio::time::sleep(std::time::Duration::from_millis(1_100)).await;
    let probe: Result<(), ResilienceError<String>> = engine
        .execute_with_retry("shipping", "rates", &ctx, |_| async {
            Err("still down".to_string())
        })
        .await;
    assert!(probe.is_err());
    assert_eq!(engine.circuit_status("shipping"), Some(CircuitState::Open));
}

#[tokio::test]
async fn test_permanent_failure_skips_retry_budget() {
    let engine = ResilienceEngine::default();
    engine.configure_retry("charge", immediate_retry(10)).unwrap();
    let ctx = RequestContext::for_tenant("acme");
    let attempts = AtomicU32::new(0);

    let result: Result<(), ResilienceError<String>> = engine
        .execute_with_retry("payments", "charge", &ctx, |_| {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err("422 invalid card number".to_string()) }
        })
        .await;

    match result {
        Err(ResilienceError::NonRetryable { category, error }) => {
            assert_eq!(category, ErrorCategory::Permanent);
            assert!(error.contains("invalid card"));
        }
        other => panic!("expected NonRetryable, got {other:?}"),
    }
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_typed_classification_controls_policy() {
    #[derive(Debug)]
    enum InventoryError {
        Conflict,
        Backend(String),
    }
    impl std::fmt::Display for InventoryError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                Self::Conflict => f.write_str("version conflict"),
                Self::Backend(msg) => write!(f, "backend: {msg}"),
            }
        }
    }

    let engine = ResilienceEngine::default();
    engine.configure_retry("reserve", immediate_retry(5)).unwrap();
    let ctx = RequestContext::new();
    let attempts = AtomicU32::new(0);

    // Version conflicts are transient under optimistic locking, even though
    // no message pattern would say so
    let result: Result<&str, ResilienceError<InventoryError>> = engine
        .execute_classified(
            "inventory",
            "reserve",
            &ctx,
            |attempt| {
                attempts.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 2 {
                        Err(InventoryError::Conflict)
                    } else {
                        Ok("reserved")
                    }
                }
            },
            |e| match e {
                InventoryError::Conflict => ErrorCategory::Transient,
                InventoryError::Backend(_) => ErrorCategory::DependencyFailure,
            },
        )
        .await;

    assert_eq!(result.unwrap(), "reserved");
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_fallback_path_with_open_circuit() {
    let engine = ResilienceEngine::default();
    engine.configure_retry("search", immediate_retry(1)).unwrap();
    let ctx = RequestContext::new();

    engine.force_open("search_index");

    // Circuit open: primary never runs, fallback serves stale data
    let invoked = AtomicU32::new(0);
    let result: Result<&str, ResilienceError<String>> = engine
        .execute_with_fallback(
            "search_index",
            "search",
            &ctx,
            |_| {
                invoked.fetch_add(1, Ordering::SeqCst);
                async { Ok("fresh results") }
            },
            || async { Ok("cached results") },
        )
        .await;

    assert_eq!(result.unwrap(), "cached results");
    assert_eq!(invoked.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_single_call_circuit_wrapper() {
    let engine = ResilienceEngine::default();

    let ok: Result<u32, ResilienceError<String>> = engine
        .with_circuit_breaker("tax_service", || async { Ok(7) })
        .await;
    assert_eq!(ok.unwrap(), 7);

    engine.force_open("tax_service");
    let rejected: Result<u32, ResilienceError<String>> = engine
        .with_circuit_breaker("tax_service", || async { Ok(7) })
        .await;
    assert!(matches!(rejected, Err(ResilienceError::CircuitOpen { .. })));
}

#[tokio::test]
async fn test_error_statistics_and_metrics_surface() {
    let engine = ResilienceEngine::default();
    engine.configure_retry("sync", immediate_retry(2)).unwrap();
    let ctx = RequestContext::new();

    let _: Result<(), ResilienceError<String>> = engine
        .execute_with_retry("erp", "sync", &ctx, |_| async {
            Err("connection refused".to_string())
        })
        .await;
    let _: Result<(), ResilienceError<String>> = engine
        .execute_with_retry("erp", "sync", &ctx, |_| async {
            Err("request timed out".to_string())
        })
        .await;

    let stats = engine.error_statistics();
    assert_eq!(stats.get("erp:network"), Some(&2));
    assert_eq!(stats.get("erp:timeout"), Some(&2));

    let metrics = engine.circuit_metrics("erp").expect("breaker exists");
    assert_eq!(metrics.total_failures, 4);
    assert_eq!(metrics.total_successes, 0);

    let all = engine.all_circuit_metrics();
    assert!(all.contains_key("erp"));
}
