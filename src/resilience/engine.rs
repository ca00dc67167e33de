//! # Resilience Engine
//!
//! Central coordinator for retry policies and circuit breakers. Business
//! services hand it an async operation plus a service name and operation
//! type; the engine gates the call through the service's circuit breaker,
//! retries per the operation type's policy with backoff, and records
//! per-category error statistics.
//!
//! Registries use synchronous `parking_lot` locks with a double-checked
//! get-or-create; locks are never held across an await point.

use super::backoff::compute_delay;
use super::circuit_breaker::{CircuitBreaker, CircuitBreakerMetrics, CircuitState, HealthStatus};
use super::classify::{classify_message, ErrorCategory};
use super::config::{CircuitBreakerConfig, RetryConfig};
use super::errors::ResilienceError;
use crate::config::ResilienceSettings;
use crate::error::{CommerceError, Result};
use crate::logging::log_resilience_operation;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt::{Debug, Display};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Per-request correlation data threaded through retry logging
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub tenant_id: Option<String>,
    pub user_id: Option<String>,
    pub request_id: String,
}

impl RequestContext {
    pub fn new() -> Self {
        Self {
            tenant_id: None,
            user_id: None,
            request_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn for_tenant(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: Some(tenant_id.into()),
            ..Self::new()
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Retry and circuit breaker coordinator
///
/// One instance per process, shared as `Arc<ResilienceEngine>` across
/// business services. Breakers are created lazily per service name;
/// retry policies are keyed by operation type.
pub struct ResilienceEngine {
    settings: ResilienceSettings,
    retry_configs: RwLock<HashMap<String, RetryConfig>>,
    breaker_configs: RwLock<HashMap<String, CircuitBreakerConfig>>,
    breakers: RwLock<HashMap<String, Arc<CircuitBreaker>>>,
    /// Error occurrences keyed by "service:category"
    error_counts: DashMap<String, u64>,
}

impl ResilienceEngine {
    pub fn new(settings: ResilienceSettings) -> Self {
        Self {
            settings,
            retry_configs: RwLock::new(HashMap::new()),
            breaker_configs: RwLock::new(HashMap::new()),
            breakers: RwLock::new(HashMap::new()),
            error_counts: DashMap::new(),
        }
    }

    /// Register the retry policy for an operation type, replacing any
    /// previous policy for the same type
    pub fn configure_retry(&self, operation_type: &str, config: RetryConfig) -> Result<()> {
        config.validate().map_err(CommerceError::Resilience)?;
        debug!(
            operation_type = operation_type,
            max_attempts = config.max_attempts,
            "🔁 Retry policy registered"
        );
        self.retry_configs
            .write()
            .insert(operation_type.to_string(), config);
        Ok(())
    }

    /// Register the circuit breaker policy for a service.
    ///
    /// Must happen before the service's first call: once a breaker exists
    /// its configuration is fixed, and this returns an error rather than
    /// silently resetting live failure counts.
    pub fn configure_circuit_breaker(
        &self,
        service: &str,
        config: CircuitBreakerConfig,
    ) -> Result<()> {
        config.validate().map_err(CommerceError::Resilience)?;
        if self.breakers.read().contains_key(service) {
            return Err(CommerceError::Resilience(format!(
                "circuit breaker for service '{service}' already active"
            )));
        }
        self.breaker_configs
            .write()
            .insert(service.to_string(), config);
        Ok(())
    }

    /// Run an operation with retries and circuit breaking, classifying
    /// failures by message patterns
    pub async fn execute_with_retry<T, E, F, Fut>(
        &self,
        service: &str,
        operation_type: &str,
        ctx: &RequestContext,
        operation: F,
    ) -> std::result::Result<T, ResilienceError<E>>
    where
        E: Display + Debug,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        self.execute_classified(service, operation_type, ctx, operation, |e| {
            classify_message(&e.to_string())
        })
        .await
    }

    /// Run an operation with retries and circuit breaking, using a
    /// caller-supplied classifier that inspects the typed error.
    ///
    /// The operation closure receives the 1-based attempt number.
    pub async fn execute_classified<T, E, F, Fut, C>(
        &self,
        service: &str,
        operation_type: &str,
        ctx: &RequestContext,
        mut operation: F,
        classifier: C,
    ) -> std::result::Result<T, ResilienceError<E>>
    where
        E: Display + Debug,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        C: Fn(&E) -> ErrorCategory,
    {
        let config = self.retry_config(operation_type);
        let breaker = self.breaker(service);
        let max_attempts = config.max_attempts.max(1);

        let mut attempt = 0;
        loop {
            attempt += 1;

            if !breaker.should_allow() {
                log_resilience_operation(
                    operation_type,
                    service,
                    ctx.tenant_id.as_deref(),
                    ctx.user_id.as_deref(),
                    Some(&ctx.request_id),
                    attempt,
                    max_attempts,
                    "rejected",
                    Some("circuit open"),
                );
                return Err(ResilienceError::CircuitOpen {
                    service: service.to_string(),
                });
            }

            match operation(attempt).await {
                Ok(value) => {
                    breaker.record_success();
                    if attempt > 1 {
                        log_resilience_operation(
                            operation_type,
                            service,
                            ctx.tenant_id.as_deref(),
                            ctx.user_id.as_deref(),
                            Some(&ctx.request_id),
                            attempt,
                            max_attempts,
                            "recovered",
                            None,
                        );
                    }
                    return Ok(value);
                }
                Err(error) => {
                    let category = classifier(&error);
                    breaker.record_failure();
                    self.count_error(service, category);

                    log_resilience_operation(
                        operation_type,
                        service,
                        ctx.tenant_id.as_deref(),
                        ctx.user_id.as_deref(),
                        Some(&ctx.request_id),
                        attempt,
                        max_attempts,
                        "failed",
                        Some(category.as_str()),
                    );

                    if !config.is_retryable(category) {
                        return Err(ResilienceError::NonRetryable { category, error });
                    }
                    if attempt >= max_attempts {
                        return Err(ResilienceError::RetryExhausted {
                            attempts: attempt,
                            error,
                        });
                    }

                    let delay = compute_delay(&config, attempt);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }
    }

    /// Run an operation with retries, then a fallback when the primary
    /// path fails entirely.
    ///
    /// A fallback failure is logged distinctly and the primary failure is
    /// re-raised, so callers always see why the real operation failed.
    pub async fn execute_with_fallback<T, E, F, Fut, G, GFut>(
        &self,
        service: &str,
        operation_type: &str,
        ctx: &RequestContext,
        operation: F,
        fallback: G,
    ) -> std::result::Result<T, ResilienceError<E>>
    where
        E: Display + Debug,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        G: FnOnce() -> GFut,
        GFut: Future<Output = std::result::Result<T, E>>,
    {
        let primary = match self
            .execute_with_retry(service, operation_type, ctx, operation)
            .await
        {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        warn!(
            service = service,
            operation_type = operation_type,
            request_id = %ctx.request_id,
            error = %primary,
            "🔁 Primary path failed, invoking fallback"
        );

        match fallback().await {
            Ok(value) => Ok(value),
            Err(fallback_error) => {
                warn!(
                    service = service,
                    operation_type = operation_type,
                    request_id = %ctx.request_id,
                    error = %fallback_error,
                    "🔁 Fallback also failed, surfacing primary error"
                );
                Err(primary)
            }
        }
    }

    /// Run a single call through the service's circuit breaker, without
    /// retries
    pub async fn with_circuit_breaker<T, E, F, Fut>(
        &self,
        service: &str,
        operation: F,
    ) -> std::result::Result<T, ResilienceError<E>>
    where
        E: Display + Debug,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        let breaker = self.breaker(service);
        if !breaker.should_allow() {
            return Err(ResilienceError::CircuitOpen {
                service: service.to_string(),
            });
        }

        match operation().await {
            Ok(value) => {
                breaker.record_success();
                Ok(value)
            }
            Err(error) => {
                let category = classify_message(&error.to_string());
                breaker.record_failure();
                self.count_error(service, category);
                Err(ResilienceError::NonRetryable { category, error })
            }
        }
    }

    /// Circuit state for a service, `None` if no calls have gone through it
    pub fn circuit_status(&self, service: &str) -> Option<CircuitState> {
        self.breakers.read().get(service).map(|b| b.state())
    }

    /// Counter snapshot for a service's breaker
    pub fn circuit_metrics(&self, service: &str) -> Option<CircuitBreakerMetrics> {
        self.breakers.read().get(service).map(|b| b.metrics())
    }

    /// Counter snapshots for every known breaker
    pub fn all_circuit_metrics(&self) -> HashMap<String, CircuitBreakerMetrics> {
        self.breakers
            .read()
            .iter()
            .map(|(name, b)| (name.clone(), b.metrics()))
            .collect()
    }

    /// Error occurrence counts keyed by "service:category"
    pub fn error_statistics(&self) -> HashMap<String, u64> {
        self.error_counts
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect()
    }

    /// Close a service's breaker and clear its windowed counters.
    /// Returns false when the service has no breaker yet.
    pub fn reset_circuit(&self, service: &str) -> bool {
        match self.breakers.read().get(service) {
            Some(breaker) => {
                breaker.reset();
                true
            }
            None => false,
        }
    }

    /// Trip a service's breaker open, creating it if needed
    pub fn force_open(&self, service: &str) {
        self.breaker(service).force_open();
    }

    /// Health of every known service, derived from breaker state
    pub fn health_check(&self) -> HashMap<String, HealthStatus> {
        self.breakers
            .read()
            .iter()
            .map(|(name, b)| (name.clone(), b.health()))
            .collect()
    }

    fn retry_config(&self, operation_type: &str) -> RetryConfig {
        self.retry_configs
            .read()
            .get(operation_type)
            .cloned()
            .unwrap_or_else(|| self.settings.default_retry.clone())
    }

    fn breaker(&self, service: &str) -> Arc<CircuitBreaker> {
        if let Some(breaker) = self.breakers.read().get(service) {
            return Arc::clone(breaker);
        }

        let mut breakers = self.breakers.write();
        // Double-checked: another task may have created it between locks
        if let Some(breaker) = breakers.get(service) {
            return Arc::clone(breaker);
        }

        let config = self
            .breaker_configs
            .read()
            .get(service)
            .cloned()
            .unwrap_or_else(|| self.settings.default_circuit_breaker.clone());
        let breaker = Arc::new(CircuitBreaker::new(service, config));
        breakers.insert(service.to_string(), Arc::clone(&breaker));
        breaker
    }

    fn count_error(&self, service: &str, category: ErrorCategory) {
        *self
            .error_counts
            .entry(format!("{service}:{category}"))
            .or_insert(0) += 1;
    }
}

impl Default for ResilienceEngine {
    fn default() -> Self {
        Self::new(ResilienceSettings::default())
    }
}

impl Debug for ResilienceEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilienceEngine")
            .field("services", &self.breakers.read().len())
            .field("retry_policies", &self.retry_configs.read().len())
            .finish()
    }
}
