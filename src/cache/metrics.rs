//! # Cache Metrics
//!
//! Per-namespace operation counters with derived hit rate and a rolling
//! average response time. Counters are lock-free atomics mutated on every
//! operation and never reset except by an explicit clear.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Lock-free counters for a single namespace
#[derive(Debug, Default)]
struct NamespaceCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    deletes: AtomicU64,
    evictions: AtomicU64,
    total_response_nanos: AtomicU64,
    timed_ops: AtomicU64,
}

impl NamespaceCounters {
    fn record_latency(&self, latency: Duration) {
        self.total_response_nanos
            .fetch_add(latency.as_nanos() as u64, Ordering::Relaxed);
        self.timed_ops.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> CacheMetrics {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let timed_ops = self.timed_ops.load(Ordering::Relaxed);
        let total_nanos = self.total_response_nanos.load(Ordering::Relaxed);

        let lookups = hits + misses;
        let hit_rate = if lookups > 0 {
            hits as f64 / lookups as f64
        } else {
            0.0
        };
        let avg_response_time = if timed_ops > 0 {
            Duration::from_nanos(total_nanos / timed_ops)
        } else {
            Duration::ZERO
        };

        CacheMetrics {
            hits,
            misses,
            sets: self.sets.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            hit_rate,
            avg_response_time,
        }
    }
}

/// Snapshot of one namespace's cache metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheMetrics {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub deletes: u64,
    pub evictions: u64,

    /// hits / (hits + misses), 0.0 when no lookups have happened
    pub hit_rate: f64,

    /// Rolling mean latency across all timed operations
    pub avg_response_time: Duration,
}

impl CacheMetrics {
    /// Format metrics for logging
    pub fn format_summary(&self) -> String {
        format!(
            "Hits: {} | Misses: {} | Hit rate: {:.1}% | Sets: {} | Evictions: {} | Avg latency: {:.2}ms",
            self.hits,
            self.misses,
            self.hit_rate * 100.0,
            self.sets,
            self.evictions,
            self.avg_response_time.as_secs_f64() * 1000.0
        )
    }
}

/// Registry of per-namespace counters
#[derive(Debug, Default)]
pub(crate) struct MetricsRegistry {
    namespaces: DashMap<String, Arc<NamespaceCounters>>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn counters(&self, namespace: &str) -> Arc<NamespaceCounters> {
        self.namespaces
            .entry(namespace.to_string())
            .or_default()
            .clone()
    }

    pub fn record_hit(&self, namespace: &str, latency: Duration) {
        let c = self.counters(namespace);
        c.hits.fetch_add(1, Ordering::Relaxed);
        c.record_latency(latency);
    }

    pub fn record_miss(&self, namespace: &str, latency: Duration) {
        let c = self.counters(namespace);
        c.misses.fetch_add(1, Ordering::Relaxed);
        c.record_latency(latency);
    }

    pub fn record_set(&self, namespace: &str, latency: Duration) {
        let c = self.counters(namespace);
        c.sets.fetch_add(1, Ordering::Relaxed);
        c.record_latency(latency);
    }

    pub fn record_delete(&self, namespace: &str) {
        self.counters(namespace)
            .deletes
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_eviction(&self, namespace: &str) {
        self.counters(namespace)
            .evictions
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot metrics for one namespace, `None` if it has never been used
    pub fn snapshot(&self, namespace: &str) -> Option<CacheMetrics> {
        self.namespaces.get(namespace).map(|c| c.snapshot())
    }

    /// Snapshot all namespaces
    pub fn all(&self) -> HashMap<String, CacheMetrics> {
        self.namespaces
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().snapshot()))
            .collect()
    }

    /// Drop all counters (explicit operator action)
    pub fn clear(&self) {
        self.namespaces.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_registry() {
        let registry = MetricsRegistry::new();
        assert!(registry.snapshot("products").is_none());
        assert!(registry.all().is_empty());
    }

    #[test]
    fn test_hit_rate_calculation() {
        let registry = MetricsRegistry::new();
        registry.record_hit("products", Duration::from_millis(1));
        registry.record_hit("products", Duration::from_millis(1));
        registry.record_miss("products", Duration::from_millis(1));

        let metrics = registry.snapshot("products").unwrap();
        assert_eq!(metrics.hits, 2);
        assert_eq!(metrics.misses, 1);
        assert!((metrics.hit_rate - 2.0 / 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_rolling_average_latency() {
        let registry = MetricsRegistry::new();
        registry.record_hit("products", Duration::from_millis(10));
        registry.record_miss("products", Duration::from_millis(20));

        let metrics = registry.snapshot("products").unwrap();
        assert_eq!(metrics.avg_response_time, Duration::from_millis(15));
    }

    #[test]
    fn test_namespaces_are_isolated() {
        let registry = MetricsRegistry::new();
        registry.record_set("products", Duration::from_millis(1));
        registry.record_eviction("orders");

        assert_eq!(registry.snapshot("products").unwrap().sets, 1);
        assert_eq!(registry.snapshot("products").unwrap().evictions, 0);
        assert_eq!(registry.snapshot("orders").unwrap().evictions, 1);
    }

    #[test]
    fn test_clear() {
        let registry = MetricsRegistry::new();
        registry.record_hit("products", Duration::from_millis(1));
        registry.clear();
        assert!(registry.snapshot("products").is_none());
    }

    #[test]
    fn test_format_summary() {
        let registry = MetricsRegistry::new();
        registry.record_hit("products", Duration::from_millis(2));
        let summary = registry.snapshot("products").unwrap().format_summary();
        assert!(summary.contains("Hits: 1"));
        assert!(summary.contains("Hit rate: 100.0%"));
    }
}
