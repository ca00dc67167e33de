//! # Cache Engine
//!
//! Tenant-partitioned, multi-level cache: an in-process L1 tier in front of
//! a shared Redis L2 tier. Best-effort by contract: after `initialize`, no
//! cache operation ever surfaces an error to the caller. Remote-tier and
//! serialization failures are logged and degrade to a miss or a `false`
//! return.
//!
//! The engine owns two background loops started by `initialize` and stopped
//! by `cleanup`: an L1 expiry sweep and a periodic metrics summary. Both
//! are cancellable via a watch channel and `cleanup` is idempotent; a
//! cleaned-up engine turns every operation into a no-op.

use super::config::{CacheConfig, CacheStrategy};
use super::errors::{CacheError, CacheResult};
use super::key;
use super::memory::MemoryTier;
use super::metrics::{CacheMetrics, MetricsRegistry};
use super::remote::{RedisTier, RemoteTier};
use crate::config::CacheEngineSettings;
use crate::logging::{log_cache_operation, log_error};
use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Multi-level, tenant-aware cache engine
///
/// Constructed from settings, initialized once at startup, and passed into
/// business services as an `Arc<CacheEngine>` owned by the application
/// lifecycle.
pub struct CacheEngine {
    settings: CacheEngineSettings,
    l1: Arc<MemoryTier>,
    remote: RwLock<RemoteTier>,
    configs: RwLock<HashMap<String, CacheConfig>>,
    metrics: Arc<MetricsRegistry>,
    closed: AtomicBool,
    shutdown: Mutex<Option<watch::Sender<bool>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl std::fmt::Debug for CacheEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheEngine")
            .field("backend", &self.remote.read().backend_name())
            .field("l1_entries", &self.l1.len())
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish()
    }
}

impl CacheEngine {
    /// Create an engine from settings. The remote tier stays no-op until
    /// `initialize` connects it.
    pub fn new(settings: CacheEngineSettings) -> Self {
        Self {
            l1: Arc::new(MemoryTier::new(settings.max_memory_entries)),
            remote: RwLock::new(RemoteTier::NoOp),
            configs: RwLock::new(HashMap::new()),
            metrics: Arc::new(MetricsRegistry::new()),
            closed: AtomicBool::new(false),
            shutdown: Mutex::new(None),
            tasks: Mutex::new(Vec::new()),
            settings,
        }
    }

    /// Connect the remote tier, verify liveness, and start the background
    /// loops.
    ///
    /// This is the only cache operation whose failure is surfaced: an
    /// unreachable remote tier at startup is fatal for the process startup
    /// sequence.
    pub async fn initialize(&self) -> CacheResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Ok(());
        }

        let tier = if self.settings.enabled {
            let redis = RedisTier::connect(&self.settings.redis_url).await?;
            let tier = RemoteTier::Redis(redis);
            if !tier.ping().await? {
                return Err(CacheError::ConnectionError(
                    "Redis PING did not return PONG".to_string(),
                ));
            }
            tier
        } else {
            info!("Remote cache tier disabled by configuration, running in-memory only");
            RemoteTier::NoOp
        };

        *self.remote.write() = tier;

        let (tx, handles) = self.spawn_background_loops();
        *self.shutdown.lock() = Some(tx);
        self.tasks.lock().extend(handles);

        info!(
            backend = self.remote.read().backend_name(),
            max_memory_entries = self.settings.max_memory_entries,
            default_ttl_seconds = self.settings.default_ttl_seconds,
            "📦 Cache engine initialized"
        );
        Ok(())
    }

    /// Register a namespace configuration. The first registration wins;
    /// returns false when the namespace was already configured.
    pub fn configure_namespace(&self, namespace: &str, config: CacheConfig) -> bool {
        let mut configs = self.configs.write();
        if configs.contains_key(namespace) {
            warn!(
                namespace = namespace,
                "Namespace already configured, keeping existing configuration"
            );
            return false;
        }
        configs.insert(namespace.to_string(), config);
        true
    }

    /// Look up a value. L1 first, then L2 with promotion into L1 on hit.
    /// Remote-tier errors are logged and reported as a miss.
    pub async fn get(&self, namespace: &str, key: &str, tenant: Option<&str>) -> Option<Value> {
        if self.closed.load(Ordering::SeqCst) {
            return None;
        }

        let start = Instant::now();
        let config = self.resolve_config(namespace);
        let composite = self.build_key(namespace, key, tenant, &config);

        if let Some(raw) = self.l1.get(&composite) {
            if let Some(value) = self.parse_value(namespace, &raw) {
                self.metrics.record_hit(namespace, start.elapsed());
                return Some(value);
            }
            // Unparseable entry: drop it and treat as a miss
            self.l1.remove(&composite);
        }

        let remote = self.remote_tier();
        match remote.get(&composite).await {
            Ok(Some(raw)) => {
                if let Some(value) = self.parse_value(namespace, &raw) {
                    // Promote into L1 with the namespace TTL
                    if let Some(evicted) = self.l1.insert(composite, raw, config.ttl()) {
                        self.record_eviction_for(&evicted);
                    }
                    self.metrics.record_hit(namespace, start.elapsed());
                    return Some(value);
                }
                self.metrics.record_miss(namespace, start.elapsed());
                None
            }
            Ok(None) => {
                self.metrics.record_miss(namespace, start.elapsed());
                None
            }
            Err(e) => {
                log_error("cache", "get", &e.to_string(), Some(namespace));
                self.metrics.record_miss(namespace, start.elapsed());
                None
            }
        }
    }

    /// Read-through lookup: on miss, invoke `fallback` once and cache a
    /// non-null result via `set`.
    pub async fn get_with_fallback<F, Fut>(
        &self,
        namespace: &str,
        key: &str,
        tenant: Option<&str>,
        fallback: F,
    ) -> Option<Value>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Option<Value>>,
    {
        if let Some(value) = self.get(namespace, key, tenant).await {
            return Some(value);
        }

        let computed = fallback().await?;
        self.set(namespace, key, &computed, tenant, None).await;
        Some(computed)
    }

    /// Store a value in both tiers with the resolved TTL.
    ///
    /// Returns false (and logs) on serialization or transport failure;
    /// never errors. TTL resolution: explicit override, then namespace
    /// configuration, then the engine default.
    pub async fn set<T>(
        &self,
        namespace: &str,
        key: &str,
        value: &T,
        tenant: Option<&str>,
        ttl: Option<Duration>,
    ) -> bool
    where
        T: Serialize + ?Sized,
    {
        if self.closed.load(Ordering::SeqCst) {
            return false;
        }

        let start = Instant::now();
        let config = self.resolve_config(namespace);

        let raw = match serde_json::to_string(value) {
            Ok(s) => s,
            Err(e) => {
                log_error("cache", "set", &e.to_string(), Some(namespace));
                return false;
            }
        };

        let ttl = ttl.unwrap_or_else(|| config.ttl());
        let composite = self.build_key(namespace, key, tenant, &config);

        if config.strategy != CacheStrategy::WriteAround {
            if let Some(evicted) = self.l1.insert(composite.clone(), raw.clone(), ttl) {
                self.record_eviction_for(&evicted);
            }
        }

        let remote = self.remote_tier();
        let ok = match config.strategy {
            CacheStrategy::WriteBack => {
                // Deferred best-effort remote write
                let ns = namespace.to_string();
                tokio::spawn(async move {
                    if let Err(e) = remote.set(&composite, &raw, ttl).await {
                        warn!(namespace = %ns, error = %e, "Deferred remote cache write failed");
                    }
                });
                true
            }
            _ => match remote.set(&composite, &raw, ttl).await {
                Ok(()) => true,
                Err(e) => {
                    log_error("cache", "set", &e.to_string(), Some(namespace));
                    false
                }
            },
        };

        self.metrics.record_set(namespace, start.elapsed());
        ok
    }

    /// Remove a key from both tiers. Idempotent: an absent key is not an
    /// error.
    pub async fn delete(&self, namespace: &str, key: &str, tenant: Option<&str>) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }

        let config = self.resolve_config(namespace);
        let composite = self.build_key(namespace, key, tenant, &config);

        self.l1.remove(&composite);

        let remote = self.remote_tier();
        if let Err(e) = remote.delete(&composite).await {
            log_error("cache", "delete", &e.to_string(), Some(namespace));
        }

        self.metrics.record_delete(namespace);
    }

    /// Remove every entry in the namespace whose composite key contains
    /// `pattern` as a substring (L1) or matches the equivalent glob (L2).
    /// Returns the total number of removed entries.
    pub async fn invalidate_pattern(
        &self,
        namespace: &str,
        pattern: &str,
        tenant: Option<&str>,
    ) -> u64 {
        if self.closed.load(Ordering::SeqCst) {
            return 0;
        }

        let config = self.resolve_config(namespace);
        let tenant = tenant.filter(|_| config.tenant_scoped);

        let prefix = match tenant {
            Some(t) => format!("{}{}", key::namespace_prefix(namespace), key::tenant_fragment(t)),
            None => key::namespace_prefix(namespace),
        };

        let removed = self.l1.remove_matching(pattern, Some(&prefix));
        for _ in &removed {
            self.metrics.record_delete(namespace);
        }
        let mut total = removed.len() as u64;

        let remote = self.remote_tier();
        match remote
            .delete_pattern(&key::namespace_glob(namespace, pattern, tenant))
            .await
        {
            Ok(count) => total += count,
            Err(e) => log_error("cache", "invalidate_pattern", &e.to_string(), Some(namespace)),
        }

        debug!(
            namespace = namespace,
            pattern = pattern,
            removed = total,
            "Cache pattern invalidation"
        );
        total
    }

    /// Remove every entry belonging to a tenant, across all namespaces and
    /// both tiers. Returns the total number of removed entries.
    pub async fn invalidate_tenant(&self, tenant_id: &str) -> u64 {
        if self.closed.load(Ordering::SeqCst) {
            return 0;
        }

        let fragment = key::tenant_fragment(tenant_id);
        let removed = self.l1.remove_matching(&fragment, None);
        for removed_key in &removed {
            if let Some(ns) = key::namespace_of(removed_key) {
                self.metrics.record_delete(ns);
            }
        }
        let mut total = removed.len() as u64;

        let remote = self.remote_tier();
        match remote.delete_pattern(&format!("*{fragment}*")).await {
            Ok(count) => total += count,
            Err(e) => log_error("cache", "invalidate_tenant", &e.to_string(), Some(tenant_id)),
        }

        log_cache_operation(
            "invalidate_tenant",
            "*",
            Some(tenant_id),
            "completed",
            Some(&format!("removed {total} entries")),
        );
        total
    }

    /// Bulk pre-population. Not atomic across entries; returns the number
    /// of entries that were stored successfully.
    pub async fn warm_cache(
        &self,
        namespace: &str,
        entries: Vec<(String, Value)>,
        tenant: Option<&str>,
    ) -> usize {
        let mut stored = 0;
        for (entry_key, value) in entries {
            if self.set(namespace, &entry_key, &value, tenant, None).await {
                stored += 1;
            }
        }
        log_cache_operation(
            "warm_cache",
            namespace,
            tenant,
            "completed",
            Some(&format!("stored {stored} entries")),
        );
        stored
    }

    /// Cache the result of an arbitrary function, keyed by its name and
    /// serialized argument signature.
    pub async fn get_or_compute<T, A, F, Fut>(
        &self,
        namespace: &str,
        fn_name: &str,
        args: &A,
        tenant: Option<&str>,
        compute: F,
    ) -> Option<T>
    where
        T: Serialize + DeserializeOwned,
        A: Serialize + ?Sized,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Option<T>>,
    {
        let args_json =
            serde_json::to_string(args).unwrap_or_else(|_| "[unencodable]".to_string());
        let fn_key = key::function_key(fn_name, &args_json);

        if let Some(cached) = self.get(namespace, &fn_key, tenant).await {
            match serde_json::from_value::<T>(cached) {
                Ok(value) => return Some(value),
                // Shape drift between deployments: recompute below
                Err(e) => debug!(
                    namespace = namespace,
                    function = fn_name,
                    error = %e,
                    "Cached value no longer deserializes, recomputing"
                ),
            }
        }

        let computed = compute().await?;
        self.set(namespace, &fn_key, &computed, tenant, None).await;
        Some(computed)
    }

    /// Metrics snapshot for one namespace
    pub fn metrics(&self, namespace: &str) -> Option<CacheMetrics> {
        self.metrics.snapshot(namespace)
    }

    /// Metrics snapshots for every namespace seen so far
    pub fn all_metrics(&self) -> HashMap<String, CacheMetrics> {
        self.metrics.all()
    }

    /// Drop all metrics counters (explicit operator action)
    pub fn clear_metrics(&self) {
        self.metrics.clear();
    }

    /// Current L1 entry count
    pub fn l1_len(&self) -> usize {
        self.l1.len()
    }

    /// Stop background loops, drop the remote connection, and clear L1.
    ///
    /// Safe to call more than once; after the first call every operation
    /// on the engine is a no-op.
    pub async fn cleanup(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        let sender = self.shutdown.lock().take();
        if let Some(tx) = sender {
            let _ = tx.send(true);
        }

        let handles: Vec<JoinHandle<()>> = self.tasks.lock().drain(..).collect();
        for handle in handles {
            let _ = handle.await;
        }

        self.l1.clear();
        *self.remote.write() = RemoteTier::NoOp;
        info!("📦 Cache engine shut down");
    }

    fn remote_tier(&self) -> RemoteTier {
        self.remote.read().clone()
    }

    /// Namespace configuration, lazily registered with engine defaults on
    /// first use
    fn resolve_config(&self, namespace: &str) -> CacheConfig {
        if let Some(config) = self.configs.read().get(namespace) {
            return config.clone();
        }

        let mut configs = self.configs.write();
        configs
            .entry(namespace.to_string())
            .or_insert_with(|| CacheConfig {
                ttl_seconds: self.settings.default_ttl_seconds,
                ..CacheConfig::default()
            })
            .clone()
    }

    fn build_key(
        &self,
        namespace: &str,
        entry_key: &str,
        tenant: Option<&str>,
        config: &CacheConfig,
    ) -> String {
        let tenant = tenant.filter(|_| config.tenant_scoped);
        key::composite_key(namespace, entry_key, tenant)
    }

    fn parse_value(&self, namespace: &str, raw: &str) -> Option<Value> {
        match serde_json::from_str(raw) {
            Ok(value) => Some(value),
            Err(e) => {
                log_error("cache", "deserialize", &e.to_string(), Some(namespace));
                None
            }
        }
    }

    fn record_eviction_for(&self, evicted_key: &str) {
        if let Some(ns) = key::namespace_of(evicted_key) {
            self.metrics.record_eviction(ns);
        }
    }

    fn spawn_background_loops(&self) -> (watch::Sender<bool>, Vec<JoinHandle<()>>) {
        let (tx, rx) = watch::channel(false);

        // L1 expiry sweep: removes expired entries even under capacity,
        // independent of LRU eviction
        let l1 = Arc::clone(&self.l1);
        let sweep_interval = self.settings.sweep_interval();
        let mut sweep_rx = rx.clone();
        let sweeper = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(sweep_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let expired = l1.sweep_expired();
                        if !expired.is_empty() {
                            debug!(count = expired.len(), "L1 expiry sweep removed entries");
                        }
                    }
                    _ = sweep_rx.changed() => break,
                }
            }
        });

        // Periodic metrics summary for the observability collaborator
        let metrics = Arc::clone(&self.metrics);
        let metrics_interval = self.settings.metrics_interval();
        let mut metrics_rx = rx;
        let reporter = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(metrics_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        for (namespace, snapshot) in metrics.all() {
                            info!(
                                namespace = %namespace,
                                summary = %snapshot.format_summary(),
                                "Cache metrics"
                            );
                        }
                    }
                    _ = metrics_rx.changed() => break,
                }
            }
        });

        (tx, vec![sweeper, reporter])
    }
}
