//! Per-namespace cache configuration
//!
//! Namespaces are configured once, either at startup via
//! `CacheEngine::configure_namespace` or lazily with defaults on first use.
//! A namespace configuration is immutable after registration: the first
//! registration wins and later attempts are ignored.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Write/read strategy for a namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheStrategy {
    /// Writes go to both tiers inline (default)
    WriteThrough,

    /// Writes land in L1 immediately; the remote write is deferred to a
    /// best-effort background task
    WriteBack,

    /// Writes bypass L1 and go to the remote tier only
    WriteAround,

    /// Read-through population via `get_with_fallback`; writes behave like
    /// write-through
    ReadThrough,
}

impl Default for CacheStrategy {
    fn default() -> Self {
        Self::WriteThrough
    }
}

/// Configuration for one cache namespace
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// TTL for entries in this namespace
    pub ttl_seconds: u64,

    /// Advisory per-namespace entry budget. The enforced L1 bound is the
    /// engine-wide `max_memory_entries`.
    pub max_size: usize,

    /// Write/read strategy
    pub strategy: CacheStrategy,

    /// Whether keys in this namespace are partitioned by tenant. When
    /// false, a tenant argument on operations is ignored.
    pub tenant_scoped: bool,

    /// Advisory: entries should be refreshed ahead of expiry by the owning
    /// business service
    pub auto_refresh: bool,

    /// Advisory: values benefit from compression before remote storage
    pub compression: bool,
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds.max(1))
    }

    /// Short-TTL configuration for session-like data
    pub fn for_sessions() -> Self {
        Self {
            ttl_seconds: 60,
            ..Self::default()
        }
    }

    /// Long-TTL configuration for slow-changing catalog data
    pub fn for_catalog() -> Self {
        Self {
            ttl_seconds: 3600,
            auto_refresh: true,
            ..Self::default()
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: 300,
            max_size: 1000,
            strategy: CacheStrategy::default(),
            tenant_scoped: true,
            auto_refresh: false,
            compression: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CacheConfig::default();
        assert_eq!(config.ttl(), Duration::from_secs(300));
        assert_eq!(config.strategy, CacheStrategy::WriteThrough);
        assert!(config.tenant_scoped);
    }

    #[test]
    fn test_ttl_floor() {
        let config = CacheConfig {
            ttl_seconds: 0,
            ..CacheConfig::default()
        };
        assert_eq!(config.ttl(), Duration::from_secs(1));
    }

    #[test]
    fn test_presets() {
        assert_eq!(CacheConfig::for_sessions().ttl_seconds, 60);
        assert!(CacheConfig::for_catalog().auto_refresh);
    }
}
