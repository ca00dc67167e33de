//! # Configuration Management
//!
//! Environment-aware settings for the cache and resilience engines. Settings
//! are layered: built-in defaults, then an optional TOML file, then
//! `COMMERCE_*` environment variables. The loaded configuration is validated
//! before the engines see it.
//!
//! Engines are constructed explicitly from these settings and owned by the
//! application lifecycle; there is no ambient global configuration state.

use crate::error::CommerceError;
use crate::resilience::{CircuitBreakerConfig, RetryConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Top-level configuration for the infrastructure resilience layer
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommerceConfig {
    /// Cache engine settings
    #[serde(default)]
    pub cache: CacheEngineSettings,

    /// Resilience engine settings
    #[serde(default)]
    pub resilience: ResilienceSettings,
}

/// Startup settings for the cache engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEngineSettings {
    /// Whether the remote (L2) tier is enabled. When false the engine runs
    /// in-memory only with a no-op remote tier.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Redis connection URL for the remote tier
    #[serde(default = "default_redis_url")]
    pub redis_url: String,

    /// Default TTL applied when neither the caller nor the namespace
    /// configuration specifies one
    #[serde(default = "default_ttl_seconds")]
    pub default_ttl_seconds: u64,

    /// Maximum number of entries held in the in-process (L1) tier
    #[serde(default = "default_max_memory_entries")]
    pub max_memory_entries: usize,

    /// Interval between L1 expiry sweeps
    #[serde(default = "default_sweep_interval_seconds")]
    pub sweep_interval_seconds: u64,

    /// Interval between metrics summary log lines
    #[serde(default = "default_metrics_interval_seconds")]
    pub metrics_interval_seconds: u64,
}

impl CacheEngineSettings {
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_seconds)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_seconds.max(1))
    }

    pub fn metrics_interval(&self) -> Duration {
        Duration::from_secs(self.metrics_interval_seconds.max(1))
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<(), String> {
        if self.default_ttl_seconds == 0 {
            return Err("default_ttl_seconds must be greater than 0".to_string());
        }
        if self.max_memory_entries == 0 {
            return Err("max_memory_entries must be greater than 0".to_string());
        }
        if self.enabled && self.redis_url.is_empty() {
            return Err("redis_url must be set when the remote tier is enabled".to_string());
        }
        Ok(())
    }
}

impl Default for CacheEngineSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            redis_url: default_redis_url(),
            default_ttl_seconds: default_ttl_seconds(),
            max_memory_entries: default_max_memory_entries(),
            sweep_interval_seconds: default_sweep_interval_seconds(),
            metrics_interval_seconds: default_metrics_interval_seconds(),
        }
    }
}

/// Startup settings for the resilience engine
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResilienceSettings {
    /// Retry policy applied to operation types with no explicit configuration
    #[serde(default)]
    pub default_retry: RetryConfig,

    /// Circuit breaker configuration applied to services with no explicit
    /// configuration
    #[serde(default)]
    pub default_circuit_breaker: CircuitBreakerConfig,
}

impl CommerceConfig {
    /// Load configuration with environment layering.
    ///
    /// Sources, later wins: defaults, the TOML file at `COMMERCE_CONFIG_PATH`
    /// (if set and present), then `COMMERCE_*` environment variables using
    /// `__` as the section separator (e.g. `COMMERCE_CACHE__REDIS_URL`).
    pub fn load() -> Result<Self, CommerceError> {
        let mut builder = config::Config::builder();

        if let Ok(path) = std::env::var("COMMERCE_CONFIG_PATH") {
            debug!(path = %path, "Loading configuration file");
            builder = builder.add_source(config::File::from(Path::new(&path)).required(false));
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix("COMMERCE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| CommerceError::Configuration(e.to_string()))?;

        let loaded: CommerceConfig = settings
            .try_deserialize()
            .map_err(|e| CommerceError::Configuration(e.to_string()))?;

        loaded.validate()?;
        Ok(loaded)
    }

    /// Validate all sections
    pub fn validate(&self) -> Result<(), CommerceError> {
        self.cache.validate().map_err(CommerceError::Configuration)?;
        self.resilience
            .default_retry
            .validate()
            .map_err(CommerceError::Resilience)?;
        self.resilience
            .default_circuit_breaker
            .validate()
            .map_err(CommerceError::Resilience)?;
        Ok(())
    }
}

fn default_true() -> bool {
    true
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_ttl_seconds() -> u64 {
    300
}

fn default_max_memory_entries() -> usize {
    1000
}

fn default_sweep_interval_seconds() -> u64 {
    60
}

fn default_metrics_interval_seconds() -> u64 {
    300
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = CommerceConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.cache.enabled);
        assert_eq!(config.cache.default_ttl(), Duration::from_secs(300));
        assert_eq!(config.cache.max_memory_entries, 1000);
    }

    #[test]
    fn test_cache_settings_validation() {
        let mut settings = CacheEngineSettings::default();
        assert!(settings.validate().is_ok());

        settings.default_ttl_seconds = 0;
        assert!(settings.validate().is_err());

        settings.default_ttl_seconds = 60;
        settings.max_memory_entries = 0;
        assert!(settings.validate().is_err());

        settings.max_memory_entries = 10;
        settings.redis_url = String::new();
        assert!(settings.validate().is_err());

        // In-memory only mode does not need a URL
        settings.enabled = false;
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_interval_floors() {
        let settings = CacheEngineSettings {
            sweep_interval_seconds: 0,
            metrics_interval_seconds: 0,
            ..CacheEngineSettings::default()
        };
        assert_eq!(settings.sweep_interval(), Duration::from_secs(1));
        assert_eq!(settings.metrics_interval(), Duration::from_secs(1));
    }
}
