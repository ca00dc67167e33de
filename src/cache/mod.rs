//! # Multi-Level Cache
//!
//! Tenant-aware caching for the commerce platform: a bounded in-process L1
//! tier with LRU eviction in front of a shared Redis L2 tier, addressed by
//! composite keys that encode namespace and tenant.
//!
//! ## Architecture
//!
//! ```text
//! CacheEngine
//!   ├── MemoryTier (L1)   bounded HashMap, last-access LRU, expiry sweep
//!   ├── RemoteTier (L2)   Redis via ConnectionManager, or NoOp when disabled
//!   ├── MetricsRegistry   per-namespace lock-free counters
//!   └── background loops  expiry sweep + metrics summary, watch-cancelled
//! ```
//!
//! After `initialize`, cache operations never fail: remote-tier and
//! serialization errors degrade to a miss or a `false` return and are
//! logged. The cache is an accelerator, not a source of truth.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use commerce_core::cache::{CacheConfig, CacheEngine};
//! use commerce_core::config::CacheEngineSettings;
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = CacheEngine::new(CacheEngineSettings::default());
//! engine.initialize().await?;
//!
//! engine.configure_namespace("products", CacheConfig::for_catalog());
//! engine.set("products", "sku-123", &json!({"price": 1999}), Some("acme"), None).await;
//! let cached = engine.get("products", "sku-123", Some("acme")).await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod engine;
pub mod errors;
pub mod key;
pub mod metrics;

mod memory;
mod remote;

pub use config::{CacheConfig, CacheStrategy};
pub use engine::CacheEngine;
pub use errors::{CacheError, CacheResult};
pub use metrics::CacheMetrics;
