//! # Commerce Core
//!
//! Infrastructure resilience layer for a multi-tenant commerce platform:
//! a tenant-aware multi-level cache and a retry/circuit-breaker engine for
//! calls to external dependencies.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │            Business Services                │
//! │   (catalog, orders, payments, search, ...)  │
//! └──────────────┬───────────────┬──────────────┘
//!                │               │
//!     ┌──────────▼─────┐  ┌──────▼─────────────┐
//!     │  CacheEngine   │  │  ResilienceEngine  │
//!     │  L1 + Redis L2 │  │  retry + breakers  │
//!     └────────────────┘  └────────────────────┘
//! ```
//!
//! Both engines are constructed from [`config::CommerceConfig`], owned by
//! the application lifecycle, and shared as `Arc` handles. The cache never
//! surfaces errors after initialization; the resilience engine wraps the
//! caller's own error type in [`resilience::ResilienceError`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use commerce_core::cache::CacheEngine;
//! use commerce_core::config::CommerceConfig;
//! use commerce_core::resilience::{RequestContext, ResilienceEngine};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! commerce_core::logging::init_structured_logging();
//! let config = CommerceConfig::load()?;
//!
//! let cache = CacheEngine::new(config.cache.clone());
//! cache.initialize().await?;
//!
//! let resilience = ResilienceEngine::new(config.resilience.clone());
//! let ctx = RequestContext::for_tenant("acme");
//! let inventory: Result<u32, _> = resilience
//!     .execute_with_retry("warehouse", "stock_check", &ctx, |_attempt| async {
//!         Ok::<u32, String>(42)
//!     })
//!     .await;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod logging;
pub mod resilience;

pub use cache::{CacheConfig, CacheEngine, CacheMetrics, CacheStrategy};
pub use config::CommerceConfig;
pub use error::{CommerceError, Result};
pub use resilience::{
    CircuitBreakerConfig, CircuitState, ErrorCategory, HealthStatus, RequestContext,
    ResilienceEngine, ResilienceError, RetryConfig,
};
