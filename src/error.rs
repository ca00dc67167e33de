//! # Structured Error Handling
//!
//! Top-level error type for the infrastructure resilience layer. Component
//! modules define their own error enums (`cache::CacheError`,
//! `resilience::ResilienceError`); this type exists for application startup
//! plumbing where a single error currency is convenient.

use crate::cache::CacheError;
use thiserror::Error;

/// Crate-level error type
#[derive(Debug, Error)]
pub enum CommerceError {
    /// Cache engine failure (only surfaced from `CacheEngine::initialize`)
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// Configuration loading or validation failure
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Resilience engine configuration failure
    #[error("Resilience error: {0}")]
    Resilience(String),
}

pub type Result<T> = std::result::Result<T, CommerceError>;
