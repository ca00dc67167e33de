//! Error classification for retry decisions
//!
//! Every failure is assigned exactly one category from a closed set, either
//! by a caller-supplied classifier that inspects the typed error, or by the
//! message-pattern fallback below. Retry policies are expressed in terms of
//! categories, never in terms of concrete error types.

use serde::{Deserialize, Serialize};

/// Closed set of failure categories
///
/// `Cancelled` is always fatal regardless of retry policy: retrying work the
/// caller no longer wants wastes downstream capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Short-lived failure expected to clear on its own
    Transient,
    /// Operation exceeded its deadline
    Timeout,
    /// Connectivity failure reaching the dependency
    Network,
    /// Dependency is throttling the caller
    RateLimit,
    /// Pools, quotas, or memory exhausted
    ResourceExhaustion,
    /// Downstream service is failing or unavailable
    DependencyFailure,
    /// Deterministic failure that will recur on retry
    Permanent,
    /// Misconfiguration; retrying cannot help
    Configuration,
    /// Caller abandoned the operation
    Cancelled,
    /// Could not be classified
    Unknown,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transient => "transient",
            Self::Timeout => "timeout",
            Self::Network => "network",
            Self::RateLimit => "rate_limit",
            Self::ResourceExhaustion => "resource_exhaustion",
            Self::DependencyFailure => "dependency_failure",
            Self::Permanent => "permanent",
            Self::Configuration => "configuration",
            Self::Cancelled => "cancelled",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify an error by message patterns.
///
/// Used when the caller does not supply a typed classifier. Pattern order
/// matters: more specific categories are checked before broader ones, and
/// anything unmatched is `Unknown` (retryable under the default policy,
/// since most unclassified production failures are transient).
pub fn classify_message(message: &str) -> ErrorCategory {
    let msg = message.to_lowercase();

    if msg.contains("cancelled") || msg.contains("canceled") || msg.contains("aborted by client") {
        ErrorCategory::Cancelled
    } else if msg.contains("rate limit")
        || msg.contains("too many requests")
        || msg.contains("429")
    {
        ErrorCategory::RateLimit
    } else if msg.contains("timeout") || msg.contains("timed out") || msg.contains("deadline") {
        ErrorCategory::Timeout
    } else if msg.contains("connection")
        || msg.contains("network")
        || msg.contains("unreachable")
        || msg.contains("refused")
        || msg.contains("dns")
        || msg.contains("broken pipe")
    {
        ErrorCategory::Network
    } else if msg.contains("pool exhausted")
        || msg.contains("out of memory")
        || msg.contains("quota")
        || msg.contains("capacity")
        || msg.contains("overloaded")
    {
        ErrorCategory::ResourceExhaustion
    } else if msg.contains("unavailable")
        || msg.contains("bad gateway")
        || msg.contains("502")
        || msg.contains("503")
        || msg.contains("504")
    {
        ErrorCategory::DependencyFailure
    } else if msg.contains("unauthorized")
        || msg.contains("forbidden")
        || msg.contains("not found")
        || msg.contains("invalid")
        || msg.contains("validation")
        || msg.contains("401")
        || msg.contains("403")
        || msg.contains("404")
        || msg.contains("422")
    {
        ErrorCategory::Permanent
    } else if msg.contains("configuration") || msg.contains("misconfigured") {
        ErrorCategory::Configuration
    } else if msg.contains("temporar") || msg.contains("try again") {
        ErrorCategory::Transient
    } else {
        ErrorCategory::Unknown
    }
}
