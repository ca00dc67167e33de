//! Composite cache key construction
//!
//! Every entry in both tiers is addressed by a composite key that encodes
//! the namespace and (when scoped) the tenant:
//!
//! ```text
//! ns:{namespace}:{key}                 unscoped
//! ns:{namespace}:t:{tenant}:{key}      tenant-scoped
//! ```
//!
//! The namespace and tenant fragments always stay in the clear so pattern
//! and tenant invalidation can match on them. Only the caller-supplied key
//! part is digested (sha256 hex) when it exceeds the raw-length limit; the
//! digest is for fixed-length storage, not security.

use sha2::{Digest, Sha256};

/// Keys longer than this are replaced by their sha256 hex digest
const MAX_RAW_KEY_LEN: usize = 200;

/// Build the composite key for a namespace/tenant/key triple
pub fn composite_key(namespace: &str, key: &str, tenant: Option<&str>) -> String {
    let key_part = normalize_key(key);
    match tenant {
        Some(t) => format!("ns:{namespace}:{}{key_part}", tenant_fragment(t)),
        None => format!("ns:{namespace}:{key_part}"),
    }
}

/// Build a cache key for a function call: name plus serialized argument
/// signature, digested together when over-long
pub fn function_key(fn_name: &str, args_json: &str) -> String {
    normalize_key(&format!("{fn_name}({args_json})"))
}

/// The fragment identifying a tenant inside a composite key.
///
/// `invalidate_tenant` matches on this substring, so it must be
/// unambiguous: `t:{tenant}:` cannot collide with another tenant id that
/// is a prefix of this one.
pub fn tenant_fragment(tenant: &str) -> String {
    format!("t:{tenant}:")
}

/// The glob pattern selecting all remote-tier keys of a namespace that
/// contain `pattern`, optionally restricted to one tenant
pub fn namespace_glob(namespace: &str, pattern: &str, tenant: Option<&str>) -> String {
    match tenant {
        Some(t) => format!("ns:{namespace}:{}*{pattern}*", tenant_fragment(t)),
        None => format!("ns:{namespace}:*{pattern}*"),
    }
}

/// The composite-key prefix for a namespace (used for L1 scoping)
pub fn namespace_prefix(namespace: &str) -> String {
    format!("ns:{namespace}:")
}

/// Extract the namespace from a composite key, if well-formed
pub fn namespace_of(composite: &str) -> Option<&str> {
    let rest = composite.strip_prefix("ns:")?;
    let end = rest.find(':')?;
    Some(&rest[..end])
}

fn normalize_key(key: &str) -> String {
    if key.len() <= MAX_RAW_KEY_LEN {
        key.to_string()
    } else {
        let digest = Sha256::digest(key.as_bytes());
        hex::encode(digest)
    }
}
