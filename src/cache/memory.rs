//! In-process (L1) cache tier
//!
//! A bounded map of serialized values with per-entry expiry and
//! least-recently-accessed eviction. Eviction scans for the oldest
//! `last_access` timestamp; O(n) at the bounded capacities used in
//! practice. The expiry sweep is independent of eviction and removes
//! expired entries even when the tier is under capacity.
//!
//! The lock is a synchronous `parking_lot::RwLock` and is never held
//! across an await point.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// A single L1 entry holding the serialized value
#[derive(Debug, Clone)]
pub(crate) struct MemoryEntry {
    pub value: String,
    pub expires_at: Instant,
    pub last_access: Instant,
}

impl MemoryEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Bounded in-process tier keyed by composite key
#[derive(Debug)]
pub(crate) struct MemoryTier {
    entries: RwLock<HashMap<String, MemoryEntry>>,
    capacity: usize,
}

impl MemoryTier {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Look up a key. Updates the last-access timestamp on hit; an entry
    /// found expired is removed and reported as a miss.
    pub fn get(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        let mut entries = self.entries.write();
        match entries.get_mut(key) {
            Some(entry) if entry.is_expired(now) => {
                entries.remove(key);
                None
            }
            Some(entry) => {
                entry.last_access = now;
                Some(entry.value.clone())
            }
            None => None,
        }
    }

    /// Insert a value, evicting the least-recently-accessed entry first if
    /// the tier is at capacity. Returns the evicted key, if any.
    pub fn insert(&self, key: String, value: String, ttl: Duration) -> Option<String> {
        let now = Instant::now();
        let mut entries = self.entries.write();

        let evicted = if entries.len() >= self.capacity && !entries.contains_key(&key) {
            let victim = entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_access)
                .map(|(k, _)| k.clone());
            if let Some(ref victim_key) = victim {
                entries.remove(victim_key);
            }
            victim
        } else {
            None
        };

        entries.insert(
            key,
            MemoryEntry {
                value,
                expires_at: now + ttl,
                last_access: now,
            },
        );

        evicted
    }

    /// Remove a key; absent keys are not an error
    pub fn remove(&self, key: &str) -> bool {
        self.entries.write().remove(key).is_some()
    }

    /// Remove every entry whose key contains `fragment` as a substring,
    /// optionally restricted to keys starting with `prefix`.
    /// Returns the removed keys.
    pub fn remove_matching(&self, fragment: &str, prefix: Option<&str>) -> Vec<String> {
        let mut entries = self.entries.write();
        let matched: Vec<String> = entries
            .keys()
            .filter(|k| {
                k.contains(fragment) && prefix.map_or(true, |p| k.starts_with(p))
            })
            .cloned()
            .collect();
        for key in &matched {
            entries.remove(key);
        }
        matched
    }

    /// Remove all expired entries, returning their keys
    pub fn sweep_expired(&self) -> Vec<String> {
        let now = Instant::now();
        let mut entries = self.entries.write();
        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &expired {
            entries.remove(key);
        }
        expired
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_get() {
        let tier = MemoryTier::new(10);
        tier.insert("k1".to_string(), "v1".to_string(), Duration::from_secs(60));
        assert_eq!(tier.get("k1"), Some("v1".to_string()));
        assert_eq!(tier.get("absent"), None);
    }

    #[test]
    fn test_expired_entry_is_a_miss() {
        let tier = MemoryTier::new(10);
        tier.insert("k1".to_string(), "v1".to_string(), Duration::ZERO);
        assert_eq!(tier.get("k1"), None);
        assert_eq!(tier.len(), 0); // removed lazily on access
    }

    #[test]
    fn test_lru_eviction_picks_oldest_access() {
        let tier = MemoryTier::new(2);
        tier.insert("a".to_string(), "1".to_string(), Duration::from_secs(60));
        std::thread::sleep(Duration::from_millis(5));
        tier.insert("b".to_string(), "2".to_string(), Duration::from_secs(60));
        std::thread::sleep(Duration::from_millis(5));

        // Touch "a" so "b" becomes least recently accessed
        assert!(tier.get("a").is_some());
        std::thread::sleep(Duration::from_millis(5));

        let evicted = tier.insert("c".to_string(), "3".to_string(), Duration::from_secs(60));
        assert_eq!(evicted, Some("b".to_string()));
        assert_eq!(tier.len(), 2);
        assert!(tier.get("a").is_some());
        assert!(tier.get("c").is_some());
    }

    #[test]
    fn test_capacity_never_exceeded() {
        let tier = MemoryTier::new(3);
        for i in 0..20 {
            tier.insert(
                format!("k{i}"),
                "v".to_string(),
                Duration::from_secs(60),
            );
            assert!(tier.len() <= 3);
        }
    }

    #[test]
    fn test_overwrite_does_not_evict() {
        let tier = MemoryTier::new(2);
        tier.insert("a".to_string(), "1".to_string(), Duration::from_secs(60));
        tier.insert("b".to_string(), "2".to_string(), Duration::from_secs(60));
        let evicted = tier.insert("a".to_string(), "updated".to_string(), Duration::from_secs(60));
        assert_eq!(evicted, None);
        assert_eq!(tier.get("a"), Some("updated".to_string()));
    }

    #[test]
    fn test_remove_matching_with_prefix() {
        let tier = MemoryTier::new(10);
        tier.insert(
            "ns:products:t:acme:sku-1".to_string(),
            "v".to_string(),
            Duration::from_secs(60),
        );
        tier.insert(
            "ns:products:t:other:sku-2".to_string(),
            "v".to_string(),
            Duration::from_secs(60),
        );
        tier.insert(
            "ns:orders:t:acme:sku-3".to_string(),
            "v".to_string(),
            Duration::from_secs(60),
        );

        let removed = tier.remove_matching("sku", Some("ns:products:"));
        assert_eq!(removed.len(), 2);
        assert_eq!(tier.len(), 1);
        assert!(tier.get("ns:orders:t:acme:sku-3").is_some());
    }

    #[test]
    fn test_remove_matching_tenant_fragment() {
        let tier = MemoryTier::new(10);
        tier.insert(
            "ns:products:t:acme:sku-1".to_string(),
            "v".to_string(),
            Duration::from_secs(60),
        );
        tier.insert(
            "ns:orders:t:acme:o-1".to_string(),
            "v".to_string(),
            Duration::from_secs(60),
        );
        tier.insert(
            "ns:orders:t:acme2:o-2".to_string(),
            "v".to_string(),
            Duration::from_secs(60),
        );

        let removed = tier.remove_matching("t:acme:", None);
        assert_eq!(removed.len(), 2);
        assert!(tier.get("ns:orders:t:acme2:o-2").is_some());
    }

    #[test]
    fn test_sweep_expired() {
        let tier = MemoryTier::new(10);
        tier.insert("live".to_string(), "v".to_string(), Duration::from_secs(60));
        tier.insert("dead1".to_string(), "v".to_string(), Duration::ZERO);
        tier.insert("dead2".to_string(), "v".to_string(), Duration::ZERO);

        let mut swept = tier.sweep_expired();
        swept.sort();
        assert_eq!(swept, vec!["dead1".to_string(), "dead2".to_string()]);
        assert_eq!(tier.len(), 1);
    }
}
