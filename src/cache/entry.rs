//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL support.

use std::collections::BTreeSet;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;

// == Cache Entry ==
/// Represents a single cached result with its expiry and dependency tags.
///
/// Entries are never mutated in place; a fresh computation replaces the whole entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Cache key this entry is stored under
    pub key: String,
    /// The cached result
    pub value: Value,
    /// Expiration timestamp (Unix milliseconds)
    pub expires_at: u64,
    /// Tags the result depends on
    pub tags: BTreeSet<String>,
    /// Write revision, increasing across all writes of one engine
    pub revision: u64,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new cache entry expiring `ttl` from now.
    pub fn new(
        key: impl Into<String>,
        value: Value,
        ttl: Duration,
        tags: BTreeSet<String>,
        revision: u64,
    ) -> Self {
        let now = current_timestamp_ms();
        Self {
            key: key.into(),
            value,
            expires_at: now.saturating_add(ttl.as_millis() as u64),
            tags,
            revision,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// An entry stays valid for its whole TTL and is expired only once the
    /// current time is strictly past `expires_at`.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(current_timestamp_ms())
    }

    /// Checks expiry against an explicit timestamp (Unix milliseconds).
    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        now_ms > self.expires_at
    }

    // == Time To Live ==
    /// Returns remaining TTL in milliseconds, 0 once expired.
    pub fn ttl_remaining_ms(&self) -> u64 {
        self.expires_at.saturating_sub(current_timestamp_ms())
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::thread::sleep;

    fn tags(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn test_entry_creation() {
        let entry = CacheEntry::new("user~abc", json!({"id": 1}), Duration::from_secs(60), tags(&["user:1"]), 7);

        assert_eq!(entry.key, "user~abc");
        assert_eq!(entry.value, json!({"id": 1}));
        assert_eq!(entry.revision, 7);
        assert!(entry.tags.contains("user:1"));
        assert!(!entry.is_expired());
    }

    #[test]
    fn test_entry_expiration() {
        let entry = CacheEntry::new("k", json!(1), Duration::from_millis(50), tags(&[]), 1);

        assert!(!entry.is_expired());

        // Wait for expiration
        sleep(Duration::from_millis(120));

        assert!(entry.is_expired());
        assert_eq!(entry.ttl_remaining_ms(), 0);
    }

    #[test]
    fn test_ttl_remaining_ms() {
        let entry = CacheEntry::new("k", json!(1), Duration::from_secs(10), tags(&[]), 1);

        let remaining_ms = entry.ttl_remaining_ms();
        assert!(remaining_ms <= 10_000);
        assert!(remaining_ms >= 9_000);
    }

    #[test]
    fn test_expiration_boundary_condition() {
        let now = current_timestamp_ms();
        let entry = CacheEntry {
            key: "k".to_string(),
            value: json!(null),
            expires_at: now,
            tags: tags(&[]),
            revision: 1,
        };

        // Still valid at exactly expires_at, expired one millisecond later
        assert!(!entry.is_expired_at(now));
        assert!(entry.is_expired_at(now + 1));
    }
}
