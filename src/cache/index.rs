//! Reference Index
//!
//! Bidirectional mapping between cache keys and the tags they depend on:
//!
//! - forward: key → tags (plus the revision of the write that recorded them)
//! - reverse: tag → keys
//!
//! Both maps are sharded, so unrelated keys and tags never contend. Every
//! mutation of a key happens while that key's forward entry is locked, which
//! serializes `record`/`remove` per key. Locks are always taken forward first,
//! then reverse, one reverse shard at a time.

use std::collections::{BTreeSet, HashSet};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

#[derive(Debug, Clone)]
struct IndexRecord {
    tags: BTreeSet<String>,
    revision: u64,
}

// == Reference Index ==
/// Tracks which cache keys depend on which tags.
///
/// The index mirrors the storage keyspace but never touches storage itself.
/// It may briefly hold keys whose entry is already gone; the strict sweep
/// reconciles those.
#[derive(Debug, Default)]
pub struct ReferenceIndex {
    forward: DashMap<String, IndexRecord>,
    reverse: DashMap<String, HashSet<String>>,
}

impl ReferenceIndex {
    /// Create a new empty index.
    pub fn new() -> Self {
        Self::default()
    }

    // == Record ==
    /// Replaces the tag set of `key` with `tags`.
    ///
    /// Tags no longer present are unlinked, new ones linked. A write whose
    /// revision is older than the one already recorded is ignored and
    /// `false` is returned.
    pub fn record(&self, key: &str, tags: BTreeSet<String>, revision: u64) -> bool {
        match self.forward.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().revision > revision {
                    return false;
                }
                let previous = &occupied.get().tags;
                for stale in previous.difference(&tags) {
                    self.unlink(stale, key);
                }
                for added in tags.difference(previous) {
                    self.link(added, key);
                }
                occupied.insert(IndexRecord { tags, revision });
            }
            Entry::Vacant(vacant) => {
                for tag in &tags {
                    self.link(tag, key);
                }
                vacant.insert(IndexRecord { tags, revision });
            }
        }
        true
    }

    // == Lookup ==
    /// Keys currently depending on `tag`.
    pub fn lookup_keys_for_tag(&self, tag: &str) -> HashSet<String> {
        self.reverse
            .get(tag)
            .map(|keys| keys.clone())
            .unwrap_or_default()
    }

    /// Tags recorded for `key`, if the key is indexed.
    pub fn tags_for(&self, key: &str) -> Option<BTreeSet<String>> {
        self.forward.get(key).map(|record| record.tags.clone())
    }

    /// Revision of the write that last recorded `key`.
    pub fn revision_of(&self, key: &str) -> Option<u64> {
        self.forward.get(key).map(|record| record.revision)
    }

    // == Remove ==
    /// Removes `key` from both maps, returning the tags it had.
    pub fn remove(&self, key: &str) -> Option<BTreeSet<String>> {
        self.remove_where(key, |_| true)
    }

    /// Removes `key` only if nothing newer than `revision` has been recorded.
    ///
    /// Used after a storage delete so that a concurrent re-population of the
    /// same key keeps its fresh tags.
    pub fn remove_if(&self, key: &str, revision: u64) -> Option<BTreeSet<String>> {
        self.remove_where(key, |record| record.revision <= revision)
    }

    fn remove_where(
        &self,
        key: &str,
        predicate: impl FnOnce(&IndexRecord) -> bool,
    ) -> Option<BTreeSet<String>> {
        match self.forward.entry(key.to_string()) {
            Entry::Occupied(occupied) if predicate(occupied.get()) => {
                for tag in &occupied.get().tags {
                    self.unlink(tag, key);
                }
                Some(occupied.remove().tags)
            }
            _ => None,
        }
    }

    // == Enumeration ==
    /// Snapshot of every indexed key, in sorted order.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.forward.iter().map(|e| e.key().clone()).collect();
        keys.sort_unstable();
        keys
    }

    /// Number of indexed keys.
    pub fn len(&self) -> usize {
        self.forward.len()
    }

    /// True if no key is indexed.
    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    /// Number of tags with at least one dependent key.
    pub fn tag_count(&self) -> usize {
        self.reverse.len()
    }

    /// Checks that forward and reverse agree in both directions.
    ///
    /// Only meaningful while no writer is active.
    pub fn is_consistent(&self) -> bool {
        let forward_ok = self.forward.iter().all(|entry| {
            entry.tags.iter().all(|tag| {
                self.reverse
                    .get(tag)
                    .is_some_and(|keys| keys.contains(entry.key()))
            })
        });
        // Snapshot first: holding reverse while reading forward inverts the lock order
        let reverse: Vec<(String, HashSet<String>)> = self
            .reverse
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        let reverse_ok = reverse.iter().all(|(tag, keys)| {
            !keys.is_empty()
                && keys.iter().all(|key| {
                    self.forward
                        .get(key)
                        .is_some_and(|record| record.tags.contains(tag))
                })
        });
        forward_ok && reverse_ok
    }

    fn link(&self, tag: &str, key: &str) {
        self.reverse
            .entry(tag.to_string())
            .or_default()
            .insert(key.to_string());
    }

    fn unlink(&self, tag: &str, key: &str) {
        if let Entry::Occupied(mut keys) = self.reverse.entry(tag.to_string()) {
            keys.get_mut().remove(key);
            if keys.get().is_empty() {
                keys.remove();
            }
        }
    }
}
