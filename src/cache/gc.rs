//! Garbage Collection
//!
//! Two sweeps per namespace:
//! - lazy walks the storage keyspace one chunk per run, resuming where the
//!   previous run stopped, and deletes expired entries from storage and index.
//! - strict walks the index, dropping keys whose entry is gone or expired.

use std::fmt;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use crate::cache::engine::Namespace;
use crate::cache::entry::current_timestamp_ms;
use crate::cache::storage::Storage;
use crate::error::Result;

/// Which sweep produced a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GcMode {
    Lazy,
    Strict,
}

impl fmt::Display for GcMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GcMode::Lazy => f.write_str("lazy"),
            GcMode::Strict => f.write_str("strict"),
        }
    }
}

// == GC Report ==
/// Outcome of one sweep over one namespace.
#[derive(Debug, Clone, PartialEq)]
pub struct GcReport {
    pub mode: GcMode,
    pub namespace: String,
    /// Keys looked at
    pub inspected: usize,
    /// Keys removed
    pub removed: usize,
    pub elapsed: Duration,
    /// Lazy cursor after the run; 0 means the keyspace wrapped
    pub cursor: u64,
    /// True if the sweep stopped on a storage error
    pub error: bool,
    pub message: Option<String>,
}

impl GcReport {
    fn new(mode: GcMode, namespace: &str, cursor: u64) -> Self {
        Self {
            mode,
            namespace: namespace.to_string(),
            inspected: 0,
            removed: 0,
            elapsed: Duration::ZERO,
            cursor,
            error: false,
            message: None,
        }
    }

    fn fail(&mut self, err: impl fmt::Display) {
        self.error = true;
        self.message = Some(err.to_string());
    }
}

impl Namespace {
    // == Lazy Sweep ==
    /// Scans one chunk of storage from the saved cursor.
    ///
    /// The cursor only advances when the whole chunk was processed, so a
    /// failed run is retried from the same place.
    pub async fn gc_lazy(&self, chunk_size: usize) -> GcReport {
        let started = Instant::now();
        let cursor = self.gc_cursor.load(Ordering::SeqCst);
        let mut report = GcReport::new(GcMode::Lazy, &self.name, cursor);

        match self.sweep_lazy(cursor, chunk_size.max(1), &mut report).await {
            Ok(next) => {
                self.gc_cursor.store(next, Ordering::SeqCst);
                report.cursor = next;
            }
            Err(err) => report.fail(err),
        }

        report.elapsed = started.elapsed();
        report
    }

    async fn sweep_lazy(&self, cursor: u64, chunk_size: usize, report: &mut GcReport) -> Result<u64> {
        let page = self.storage.scan(cursor, chunk_size).await?;
        let now = current_timestamp_ms();

        for key in page.keys {
            report.inspected += 1;
            let Some(entry) = self.storage.get(&key).await? else {
                continue;
            };
            if entry.is_expired_at(now) {
                self.storage.delete(&key).await?;
                self.index.remove_if(&key, entry.revision);
                report.removed += 1;
            }
        }

        Ok(page.next_cursor)
    }

    // == Strict Sweep ==
    /// Walks every indexed key in chunks, yielding to the runtime between
    /// chunks, and forgets keys whose entry is absent or expired.
    pub async fn gc_strict(&self, chunk_size: usize) -> GcReport {
        let started = Instant::now();
        let mut report = GcReport::new(GcMode::Strict, &self.name, 0);

        if let Err(err) = self.sweep_strict(chunk_size.max(1), &mut report).await {
            report.fail(err);
        }

        report.elapsed = started.elapsed();
        report
    }

    async fn sweep_strict(&self, chunk_size: usize, report: &mut GcReport) -> Result<()> {
        let keys = self.index.keys();

        for chunk in keys.chunks(chunk_size) {
            let now = current_timestamp_ms();
            for key in chunk {
                report.inspected += 1;
                // Snapshot before the read so a concurrent re-store survives
                let Some(revision) = self.index.revision_of(key) else {
                    continue;
                };
                match self.storage.get(key).await? {
                    Some(entry) if !entry.is_expired_at(now) => {}
                    Some(entry) => {
                        self.storage.delete(key).await?;
                        if self.index.remove_if(key, entry.revision).is_some() {
                            report.removed += 1;
                        }
                    }
                    None => {
                        if self.index.remove_if(key, revision).is_some() {
                            report.removed += 1;
                        }
                    }
                }
            }
            tokio::task::yield_now().await;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::entry::CacheEntry;
    use crate::cache::storage::MemoryStorage;
    use serde_json::json;
    use std::collections::BTreeSet;
    use std::sync::Arc;

    fn namespace(shards: usize) -> Namespace {
        Namespace::new("default", Arc::new(MemoryStorage::new(shards)))
    }

    async fn insert(ns: &Namespace, key: &str, ttl: Duration, revision: u64) {
        let tags: BTreeSet<String> = [format!("tag:{key}")].into_iter().collect();
        let entry = CacheEntry::new(key.to_string(), json!(key), ttl, tags.clone(), revision);
        ns.storage.set(entry).await.unwrap();
        ns.index.record(key, tags, revision);
    }

    #[tokio::test]
    async fn test_lazy_removes_only_expired() {
        let ns = namespace(1);
        insert(&ns, "fresh", Duration::from_secs(60), 1).await;
        insert(&ns, "stale", Duration::ZERO, 2).await;
        tokio::time::sleep(Duration::from_millis(5)).await;

        let report = ns.gc_lazy(10).await;

        assert!(!report.error);
        assert_eq!(report.mode, GcMode::Lazy);
        assert_eq!(report.inspected, 2);
        assert_eq!(report.removed, 1);
        assert_eq!(report.cursor, 0);
        assert!(ns.storage.get("fresh").await.unwrap().is_some());
        assert!(ns.storage.get("stale").await.unwrap().is_none());
        assert!(ns.index.tags_for("stale").is_none());
        assert!(ns.index.is_consistent());
    }

    #[tokio::test]
    async fn test_lazy_cursor_advances_and_wraps() {
        let ns = namespace(4);
        for i in 0..8 {
            insert(&ns, &format!("k{i}"), Duration::from_secs(60), i).await;
        }

        let mut inspected = 0;
        let mut runs = 0;
        loop {
            let report = ns.gc_lazy(1).await;
            assert!(report.inspected <= 1);
            inspected += report.inspected;
            runs += 1;
            if report.cursor == 0 {
                break;
            }
            assert_eq!(ns.gc_cursor(), report.cursor);
        }

        assert_eq!(inspected, 8);
        assert!(runs <= 9);
    }

    #[tokio::test]
    async fn test_lazy_work_is_bounded_on_large_keyspace() {
        let ns = namespace(64);
        for i in 0..20_000 {
            insert(&ns, &format!("k{i}"), Duration::from_secs(60), i).await;
        }

        let report = ns.gc_lazy(64).await;

        assert!(!report.error);
        assert!(report.inspected <= 64, "inspected {}", report.inspected);
        assert!(report.inspected > 0);
        assert_ne!(report.cursor, 0);
    }

    #[tokio::test]
    async fn test_strict_drops_orphaned_index_keys() {
        let ns = namespace(2);
        insert(&ns, "kept", Duration::from_secs(60), 1).await;
        insert(&ns, "orphan", Duration::from_secs(60), 2).await;
        insert(&ns, "stale", Duration::ZERO, 3).await;
        ns.storage.delete("orphan").await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;

        let report = ns.gc_strict(1).await;

        assert!(!report.error);
        assert_eq!(report.inspected, 3);
        assert_eq!(report.removed, 2);
        assert_eq!(ns.index.keys(), vec!["kept".to_string()]);
        assert!(ns.storage.get("stale").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_strict_keeps_newer_revision() {
        let ns = namespace(1);
        insert(&ns, "key", Duration::from_secs(60), 1).await;
        ns.storage.delete("key").await.unwrap();
        // Re-stored after the orphaning delete
        insert(&ns, "key", Duration::from_secs(60), 5).await;

        let report = ns.gc_strict(8).await;

        assert_eq!(report.removed, 0);
        assert_eq!(ns.index.revision_of("key"), Some(5));
    }

    #[test]
    fn test_mode_display() {
        assert_eq!(GcMode::Lazy.to_string(), "lazy");
        assert_eq!(GcMode::Strict.to_string(), "strict");
    }
}
