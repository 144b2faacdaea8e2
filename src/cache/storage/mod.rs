//! Storage Backend Module
//!
//! The key/value contract the cache engine and garbage collector depend on.
//! Backends may be in-process or networked; every operation may fail with a
//! transient `StorageUnavailable`, which callers must read as "could not
//! confirm" rather than "absent".

mod memory;
mod redis_store;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::cache::CacheEntry;
use crate::error::Result;

pub use memory::MemoryStorage;
pub use redis_store::{RedisConfig, RedisStorage};

// == Scan Page ==
/// One bounded slice of a keyspace enumeration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanPage {
    /// Keys observed in this slice
    pub keys: Vec<String>,
    /// Cursor to resume from; 0 once a full pass has completed
    pub next_cursor: u64,
}

// == Storage Trait ==
/// Pluggable key/value store with per-entry expiry.
#[async_trait]
pub trait Storage: Send + Sync + fmt::Debug {
    /// Short backend name used in logs.
    fn kind(&self) -> &'static str;

    /// Fetches the entry stored under `key`, expired or not.
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>>;

    /// Stores `entry` under `entry.key`, replacing any previous entry.
    async fn set(&self, entry: CacheEntry) -> Result<()>;

    /// Deletes `key`. Deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Enumerates up to `chunk_size` keys starting at `cursor`.
    ///
    /// Repeated calls advancing the cursor cover the whole keyspace. Keys
    /// inserted during a pass may or may not be observed in that pass.
    /// Networked backends may treat `chunk_size` as a hint.
    async fn scan(&self, cursor: u64, chunk_size: usize) -> Result<ScanPage>;

    /// Number of stored entries, including expired ones not yet reclaimed.
    async fn len(&self) -> Result<usize>;
}

/// Shared handle to a storage backend.
pub type SharedStorage = Arc<dyn Storage>;
