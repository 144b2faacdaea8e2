//! In-memory storage backend.
//!
//! Entries live in a fixed number of independently locked shards. A scan
//! cursor packs a shard index (high 32 bits) with a position inside that
//! shard (low 32 bits). Positions come from the key's hash, not from its
//! slot in the map, so concurrent deletes never make a pass skip a live key.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::RwLock;

use async_trait::async_trait;

use super::{ScanPage, Storage};
use crate::cache::lock::{rw_read, rw_write};
use crate::cache::CacheEntry;
use crate::error::Result;

/// Default number of shards.
pub const DEFAULT_SHARDS: usize = 64;

// == Memory Storage ==
/// Sharded in-process key/value store.
#[derive(Debug)]
pub struct MemoryStorage {
    shards: Vec<RwLock<HashMap<String, CacheEntry>>>,
}

impl MemoryStorage {
    // == Constructor ==
    /// Creates a store split into `shard_count` shards (at least one).
    pub fn new(shard_count: usize) -> Self {
        let shards = (0..shard_count.max(1))
            .map(|_| RwLock::new(HashMap::new()))
            .collect();
        Self { shards }
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    fn shard_for(&self, key: &str) -> &RwLock<HashMap<String, CacheEntry>> {
        let idx = (key_hash(key) % self.shards.len() as u64) as usize;
        &self.shards[idx]
    }

    /// Keys of shard `idx` at or after `from`, ordered by scan position.
    fn shard_keys_from(&self, idx: usize, from: u32) -> Vec<(u32, String)> {
        let mut keys: Vec<(u32, String)> = rw_read(&self.shards[idx], "memory.scan")
            .keys()
            .map(|key| (scan_position(key), key.clone()))
            .filter(|(pos, _)| *pos >= from)
            .collect();
        keys.sort_unstable();
        keys
    }
}

fn key_hash(key: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    hasher.finish()
}

/// Stable position of `key` inside its shard.
fn scan_position(key: &str) -> u32 {
    (key_hash(key) >> 32) as u32
}

fn pack_cursor(shard: usize, position: u32) -> u64 {
    ((shard as u64) << 32) | u64::from(position)
}

fn unpack_cursor(cursor: u64) -> (usize, u32) {
    ((cursor >> 32) as usize, cursor as u32)
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new(DEFAULT_SHARDS)
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    fn kind(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        Ok(rw_read(self.shard_for(key), "memory.get").get(key).cloned())
    }

    async fn set(&self, entry: CacheEntry) -> Result<()> {
        rw_write(self.shard_for(&entry.key), "memory.set").insert(entry.key.clone(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        rw_write(self.shard_for(key), "memory.delete").remove(key);
        Ok(())
    }

    async fn scan(&self, cursor: u64, chunk_size: usize) -> Result<ScanPage> {
        let chunk_size = chunk_size.max(1);
        let total = self.shards.len();
        let (mut idx, mut from) = unpack_cursor(cursor);
        // A cursor from a larger store restarts the pass
        if idx >= total {
            idx = 0;
            from = 0;
        }
        let mut keys = Vec::new();

        while idx < total {
            let candidates = self.shard_keys_from(idx, from);
            let mut taken = 0;

            while taken < candidates.len() {
                let position = candidates[taken].0;
                // Keys sharing a position are returned together so the cursor can step past them
                let group = candidates[taken..]
                    .iter()
                    .take_while(|(pos, _)| *pos == position)
                    .count();
                if !keys.is_empty() && keys.len() + group > chunk_size {
                    return Ok(ScanPage {
                        keys,
                        next_cursor: pack_cursor(idx, position),
                    });
                }
                keys.extend(candidates[taken..taken + group].iter().map(|(_, key)| key.clone()));
                taken += group;

                if keys.len() >= chunk_size && taken < candidates.len() {
                    return Ok(ScanPage {
                        keys,
                        next_cursor: pack_cursor(idx, candidates[taken].0),
                    });
                }
            }

            idx += 1;
            from = 0;
            if keys.len() >= chunk_size {
                break;
            }
        }

        let next_cursor = if idx >= total { 0 } else { pack_cursor(idx, 0) };
        Ok(ScanPage { keys, next_cursor })
    }

    async fn len(&self) -> Result<usize> {
        Ok(self
            .shards
            .iter()
            .map(|shard| rw_read(shard, "memory.len").len())
            .sum())
    }
}
