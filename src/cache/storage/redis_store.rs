//! Redis storage backend.
//!
//! Entries are stored as JSON under `prefix + key` with a native expiry
//! matching the entry's own, so Redis may evict an entry before the index
//! hears about it; the strict sweep reconciles that. The scan cursor is the
//! Redis SCAN cursor, which returns 0 once a full pass has completed.

use std::fmt;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{Client, RedisError};
use tracing::{info, warn};

use super::{ScanPage, Storage};
use crate::cache::{current_timestamp_ms, CacheEntry};
use crate::error::{CacheError, Result};

/// Key prefix used when none is configured.
pub const DEFAULT_PREFIX: &str = "refcache:";

const LEN_SCAN_COUNT: usize = 1_000;

// == Redis Config ==
/// Connection settings for [`RedisStorage`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisConfig {
    /// Connection URL, e.g. `redis://127.0.0.1:6379/`
    pub url: String,
    /// Prefix for every stored key
    pub prefix: String,
}

impl RedisConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            url: format!("redis://{host}:{port}/"),
            prefix: DEFAULT_PREFIX.to_string(),
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }
}

// == Redis Storage ==
/// Storage backed by a Redis server over a multiplexed connection.
pub struct RedisStorage {
    conn: MultiplexedConnection,
    prefix: String,
}

impl fmt::Debug for RedisStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisStorage")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

impl RedisStorage {
    /// Opens a connection to the server named by `config`.
    pub async fn connect(config: &RedisConfig) -> Result<Self> {
        let client = Client::open(config.url.as_str()).map_err(|err| unavailable("open", err))?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|err| unavailable("connect", err))?;

        info!(url = %config.url, prefix = %config.prefix, "Connected to redis");
        Ok(Self {
            conn,
            prefix: config.prefix.clone(),
        })
    }

    fn prefixed(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    fn pattern(&self) -> String {
        format!("{}*", self.prefix)
    }
}

fn unavailable(op: &str, err: RedisError) -> CacheError {
    CacheError::StorageUnavailable(format!("redis {op}: {err}"))
}

/// Milliseconds until `entry` expires; Redis rejects a zero expiry.
fn expiry_ms(entry: &CacheEntry, now_ms: u64) -> u64 {
    entry.expires_at.saturating_sub(now_ms).max(1)
}

fn strip_prefixes(prefix: &str, keys: Vec<String>) -> Vec<String> {
    keys.into_iter()
        .filter_map(|key| key.strip_prefix(prefix).map(str::to_string))
        .collect()
}

#[async_trait]
impl Storage for RedisStorage {
    fn kind(&self) -> &'static str {
        "redis"
    }

    async fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = redis::cmd("GET")
            .arg(self.prefixed(key))
            .query_async(&mut conn)
            .await
            .map_err(|err| unavailable("GET", err))?;

        let Some(raw) = raw else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(entry) => Ok(Some(entry)),
            Err(err) => {
                // Left for the native expiry to reclaim
                warn!(key, error = %err, "Unreadable redis entry, treating as absent");
                Ok(None)
            }
        }
    }

    async fn set(&self, entry: CacheEntry) -> Result<()> {
        let mut conn = self.conn.clone();
        let expiry = expiry_ms(&entry, current_timestamp_ms());
        let raw = serde_json::to_string(&entry)
            .map_err(|err| CacheError::InvalidArguments(err.to_string()))?;

        let _: () = redis::cmd("SET")
            .arg(self.prefixed(&entry.key))
            .arg(raw)
            .arg("PX")
            .arg(expiry)
            .query_async(&mut conn)
            .await
            .map_err(|err| unavailable("SET", err))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: i64 = redis::cmd("DEL")
            .arg(self.prefixed(key))
            .query_async(&mut conn)
            .await
            .map_err(|err| unavailable("DEL", err))?;
        Ok(())
    }

    async fn scan(&self, cursor: u64, chunk_size: usize) -> Result<ScanPage> {
        let mut conn = self.conn.clone();
        let (next_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(self.pattern())
            .arg("COUNT")
            .arg(chunk_size.max(1))
            .query_async(&mut conn)
            .await
            .map_err(|err| unavailable("SCAN", err))?;

        Ok(ScanPage {
            keys: strip_prefixes(&self.prefix, keys),
            next_cursor,
        })
    }

    async fn len(&self) -> Result<usize> {
        let mut count = 0;
        let mut cursor = 0;
        loop {
            let page = self.scan(cursor, LEN_SCAN_COUNT).await?;
            count += page.keys.len();
            cursor = page.next_cursor;
            if cursor == 0 {
                return Ok(count);
            }
        }
    }
}
