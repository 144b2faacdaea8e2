//! Configuration Module
//!
//! Handles loading and managing server configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::cache::RedisConfig;

/// Storage backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageType {
    Memory,
    Redis,
}

impl FromStr for StorageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(StorageType::Memory),
            "redis" => Ok(StorageType::Redis),
            other => Err(format!("unknown storage type '{other}'")),
        }
    }
}

/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port
    pub server_port: u16,
    /// Default TTL in seconds for operations without an override
    pub default_ttl: u64,
    /// Storage backend of the default namespace
    pub storage_type: StorageType,
    /// Shards per in-memory storage
    pub storage_shards: usize,
    /// Redis server host
    pub redis_host: String,
    /// Redis server port
    pub redis_port: u16,
    /// Prefix for every key written to Redis
    pub redis_prefix: String,
    /// Statistics report interval in seconds
    pub log_interval: u64,
    /// Keys per strict GC chunk
    pub gc_chunk: usize,
    /// Keys per lazy GC scan
    pub gc_lazy_chunk: usize,
    /// Lazy GC interval in milliseconds
    pub gc_lazy_interval: u64,
    /// Strict GC interval in milliseconds
    pub gc_strict_interval: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `CACHE_DEFAULT_TTL` - Default TTL in seconds (default: 86400)
    /// - `CACHE_STORAGE_TYPE` - Storage backend, `memory` or `redis` (default: memory)
    /// - `CACHE_STORAGE_SHARDS` - In-memory shards (default: 64)
    /// - `REDIS_HOST` - Redis host (default: 127.0.0.1)
    /// - `REDIS_PORT` - Redis port (default: 6379)
    /// - `REDIS_PREFIX` - Redis key prefix (default: refcache:)
    /// - `CACHE_LOG_INTERVAL` - Stats report frequency in seconds (default: 30)
    /// - `CACHE_GC_CHUNK` - Strict GC chunk size (default: 32)
    /// - `CACHE_GC_LAZY_CHUNK` - Lazy GC chunk size (default: 64)
    /// - `CACHE_GC_LAZY_INTERVAL` - Lazy GC frequency in ms (default: 60000)
    /// - `CACHE_GC_STRICT_INTERVAL` - Strict GC frequency in ms (default: 300000)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let storage_type = match env::var("CACHE_STORAGE_TYPE") {
            Ok(value) => value.parse().unwrap_or_else(|err| {
                warn!("{err}, falling back to memory");
                StorageType::Memory
            }),
            Err(_) => defaults.storage_type,
        };
        let redis_host = env::var("REDIS_HOST").unwrap_or(defaults.redis_host);
        let redis_prefix = env::var("REDIS_PREFIX").unwrap_or(defaults.redis_prefix);

        Self {
            server_port: env_or("SERVER_PORT", defaults.server_port),
            default_ttl: env_or("CACHE_DEFAULT_TTL", defaults.default_ttl),
            storage_type,
            storage_shards: env_or("CACHE_STORAGE_SHARDS", defaults.storage_shards).max(1),
            redis_host,
            redis_port: env_or("REDIS_PORT", defaults.redis_port),
            redis_prefix,
            log_interval: env_or("CACHE_LOG_INTERVAL", defaults.log_interval),
            gc_chunk: env_or("CACHE_GC_CHUNK", defaults.gc_chunk).max(1),
            gc_lazy_chunk: env_or("CACHE_GC_LAZY_CHUNK", defaults.gc_lazy_chunk).max(1),
            gc_lazy_interval: env_or("CACHE_GC_LAZY_INTERVAL", defaults.gc_lazy_interval),
            gc_strict_interval: env_or("CACHE_GC_STRICT_INTERVAL", defaults.gc_strict_interval),
        }
    }

    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl)
    }

    pub fn log_interval(&self) -> Duration {
        Duration::from_secs(self.log_interval)
    }

    pub fn gc_lazy_interval(&self) -> Duration {
        Duration::from_millis(self.gc_lazy_interval)
    }

    pub fn gc_strict_interval(&self) -> Duration {
        Duration::from_millis(self.gc_strict_interval)
    }

    /// Connection settings for the Redis backend.
    pub fn redis(&self) -> RedisConfig {
        RedisConfig::new(&self.redis_host, self.redis_port).with_prefix(self.redis_prefix.clone())
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 3000,
            default_ttl: 86_400,
            storage_type: StorageType::Memory,
            storage_shards: 64,
            redis_host: "127.0.0.1".to_string(),
            redis_port: 6379,
            redis_prefix: "refcache:".to_string(),
            log_interval: 30,
            gc_chunk: 32,
            gc_lazy_chunk: 64,
            gc_lazy_interval: 60_000,
            gc_strict_interval: 300_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.server_port, 3000);
        assert_eq!(config.default_ttl(), Duration::from_secs(86_400));
        assert_eq!(config.storage_type, StorageType::Memory);
        assert_eq!(config.gc_chunk, 32);
        assert_eq!(config.gc_lazy_chunk, 64);
        assert_eq!(config.gc_lazy_interval(), Duration::from_secs(60));
        assert_eq!(config.gc_strict_interval(), Duration::from_secs(300));
        assert_eq!(config.log_interval(), Duration::from_secs(30));
        assert_eq!(config.redis().url, "redis://127.0.0.1:6379/");
        assert_eq!(config.redis().prefix, "refcache:");
    }

    #[test]
    fn test_config_from_env() {
        // One test touches the environment so parallel tests cannot race on it
        env::remove_var("SERVER_PORT");
        env::remove_var("CACHE_DEFAULT_TTL");
        env::remove_var("CACHE_STORAGE_TYPE");
        env::remove_var("CACHE_LOG_INTERVAL");
        env::remove_var("CACHE_GC_LAZY_INTERVAL");
        env::remove_var("CACHE_GC_STRICT_INTERVAL");
        env::remove_var("CACHE_STORAGE_SHARDS");
        env::remove_var("REDIS_HOST");
        env::remove_var("REDIS_PREFIX");
        env::set_var("REDIS_PORT", "6380");
        env::set_var("CACHE_GC_CHUNK", "0");
        env::set_var("CACHE_GC_LAZY_CHUNK", "not-a-number");

        let config = Config::from_env();
        assert_eq!(config.server_port, 3000);
        assert_eq!(config.default_ttl, 86_400);
        assert_eq!(config.gc_chunk, 1);
        assert_eq!(config.gc_lazy_chunk, 64);
        assert_eq!(config.redis().url, "redis://127.0.0.1:6380/");

        env::set_var("CACHE_STORAGE_TYPE", "redis");
        assert_eq!(Config::from_env().storage_type, StorageType::Redis);
        env::set_var("CACHE_STORAGE_TYPE", "memcached");
        assert_eq!(Config::from_env().storage_type, StorageType::Memory);

        env::remove_var("REDIS_PORT");
        env::remove_var("CACHE_GC_CHUNK");
        env::remove_var("CACHE_GC_LAZY_CHUNK");
        env::remove_var("CACHE_STORAGE_TYPE");
    }

    #[test]
    fn test_storage_type_parse() {
        assert_eq!("Memory".parse::<StorageType>(), Ok(StorageType::Memory));
        assert_eq!(" REDIS ".parse::<StorageType>(), Ok(StorageType::Redis));
        assert!("memcached".parse::<StorageType>().is_err());
    }
}
