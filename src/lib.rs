//! Refcache - A reference-tagged result cache
//!
//! Caches operation results keyed by operation and arguments, tags them with
//! the records they depend on, and invalidates precisely by tag. Concurrent
//! misses share one computation; background sweeps reclaim expired entries.

pub mod api;
pub mod cache;
pub mod config;
pub mod directory;
pub mod error;
pub mod models;
pub mod tasks;

pub use api::AppState;
pub use cache::Cache;
pub use config::Config;
pub use tasks::{spawn_gc_tasks, spawn_stats_task};
