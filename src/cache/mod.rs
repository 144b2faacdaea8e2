//! Cache Module
//!
//! Reference-tagged result caching: results are keyed by operation and
//! arguments, tagged with the records they depend on, and invalidated by tag.

mod dedup;
mod engine;
mod entry;
mod gc;
mod hooks;
mod index;
mod key;
mod lock;
mod policy;
mod stats;
pub mod storage;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use dedup::{Dedup, Outcome, Role};
pub use engine::{Cache, CacheBuilder, Namespace, DEFAULT_NAMESPACE, DEFAULT_TTL};
pub use entry::{current_timestamp_ms, CacheEntry};
pub use gc::{GcMode, GcReport};
pub use hooks::{Hooks, OperationHook, ReportHook, StatsHook};
pub use index::ReferenceIndex;
pub use key::{build_key, operation_of, KEY_SEPARATOR};
pub use policy::{InvalidateFn, MutationPolicy, OperationPolicy, Policy, ReferencesFn};
pub use stats::{OperationStats, StatEvent, StatsRecorder, StatsReport};
pub use storage::{MemoryStorage, RedisConfig, RedisStorage, ScanPage, SharedStorage, Storage};
