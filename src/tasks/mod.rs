//! Background Tasks Module
//!
//! Contains background tasks that run periodically during server operation.
//!
//! # Tasks
//! - Lazy GC: sweeps one storage chunk per namespace per tick
//! - Strict GC: reconciles each namespace's index with its storage
//! - Stats report: drains per-operation counters into the stats hook

mod gc;
mod report;

pub use gc::{spawn_gc_tasks, GcHandles};
pub use report::spawn_stats_task;
