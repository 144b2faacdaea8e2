//! Observability hooks.
//!
//! Fire-and-forget callbacks for cache events. The default set logs through
//! `tracing`; callers replace individual hooks with their own.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, error, info};

use crate::cache::gc::GcReport;
use crate::cache::stats::StatsReport;

/// Callback receiving an operation name.
pub type OperationHook = Arc<dyn Fn(&str) + Send + Sync>;
/// Callback receiving a garbage collection report.
pub type ReportHook = Arc<dyn Fn(&GcReport) + Send + Sync>;
/// Callback receiving a periodic statistics report.
pub type StatsHook = Arc<dyn Fn(&StatsReport) + Send + Sync>;

// == Hooks ==
/// The set of cache event callbacks.
#[derive(Clone)]
pub struct Hooks {
    pub on_hit: OperationHook,
    pub on_miss: OperationHook,
    pub on_dedupe: OperationHook,
    pub on_skip: OperationHook,
    pub on_report: ReportHook,
    pub on_stats: StatsHook,
}

impl Hooks {
    /// Hooks that do nothing.
    pub fn silent() -> Self {
        Self {
            on_hit: Arc::new(|_| {}),
            on_miss: Arc::new(|_| {}),
            on_dedupe: Arc::new(|_| {}),
            on_skip: Arc::new(|_| {}),
            on_report: Arc::new(|_| {}),
            on_stats: Arc::new(|_| {}),
        }
    }

    pub fn on_hit(mut self, hook: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_hit = Arc::new(hook);
        self
    }

    pub fn on_miss(mut self, hook: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_miss = Arc::new(hook);
        self
    }

    pub fn on_dedupe(mut self, hook: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_dedupe = Arc::new(hook);
        self
    }

    pub fn on_skip(mut self, hook: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_skip = Arc::new(hook);
        self
    }

    pub fn on_report(mut self, hook: impl Fn(&GcReport) + Send + Sync + 'static) -> Self {
        self.on_report = Arc::new(hook);
        self
    }

    pub fn on_stats(mut self, hook: impl Fn(&StatsReport) + Send + Sync + 'static) -> Self {
        self.on_stats = Arc::new(hook);
        self
    }
}

impl Default for Hooks {
    /// Hooks that log every event.
    fn default() -> Self {
        Self {
            on_hit: Arc::new(|operation| debug!(operation, "hit from cache")),
            on_miss: Arc::new(|operation| debug!(operation, "miss from cache")),
            on_dedupe: Arc::new(|operation| debug!(operation, "deduping")),
            on_skip: Arc::new(|operation| debug!(operation, "skip cache")),
            on_report: Arc::new(|report| {
                if report.error {
                    error!(
                        mode = %report.mode,
                        namespace = %report.namespace,
                        message = report.message.as_deref().unwrap_or(""),
                        "error running gc"
                    );
                } else {
                    info!(
                        mode = %report.mode,
                        namespace = %report.namespace,
                        inspected = report.inspected,
                        removed = report.removed,
                        elapsed_ms = report.elapsed.as_millis() as u64,
                        cursor = report.cursor,
                        "gc report"
                    );
                }
            }),
            on_stats: Arc::new(|report| {
                for (operation, stats) in &report.operations {
                    info!(
                        operation = %operation,
                        hits = stats.hits,
                        misses = stats.misses,
                        dedupes = stats.dedupes,
                        skips = stats.skips,
                        hit_rate = stats.hit_rate(),
                        "cache stats"
                    );
                }
            }),
        }
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks").finish_non_exhaustive()
    }
}
