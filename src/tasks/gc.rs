//! Garbage Collection Tasks
//!
//! Background timers driving the lazy and strict sweeps of every namespace.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::info;

use crate::cache::{Cache, GcMode, Hooks, Namespace};
use crate::config::Config;

/// Handles of the spawned GC timers.
#[derive(Debug, Default)]
pub struct GcHandles {
    handles: Vec<JoinHandle<()>>,
}

impl GcHandles {
    /// Number of running timers.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Stops every timer.
    pub fn abort_all(&self) {
        for handle in &self.handles {
            handle.abort();
        }
    }

    /// True once every timer has stopped.
    pub fn is_finished(&self) -> bool {
        self.handles.iter().all(JoinHandle::is_finished)
    }
}

/// Spawns a lazy and a strict timer for each namespace of `cache`.
///
/// Every tick hands its report to the cache's `on_report` hook. Ticks that
/// fall behind are skipped rather than bunched up.
///
/// # Example
/// ```ignore
/// let handles = spawn_gc_tasks(cache.clone(), &config);
/// // Later, during shutdown:
/// handles.abort_all();
/// ```
pub fn spawn_gc_tasks(cache: Arc<Cache>, config: &Config) -> GcHandles {
    let mut handles = Vec::new();

    for namespace in cache.namespaces() {
        handles.push(spawn_sweep(
            Arc::clone(namespace),
            cache.hooks().clone(),
            GcMode::Lazy,
            config.gc_lazy_interval(),
            config.gc_lazy_chunk,
        ));
        handles.push(spawn_sweep(
            Arc::clone(namespace),
            cache.hooks().clone(),
            GcMode::Strict,
            config.gc_strict_interval(),
            config.gc_chunk,
        ));
    }

    GcHandles { handles }
}

fn spawn_sweep(
    namespace: Arc<Namespace>,
    hooks: Hooks,
    mode: GcMode,
    period: Duration,
    chunk_size: usize,
) -> JoinHandle<()> {
    let period = period.max(Duration::from_millis(1));

    tokio::spawn(async move {
        info!(
            namespace = %namespace.name(),
            %mode,
            period_ms = period.as_millis() as u64,
            chunk_size,
            "Starting gc task"
        );

        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            let report = match mode {
                GcMode::Lazy => namespace.gc_lazy(chunk_size).await,
                GcMode::Strict => namespace.gc_strict(chunk_size).await,
            };
            (hooks.on_report)(&report);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{GcReport, OperationPolicy, Policy, Storage};
    use serde_json::json;
    use std::sync::Mutex;

    fn fast_config() -> Config {
        Config {
            gc_lazy_interval: 20,
            gc_strict_interval: 30,
            ..Config::default()
        }
    }

    fn recording_cache(reports: Arc<Mutex<Vec<GcReport>>>) -> Arc<Cache> {
        let policy = Policy::new().query(
            "user",
            OperationPolicy::new(|args, _| Some(vec![format!("user:{}", args["id"])]))
                .with_ttl(Duration::ZERO),
        );
        let hooks = Hooks::silent().on_report(move |report| {
            reports.lock().unwrap().push(report.clone());
        });
        Arc::new(Cache::builder().policy(policy).hooks(hooks).build())
    }

    #[tokio::test]
    async fn test_gc_tasks_remove_expired_entries() {
        let reports = Arc::new(Mutex::new(Vec::new()));
        let cache = recording_cache(reports.clone());
        cache
            .resolve("user", &json!({"id": 1}), || async { Ok(json!({"id": 1})) })
            .await
            .unwrap();

        let handles = spawn_gc_tasks(cache.clone(), &fast_config());
        assert_eq!(handles.len(), 2);

        tokio::time::sleep(Duration::from_millis(150)).await;
        handles.abort_all();

        let namespace = cache.default_namespace();
        assert_eq!(namespace.storage().len().await.unwrap(), 0);
        assert!(namespace.index().is_empty());

        let reports = reports.lock().unwrap();
        assert!(reports.iter().any(|r| r.mode == GcMode::Lazy));
        assert!(reports.iter().any(|r| r.mode == GcMode::Strict));
        assert!(reports.iter().all(|r| !r.error));
    }

    #[tokio::test]
    async fn test_gc_tasks_can_be_aborted() {
        let cache = recording_cache(Arc::new(Mutex::new(Vec::new())));

        let handles = spawn_gc_tasks(cache, &Config::default());
        handles.abort_all();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(handles.is_finished(), "Tasks should be finished after abort");
    }
}
