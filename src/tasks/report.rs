//! Statistics Report Task
//!
//! Periodically drains the cache's per-operation counters into `on_stats`.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::cache::Cache;

/// Spawns a background task that reports and resets the cache statistics
/// every `interval`. Empty periods are not reported.
pub fn spawn_stats_task(cache: Arc<Cache>, interval: Duration) -> JoinHandle<()> {
    let interval = interval.max(Duration::from_millis(1));

    tokio::spawn(async move {
        info!(interval_ms = interval.as_millis() as u64, "Starting stats report task");

        let mut ticker = interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            let report = cache.drain_stats();
            if report.is_empty() {
                debug!("Stats report: no cache activity");
                continue;
            }
            (cache.hooks().on_stats)(&report);
        }
    })
}
