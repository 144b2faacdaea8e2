//! Refcache - A reference-tagged result cache
//!
//! Serves the demo directory over HTTP with every read cached and every
//! mutation invalidating by tag.

use std::net::SocketAddr;

use anyhow::Context;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use refcache::api::create_router;
use refcache::tasks::GcHandles;
use refcache::{spawn_gc_tasks, spawn_stats_task, AppState, Config};

/// Main entry point for the refcache server.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Build the cache and seed the directory
/// 4. Start background GC and stats tasks
/// 5. Create Axum router with all endpoints
/// 6. Start HTTP server on configured port
/// 7. Handle graceful shutdown on SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "refcache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting refcache server");

    let config = Config::from_env();
    info!(
        "Configuration loaded: default_ttl={}s, port={}, storage={:?}, shards={}, gc_lazy={}ms/{}, gc_strict={}ms/{}",
        config.default_ttl,
        config.server_port,
        config.storage_type,
        config.storage_shards,
        config.gc_lazy_interval,
        config.gc_lazy_chunk,
        config.gc_strict_interval,
        config.gc_chunk
    );

    let state = AppState::from_config(&config)
        .await
        .context("failed to initialize cache storage")?;
    info!("Cache initialized on {} storage", state.cache.default_namespace().storage().kind());

    let gc_handles = spawn_gc_tasks(state.cache.clone(), &config);
    let stats_handle = spawn_stats_task(state.cache.clone(), config.log_interval());
    info!("Background tasks started ({} gc timers)", gc_handles.len());

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(gc_handles, stats_handle))
        .await
        .context("server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
///
/// On shutdown signal, aborts the background tasks and allows graceful shutdown.
async fn shutdown_signal(gc_handles: GcHandles, stats_handle: JoinHandle<()>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    gc_handles.abort_all();
    stats_handle.abort();
    warn!("Background tasks aborted");
}
