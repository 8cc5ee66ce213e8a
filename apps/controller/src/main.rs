use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};

use irrigation_controller::bootstrap::{bootstrap, Bootstrapped};
use irrigation_controller::cli::ControllerArgs;
use irrigation_controller::routes::build_router;
use irrigation_controller::state::AppState;

/// Logs a one-line I/O statistics summary once a minute, for operators
/// tailing the process log rather than polling `/api/io/statistics`.
async fn statistics_heartbeat(state: AppState, stop: Arc<AtomicBool>) {
    let mut tick = tokio::time::interval(Duration::from_secs(60));
    loop {
        tick.tick().await;
        if stop.load(Ordering::Relaxed) {
            return;
        }
        let stats = state.io.statistics();
        info!(
            update_cycles = stats.update_cycles,
            total_errors = stats.total_errors,
            active_points = stats.active_point_count,
            "io statistics heartbeat"
        );
    }
}

/// Sweeps expired queue entries and sessions every 5 seconds, bounding
/// expiry latency tighter than the reactive lazy-eviction paths on the
/// hot read/write routes.
async fn expiry_sweeper(state: AppState, stop: Arc<AtomicBool>) {
    let mut tick = tokio::time::interval(Duration::from_secs(5));
    loop {
        tick.tick().await;
        if stop.load(Ordering::Relaxed) {
            return;
        }
        let expired_requests = state.priority.queues().cleanup_expired();
        let expired_sessions = state.auth.cleanup_expired();
        if expired_requests > 0 || expired_sessions > 0 {
            info!(expired_requests, expired_sessions, "expiry sweep");
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let args = ControllerArgs::parse();

    let Bootstrapped {
        state,
        allocator: _allocator,
        io_poll_handle,
        worker_pool,
    } = bootstrap(&args).context("bootstrapping controller")?;

    let router = build_router(state.clone());

    let listener = TcpListener::bind(&args.bind_addr)
        .await
        .with_context(|| format!("binding http listener on {}", args.bind_addr))?;
    info!(addr = %args.bind_addr, "http listener bound");

    let heartbeat_stop = Arc::new(AtomicBool::new(false));
    let heartbeat_handle = tokio::spawn(statistics_heartbeat(state.clone(), heartbeat_stop.clone()));

    let sweeper_stop = Arc::new(AtomicBool::new(false));
    let sweeper_handle = tokio::spawn(expiry_sweeper(state.clone(), sweeper_stop.clone()));

    let shutdown = async {
        if tokio::signal::ctrl_c().await.is_err() {
            warn!("failed to install ctrl-c handler, shutdown signal unavailable");
        }
        info!("shutdown requested, draining in-flight requests");
    };

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .context("http server error")?;

    heartbeat_stop.store(true, Ordering::Relaxed);
    heartbeat_handle.abort();
    sweeper_stop.store(true, Ordering::Relaxed);
    sweeper_handle.abort();

    state.io.stop_polling();
    if io_poll_handle.join().is_err() {
        warn!("io polling thread panicked during shutdown");
    }
    worker_pool.stop();

    info!("controller shutdown complete");
    Ok(())
}
