use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use irrigation_hal::memory::AllocPriority;
use irrigation_hal::TieredAllocator;
use irrigation_types::priority::Priority;
use irrigation_types::request::Request;
use tracing::{debug, info, trace, warn};

use crate::clock::now_us;
use crate::manager::PriorityManager;

const HEAVY_OPERATION_THRESHOLD_MS: u64 = 500;
const WATCHDOG_FEED_INTERVAL_MS: u64 = 1000;
const HEALTH_CHECK_INTERVAL_MS: u64 = 30_000;
const STATS_SNAPSHOT_INTERVAL_MS: u64 = 5_000;
const DEQUEUE_WAIT_MS: u64 = 100;
const EMPTY_BACKOFF_MS: u64 = 10;

/// One of the three worker roles, each servicing a contiguous priority band.
#[derive(Debug, Clone, Copy)]
pub struct Band {
    pub name: &'static str,
    pub lo: Priority,
    pub hi: Priority,
    pub placement: AllocPriority,
}

pub const CRITICAL_BAND: Band = Band {
    name: "critical-worker",
    lo: Priority::IoCritical,
    hi: Priority::Emergency,
    placement: AllocPriority::Critical,
};

pub const NORMAL_BAND: Band = Band {
    name: "normal-worker",
    lo: Priority::Authentication,
    hi: Priority::UiCritical,
    placement: AllocPriority::LargeBuffer,
};

pub const BACKGROUND_BAND: Band = Band {
    name: "background-worker",
    lo: Priority::Background,
    hi: Priority::Normal,
    placement: AllocPriority::LargeBuffer,
};

/// Dispatches a dequeued request to its handler. Implemented by the binary
/// crate, which owns the actual HTTP handler table.
pub trait RequestHandler: Send + Sync {
    fn handle(&self, request: Request);
}

/// C10: three workers, each a dedicated OS thread, cooperatively servicing
/// one priority band. Manages health/stats/watchdog/emergency-timeout
/// housekeeping on the cadence specified in §4.10.
pub struct WorkerPool {
    stop: Arc<AtomicBool>,
    handles: Vec<std::thread::JoinHandle<()>>,
}

impl WorkerPool {
    pub fn start(
        manager: Arc<PriorityManager>,
        allocator: &TieredAllocator,
        handler: Arc<dyn RequestHandler>,
        bands: [(Band, Option<core_affinity::CoreId>); 3],
    ) -> Result<Self, irrigation_hal::memory::MemoryError> {
        let stop = Arc::new(AtomicBool::new(false));
        let mut handles = Vec::with_capacity(3);

        for (band, core) in bands {
            let manager = manager.clone();
            let handler = handler.clone();
            let stop = stop.clone();
            let handle = allocator.create_worker(band.name, 64 * 1024, band.placement, core, move || {
                run_worker_loop(band, manager, handler, stop);
            })?;
            handles.push(handle);
        }

        Ok(Self { stop, handles })
    }

    pub fn stop(self) {
        self.stop.store(true, Ordering::Relaxed);
        for handle in self.handles {
            let _ = handle.join();
        }
    }
}

fn run_worker_loop(
    band: Band,
    manager: Arc<PriorityManager>,
    handler: Arc<dyn RequestHandler>,
    stop: Arc<AtomicBool>,
) {
    info!(worker = band.name, "worker started");
    let mut last_health_check = Instant::now();
    let mut last_stats_snapshot = Instant::now();
    let mut last_watchdog_feed = Instant::now();

    while !stop.load(Ordering::Relaxed) {
        if last_health_check.elapsed() >= Duration::from_millis(HEALTH_CHECK_INTERVAL_MS) {
            debug!(worker = band.name, depth = manager.queues().total_depth(), "queue health check");
            last_health_check = Instant::now();
        }

        if last_stats_snapshot.elapsed() >= Duration::from_millis(STATS_SNAPSHOT_INTERVAL_MS) {
            let stats = manager.statistics();
            trace!(worker = band.name, dropped = stats.dropped_count, "stats snapshot");
            last_stats_snapshot = Instant::now();
        }

        if manager.mode() == crate::manager::SystemMode::Emergency {
            manager.check_emergency_timeout();
        }

        match manager.queues().dequeue_band(band.lo, band.hi, DEQUEUE_WAIT_MS) {
            Some(mut request) => {
                let started = now_us();
                request.processing_start_us = Some(started);
                let priority = request.priority;
                let clock_start = Instant::now();

                handler.handle(request);

                let elapsed_ms = clock_start.elapsed().as_millis() as u64;
                manager.record_processing_time(priority, elapsed_ms as f64);

                if elapsed_ms > HEAVY_OPERATION_THRESHOLD_MS {
                    warn!(worker = band.name, elapsed_ms, "heavy operation, yielding");
                    std::thread::yield_now();
                }
            }
            None => {
                std::thread::sleep(Duration::from_millis(EMPTY_BACKOFF_MS));
            }
        }

        if last_watchdog_feed.elapsed() >= Duration::from_millis(WATCHDOG_FEED_INTERVAL_MS) {
            trace!(worker = band.name, "watchdog fed");
            last_watchdog_feed = Instant::now();
        }
    }
    info!(worker = band.name, "worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bands_partition_priorities_without_gaps() {
        assert_eq!(CRITICAL_BAND.lo, Priority::IoCritical);
        assert_eq!(CRITICAL_BAND.hi, Priority::Emergency);
        assert_eq!(NORMAL_BAND.lo, Priority::Authentication);
        assert_eq!(NORMAL_BAND.hi, Priority::UiCritical);
        assert_eq!(BACKGROUND_BAND.lo, Priority::Background);
        assert_eq!(BACKGROUND_BAND.hi, Priority::Normal);
    }
}
