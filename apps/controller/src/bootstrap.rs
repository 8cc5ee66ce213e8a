use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use irrigation_auth::{AuthCore, AuthSettings, UserRecord, UserTable};
use irrigation_hal::backend::SimulatedBackend;
use irrigation_hal::{HardwareBackend, TieredAllocator};
use irrigation_io::config_store::{ConfigStore, FileConfigSource};
use irrigation_io::manager::IoManager;
use irrigation_priority::manager::PriorityManager;
use irrigation_priority::queue::QueueSet;
use irrigation_priority::worker::{WorkerPool, BACKGROUND_BAND, CRITICAL_BAND, NORMAL_BAND};
use irrigation_types::Role;
use tracing::info;

use crate::cli::ControllerArgs;
use crate::dispatch::{ControllerRequestHandler, JobTable};
use crate::state::AppState;

const LOAD_SHEDDING_THRESHOLD_PCT: f64 = 80.0;
const IO_POLL_INTERVAL: Duration = Duration::from_millis(250);
const FAST_TIER_BYTES: u64 = 2 * 1024 * 1024;
const LARGE_TIER_BYTES: u64 = 16 * 1024 * 1024;

/// Everything `main` needs to keep alive for the life of the process.
pub struct Bootstrapped {
    pub state: AppState,
    pub allocator: Arc<TieredAllocator>,
    pub io_poll_handle: std::thread::JoinHandle<()>,
    pub worker_pool: WorkerPool,
}

fn user_table(args: &ControllerArgs) -> UserTable {
    UserTable::new(vec![
        UserRecord::new(args.owner_username.as_str(), args.owner_password.as_str(), Role::Owner),
        UserRecord::new(args.viewer_username.as_str(), args.viewer_password.as_str(), Role::Viewer),
    ])
}

/// `(core_a, core_b)` per the scheduling model: core A carries the I/O
/// poller and the critical worker, core B carries the normal and
/// background workers. Falls back to `None` (no pinning) on hosts that
/// don't expose enough cores, or any at all.
fn worker_cores() -> (Option<core_affinity::CoreId>, Option<core_affinity::CoreId>) {
    let ids = core_affinity::get_core_ids().unwrap_or_default();
    let core_a = ids.first().copied();
    let core_b = ids.get(1).copied().or(core_a);
    (core_a, core_b)
}

/// Runs the full startup sequence: load and validate configuration, bring
/// every driver up in safe state, start the I/O poller, then the worker
/// pool. Only after this returns is the process ready to accept writes.
pub fn bootstrap(args: &ControllerArgs) -> anyhow::Result<Bootstrapped> {
    let config_store = ConfigStore::load(Box::new(FileConfigSource::new(args.config_path.as_str())))
        .with_context(|| format!("loading io configuration from {}", args.config_path))?;
    let config = config_store.get();
    let point_ids: Vec<_> = config.points.keys().cloned().collect();
    info!(points = point_ids.len(), "configuration loaded, drivers entering safe state");

    let backend: Arc<dyn HardwareBackend> = Arc::new(SimulatedBackend::new());
    let io = Arc::new(IoManager::new(backend, config, IO_POLL_INTERVAL));

    let allocator = Arc::new(TieredAllocator::new(FAST_TIER_BYTES, LARGE_TIER_BYTES));
    let (core_a, core_b) = worker_cores();
    info!(cpu_cores_logical = num_cpus::get(), pinned = core_a.is_some(), "worker core layout decided");

    let io_poll_handle = io
        .start_polling(&allocator, core_a)
        .context("starting io polling thread")?;

    let priority = Arc::new(PriorityManager::new(
        QueueSet::with_default_capacities(),
        LOAD_SHEDDING_THRESHOLD_PCT,
    ));

    let auth_settings = AuthSettings {
        max_concurrent_sessions: args.max_concurrent_sessions,
        ..AuthSettings::default()
    };
    let auth = Arc::new(AuthCore::new(user_table(args), auth_settings));

    let job_table = Arc::new(JobTable::new());

    let state = AppState {
        io,
        priority: priority.clone(),
        auth,
        job_table,
        point_ids: Arc::new(point_ids),
    };

    let handler = Arc::new(ControllerRequestHandler { state: state.clone() });
    let bands = [
        (CRITICAL_BAND, core_a),
        (NORMAL_BAND, core_b),
        (BACKGROUND_BAND, core_b),
    ];
    let worker_pool =
        WorkerPool::start(priority, &allocator, handler, bands).context("starting worker pool")?;

    info!("controller bootstrap complete, accepting writes");
    Ok(Bootstrapped {
        state,
        allocator,
        io_poll_handle,
        worker_pool,
    })
}
