use std::sync::Arc;

use irrigation_auth::AuthCore;
use irrigation_io::manager::IoManager;
use irrigation_priority::manager::PriorityManager;
use irrigation_types::PointId;

use crate::dispatch::JobTable;

/// Shared application state handed to every axum handler. Cheap to clone —
/// every field is already behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub io: Arc<IoManager>,
    pub priority: Arc<PriorityManager>,
    pub auth: Arc<AuthCore>,
    pub job_table: Arc<JobTable>,
    /// Point ids known at router-build time, used to enumerate literal
    /// routes. Independent of `io`'s live configuration so route
    /// registration stays a pure function of the config the process booted
    /// with.
    pub point_ids: Arc<Vec<PointId>>,
}
