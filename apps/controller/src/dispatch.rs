use std::collections::HashMap;
use std::sync::Mutex;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use irrigation_priority::manager::AdmissionError;
use irrigation_priority::worker::RequestHandler;
use irrigation_types::error::ControllerError;
use irrigation_types::point::PointId;
use irrigation_types::request::{Request, RequestId};
use serde_json::{json, Value};
use tokio::sync::oneshot;
use tracing::warn;
use uuid::Uuid;

use crate::clock::now_us;
use crate::handlers::{auth as auth_handlers, io as io_handlers};
use crate::state::AppState;

/// What a queued request actually does once a worker dequeues it. Built
/// from the already-extracted HTTP context (path params, body, headers) by
/// the axum handler closure, so the worker never re-parses a URI.
pub enum Action {
    ListPoints,
    GetPoint(PointId),
    SetPoint(PointId, bool),
    Statistics,
    Login { username: String, password: String },
    Logout { token: Option<String> },
    AuthStatus { token: Option<String> },
    AuthValidate { token: Option<String> },
    AuthStats { token: Option<String> },
    EmergencyStop { token: Option<String> },
}

pub struct ActionResponse {
    pub status: StatusCode,
    pub body: Value,
    pub set_cookie: Option<String>,
}

impl ActionResponse {
    pub fn ok(body: Value) -> Self {
        Self {
            status: StatusCode::OK,
            body,
            set_cookie: None,
        }
    }

    pub fn error(err: ControllerError) -> Self {
        Self {
            status: StatusCode::from_u16(err.numeric_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            body: json!({ "status": "error", "error": err.to_string() }),
            set_cookie: None,
        }
    }
}

impl IntoResponse for ActionResponse {
    fn into_response(self) -> Response {
        let mut response = (self.status, Json(self.body)).into_response();
        if let Some(cookie) = self.set_cookie {
            if let Ok(value) = cookie.parse() {
                response.headers_mut().insert(axum::http::header::SET_COOKIE, value);
            }
        }
        response
    }
}

/// Runs `action` against the live managers. Entirely synchronous: every
/// collaborator it touches (`IoManager`, `AuthCore`) is a std-mutex-backed
/// type, never an async one, so this is safe to call directly from a worker
/// thread with no runtime in scope.
pub fn dispatch(state: &AppState, action: Action) -> ActionResponse {
    match action {
        Action::ListPoints => io_handlers::list_points(state),
        Action::GetPoint(id) => io_handlers::get_point(state, &id),
        Action::SetPoint(id, desired) => io_handlers::set_point(state, &id, desired),
        Action::Statistics => io_handlers::statistics(state),
        Action::Login { username, password } => auth_handlers::login(state, &username, &password),
        Action::Logout { token } => auth_handlers::logout(state, token.as_deref()),
        Action::AuthStatus { token } => auth_handlers::status(state, token.as_deref()),
        Action::AuthValidate { token } => auth_handlers::validate(state, token.as_deref()),
        Action::AuthStats { token } => auth_handlers::stats(state, token.as_deref()),
        Action::EmergencyStop { token } => auth_handlers::emergency_stop(state, token.as_deref()),
    }
}

struct PendingJob {
    action: Action,
    responder: oneshot::Sender<ActionResponse>,
}

/// Parked queued-but-not-yet-dispatched jobs, keyed by the priority
/// pipeline's `RequestId`. A worker thread pulls its job out here the
/// moment it dequeues the matching `Request`.
#[derive(Default)]
pub struct JobTable {
    jobs: Mutex<HashMap<RequestId, PendingJob>>,
}

impl JobTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&self, id: RequestId, action: Action, responder: oneshot::Sender<ActionResponse>) {
        self.jobs.lock().unwrap().insert(id, PendingJob { action, responder });
    }

    fn take(&self, id: &RequestId) -> Option<(Action, oneshot::Sender<ActionResponse>)> {
        self.jobs
            .lock()
            .unwrap()
            .remove(id)
            .map(|job| (job.action, job.responder))
    }
}

/// Implements C10's `RequestHandler` by pulling the real work out of the
/// `JobTable` and running it through [`dispatch`].
pub struct ControllerRequestHandler {
    pub state: AppState,
}

impl RequestHandler for ControllerRequestHandler {
    fn handle(&self, request: Request) {
        match self.state.job_table.take(&request.id) {
            Some((action, responder)) => {
                let response = dispatch(&self.state, action);
                let _ = responder.send(response);
            }
            None => warn!(request = %request.id, "worker dequeued a request with no matching job"),
        }
    }
}

/// Classifies `method`/`uri`, admits `action` into the priority pipeline,
/// and awaits the worker's response. Only an `Emergency`-priority request
/// bypasses a full queue and runs synchronously on the calling task; every
/// other priority surfaces `QueueFull` as a 503, so load shedding can
/// actually shed load.
pub async fn submit(state: &AppState, method: &str, uri: &str, action: Action) -> Response {
    let classification = match state.priority.classify_and_admit(method, uri) {
        Ok(c) => c,
        Err(err) => return ActionResponse::error(err).into_response(),
    };

    let id = RequestId::from_bytes(*Uuid::new_v4().as_bytes());
    let timeout_ms = (classification.estimated_ms as u64 * 10).clamp(1_000, 30_000);
    let request = Request::new(id, method, uri, classification.priority, now_us(), timeout_ms);

    let (tx, rx) = oneshot::channel();
    state.job_table.insert(id, action, tx);

    match state.priority.enqueue(request) {
        Ok(()) => match rx.await {
            Ok(response) => response.into_response(),
            Err(_) => ActionResponse::error(ControllerError::Timeout("worker dropped response channel".to_string()))
                .into_response(),
        },
        Err(AdmissionError::Full(_returned)) if classification.is_emergency => {
            let (action, responder) = state
                .job_table
                .take(&id)
                .expect("job was just inserted under this id");
            let _ = responder.send(dispatch(state, action));
            match rx.await {
                Ok(response) => response.into_response(),
                Err(_) => ActionResponse::error(ControllerError::Timeout(
                    "bypassed response channel closed".to_string(),
                ))
                .into_response(),
            }
        }
        Err(AdmissionError::Full(_returned)) => {
            state.job_table.take(&id);
            ActionResponse::error(ControllerError::QueueFull).into_response()
        }
        Err(AdmissionError::Rejected(err)) => {
            state.job_table.take(&id);
            ActionResponse::error(err).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::fixtures::test_state;

    #[test]
    fn dispatch_list_points_reports_the_configured_point() {
        let state = test_state();
        let response = dispatch(&state, Action::ListPoints);
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body["totalCount"], 1);
    }

    #[test]
    fn dispatch_get_point_on_unknown_id_errors() {
        let state = test_state();
        let id = PointId::new("missing").unwrap();
        let response = dispatch(&state, Action::GetPoint(id));
        assert_eq!(response.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn submit_round_trips_through_the_priority_pipeline() {
        let state = test_state();
        let response = submit(&state, "GET", "/api/io/points", Action::ListPoints).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn submit_rejects_ui_reads_when_system_is_in_maintenance_mode() {
        let state = test_state();
        state.priority.enter_maintenance();
        let response = submit(&state, "GET", "/api/io/points", Action::ListPoints).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn submit_sheds_an_ordinary_request_when_its_queue_is_full() {
        use irrigation_priority::manager::PriorityManager;
        use irrigation_priority::queue::QueueSet;
        use std::sync::Arc;

        let mut state = test_state();
        state.priority = Arc::new(PriorityManager::new(QueueSet::new([0; 6]), 80.0));

        let response = submit(&state, "GET", "/api/io/points", Action::ListPoints).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn submit_still_bypasses_a_full_queue_for_emergency_stop() {
        use irrigation_priority::manager::PriorityManager;
        use irrigation_priority::queue::QueueSet;
        use std::sync::Arc;

        let mut state = test_state();
        state.priority = Arc::new(PriorityManager::new(QueueSet::new([0; 6]), 80.0));
        let session = state.auth.login("owner", "owner-pw").unwrap();

        let response = submit(
            &state,
            "POST",
            "/api/emergency-stop",
            Action::EmergencyStop {
                token: Some(session.token),
            },
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
    }
}
