use irrigation_types::{ControllerError, Role};
use serde_json::json;

use crate::dispatch::ActionResponse;
use crate::state::AppState;

const EMERGENCY_TTL_US: u64 = 5 * 60 * 1_000_000;

fn require_token(token: Option<&str>) -> Result<&str, ControllerError> {
    token.ok_or(ControllerError::SessionExpired)
}

pub fn login(state: &AppState, username: &str, password: &str) -> ActionResponse {
    match state.auth.login(username, password) {
        Ok(session) => {
            let expires_at = session.last_activity_us + 30 * 60 * 1_000_000;
            let mut response = ActionResponse::ok(json!({
                "success": true,
                "role": session.role,
                "expires_at": expires_at,
                "timestamp": chrono::Utc::now().to_rfc3339(),
            }));
            response.set_cookie = Some(format!(
                "session_token={}; HttpOnly; Max-Age=1800; Path=/",
                session.token
            ));
            response
        }
        Err(err) => ActionResponse::error(err),
    }
}

pub fn logout(state: &AppState, token: Option<&str>) -> ActionResponse {
    if let Some(token) = token {
        state.auth.logout(token);
    }
    let mut response = ActionResponse::ok(json!({ "success": true }));
    response.set_cookie = Some("session_token=; HttpOnly; Max-Age=0; Path=/".to_string());
    response
}

pub fn status(state: &AppState, token: Option<&str>) -> ActionResponse {
    let Some(token) = token else {
        return ActionResponse::ok(json!({ "authenticated": false }));
    };
    match state.auth.validate(token) {
        Ok(session) => ActionResponse::ok(json!({
            "authenticated": true,
            "username": session.username,
            "role": session.role,
            "created_time": session.created_us,
            "last_activity": session.last_activity_us,
            "request_count": session.request_count,
            "expires_at": session.last_activity_us + 30 * 60 * 1_000_000,
        })),
        Err(_) => ActionResponse::ok(json!({ "authenticated": false })),
    }
}

pub fn validate(state: &AppState, token: Option<&str>) -> ActionResponse {
    let Some(token) = token else {
        return ActionResponse::ok(json!({ "valid": false }));
    };
    match state.auth.validate(token) {
        Ok(session) => ActionResponse::ok(json!({ "valid": true, "role": session.role })),
        Err(_) => ActionResponse::ok(json!({ "valid": false })),
    }
}

pub fn stats(state: &AppState, token: Option<&str>) -> ActionResponse {
    let token = match require_token(token) {
        Ok(token) => token,
        Err(err) => return ActionResponse::error(err),
    };
    if let Err(err) = state.auth.require_role(token, Role::Manager) {
        return ActionResponse::error(err);
    }
    let stats = state.auth.stats();
    ActionResponse::ok(json!({
        "total_logins": stats.total_logins,
        "total_failed_logins": stats.total_failed_logins,
        "total_rate_limited": stats.total_rate_limited,
        "total_logouts": stats.total_logouts,
        "active_sessions": state.auth.active_session_count(),
    }))
}

pub fn emergency_stop(state: &AppState, token: Option<&str>) -> ActionResponse {
    let token = match require_token(token) {
        Ok(token) => token,
        Err(err) => return ActionResponse::error(err),
    };
    if let Err(err) = state.auth.require_role(token, Role::Manager) {
        return ActionResponse::error(err);
    }
    state.priority.enter_emergency(EMERGENCY_TTL_US);
    ActionResponse::ok(json!({ "status": "success", "mode": "emergency" }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::fixtures::test_state;
    use irrigation_priority::manager::SystemMode;

    #[test]
    fn login_with_wrong_password_is_rejected() {
        let state = test_state();
        let response = login(&state, "owner", "not-the-password");
        assert_eq!(response.status, axum::http::StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn login_sets_a_session_cookie_on_success() {
        let state = test_state();
        let response = login(&state, "owner", "owner-pw");
        assert_eq!(response.status, axum::http::StatusCode::OK);
        assert!(response.set_cookie.unwrap().starts_with("session_token="));
    }

    #[test]
    fn viewer_cannot_trigger_emergency_stop() {
        let state = test_state();
        let session = state.auth.login("viewer", "viewer-pw").unwrap();
        let response = emergency_stop(&state, Some(&session.token));
        assert_eq!(response.status, axum::http::StatusCode::FORBIDDEN);
        assert_eq!(state.priority.mode(), SystemMode::Normal);
    }

    #[test]
    fn owner_can_trigger_emergency_stop() {
        let state = test_state();
        let session = state.auth.login("owner", "owner-pw").unwrap();
        let response = emergency_stop(&state, Some(&session.token));
        assert_eq!(response.status, axum::http::StatusCode::OK);
        assert_eq!(state.priority.mode(), SystemMode::Emergency);
    }
}
