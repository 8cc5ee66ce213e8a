use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::HeaderMap;
use irrigation_types::{ControllerError, Role};

use crate::state::AppState;

/// Pulls the session token out of either an `Authorization: Bearer ...`
/// header or a `session_token=...` cookie, per §6.1.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(value) = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        if let Some(token) = value.strip_prefix("Bearer ") {
            return Some(token.to_string());
        }
    }

    let cookie_header = headers.get(COOKIE).and_then(|v| v.to_str().ok())?;
    cookie_header.split(';').find_map(|pair| {
        let pair = pair.trim();
        pair.strip_prefix("session_token=").map(|v| v.to_string())
    })
}

/// Requires a valid session carrying at least `min_role`. Used at the route
/// boundary, before a request is even admitted into the priority pipeline,
/// so unauthenticated traffic never occupies a queue slot.
pub fn guard(state: &AppState, headers: &HeaderMap, min_role: Role) -> Result<(), ControllerError> {
    let token = session_token(headers).ok_or(ControllerError::SessionExpired)?;
    state.auth.require_role(&token, min_role)?;
    Ok(())
}
