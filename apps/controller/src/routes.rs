use axum::extract::{Json, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use irrigation_types::Role;
use serde::Deserialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::authctx::{guard, session_token};
use crate::dispatch::{submit, Action, ActionResponse};
use crate::state::AppState;

#[derive(Deserialize)]
struct SetPointBody {
    state: bool,
}

#[derive(Deserialize)]
struct LoginBody {
    username: String,
    password: String,
}

async fn list_points(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Err(err) = guard(&state, &headers, Role::Viewer) {
        return ActionResponse::error(err).into_response();
    }
    submit(&state, "GET", "/api/io/points", Action::ListPoints).await
}

async fn statistics(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Err(err) = guard(&state, &headers, Role::Viewer) {
        return ActionResponse::error(err).into_response();
    }
    submit(&state, "GET", "/api/io/statistics", Action::Statistics).await
}

async fn login(State(state): State<AppState>, Json(body): Json<LoginBody>) -> Response {
    submit(
        &state,
        "POST",
        "/api/auth/login",
        Action::Login {
            username: body.username,
            password: body.password,
        },
    )
    .await
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let token = session_token(&headers);
    submit(&state, "POST", "/api/auth/logout", Action::Logout { token }).await
}

async fn auth_status(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let token = session_token(&headers);
    submit(&state, "GET", "/api/auth/status", Action::AuthStatus { token }).await
}

async fn auth_validate(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let token = session_token(&headers);
    submit(&state, "GET", "/api/auth/validate", Action::AuthValidate { token }).await
}

async fn auth_stats(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let token = session_token(&headers);
    submit(&state, "GET", "/api/auth/stats", Action::AuthStats { token }).await
}

async fn emergency_stop(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let token = session_token(&headers);
    submit(&state, "POST", "/api/emergency-stop", Action::EmergencyStop { token }).await
}

/// Builds the router with one literal route per point known at startup, per
/// the no-wildcard-routing requirement: `/api/io/points/{id}` and
/// `/api/io/points/{id}/set` are registered by value, not matched by a
/// runtime path parameter.
pub fn build_router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/api/io/points", get(list_points))
        .route("/api/io/statistics", get(statistics))
        .route("/api/auth/login", post(login))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/status", get(auth_status))
        .route("/api/auth/validate", get(auth_validate))
        .route("/api/auth/stats", get(auth_stats))
        .route("/api/emergency-stop", post(emergency_stop));

    for id in state.point_ids.iter().cloned() {
        let read_uri = format!("/api/io/points/{id}");
        let set_uri = format!("/api/io/points/{id}/set");

        let read_id = id.clone();
        router = router.route(
            &read_uri,
            get(move |State(state): State<AppState>, headers: HeaderMap| {
                let id = read_id.clone();
                async move {
                    if let Err(err) = guard(&state, &headers, Role::Viewer) {
                        return ActionResponse::error(err).into_response();
                    }
                    let uri = format!("/api/io/points/{id}");
                    submit(&state, "GET", &uri, Action::GetPoint(id)).await
                }
            }),
        );

        let set_id = id.clone();
        router = router.route(
            &set_uri,
            post(
                move |State(state): State<AppState>, headers: HeaderMap, Json(body): Json<SetPointBody>| {
                    let id = set_id.clone();
                    async move {
                        if let Err(err) = guard(&state, &headers, Role::Manager) {
                            return ActionResponse::error(err).into_response();
                        }
                        let uri = format!("/api/io/points/{id}/set");
                        submit(&state, "POST", &uri, Action::SetPoint(id, body.state)).await
                    }
                },
            ),
        );
    }

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    router
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use super::build_router;
    use crate::state::fixtures::test_state;

    #[tokio::test]
    async fn listing_points_without_a_session_is_rejected() {
        let router = build_router(test_state());
        let request = Request::builder()
            .method("GET")
            .uri("/api/io/points")
            .body(Body::empty())
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn login_then_read_the_configured_point() {
        let state = test_state();
        let router = build_router(state.clone());

        let login_request = Request::builder()
            .method("POST")
            .uri("/api/auth/login")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"username":"viewer","password":"viewer-pw"}"#))
            .unwrap();
        let login_response = router.clone().oneshot(login_request).await.unwrap();
        assert_eq!(login_response.status(), StatusCode::OK);
        let cookie = login_response
            .headers()
            .get(axum::http::header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        let token = cookie.strip_prefix("session_token=").unwrap().split(';').next().unwrap();

        let read_request = Request::builder()
            .method("GET")
            .uri("/api/io/points/valve-1")
            .header("authorization", format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap();
        let read_response = router.oneshot(read_request).await.unwrap();
        assert_eq!(read_response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn viewer_cannot_set_a_point() {
        let state = test_state();
        let session = state.auth.login("viewer", "viewer-pw").unwrap();
        let router = build_router(state);

        let request = Request::builder()
            .method("POST")
            .uri("/api/io/points/valve-1/set")
            .header("authorization", format!("Bearer {}", session.token))
            .header("content-type", "application/json")
            .body(Body::from(r#"{"state":true}"#))
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
