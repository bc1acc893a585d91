use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use dbrouter_types::RouterStatus;

use crate::state::AppState;

/// Run one health pass across every provider and return the resulting status.
pub async fn check_health(State(state): State<AppState>) -> Json<RouterStatus> {
    Json(state.router().check_health().await)
}

/// 200 while a healthy master can take writes, 503 otherwise.
pub async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    match state.router().monitor().master() {
        Some(master) if master.is_healthy() => (
            StatusCode::OK,
            Json(serde_json::json!({"status": "ready", "master": master.name()})),
        ),
        Some(master) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({
                "status": "degraded",
                "master": master.name(),
                "masterStatus": master.status(),
            })),
        ),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({"status": "unavailable", "master": null})),
        ),
    }
}
