//! API Routes
//!
//! Operational endpoints over the shared router: status snapshot, on-demand
//! health pass, replication queue inspection and Prometheus metrics.

mod health;
mod sync;


pub use health::readiness;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use dbrouter_types::RouterStatus;
use serde::Serialize;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        // Status
        .route("/status", get(get_status))
        // Health
        .route("/health/check", post(health::check_health))
        // Replication queue
        .route("/sync/queue", get(sync::get_sync_queue))
        .route("/sync/process", post(sync::process_sync_queue))
        // Prometheus metrics
        .route("/metrics", get(get_metrics))
        // API fallback: return 404 for unknown API endpoints
        .fallback(api_not_found)
}

async fn api_not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(serde_json::json!({"error": "Not found"})))
}

#[derive(Serialize)]
pub(crate) struct StatusResponse {
    version: &'static str,
    #[serde(flatten)]
    router: RouterStatus,
}

pub(crate) async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse { version: env!("CARGO_PKG_VERSION"), router: state.router().status() })
}

pub(crate) async fn get_metrics(State(state): State<AppState>) -> Response {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        state.render_metrics(),
    )
        .into_response()
}
