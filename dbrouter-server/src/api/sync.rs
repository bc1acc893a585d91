use axum::{extract::State, http::StatusCode, response::Json};
use dbrouter_types::{SyncQueueEntry, SyncQueueStats};
use serde_json::{json, Value};

use crate::state::AppState;

pub async fn get_sync_queue(State(state): State<AppState>) -> Json<Vec<SyncQueueEntry>> {
    Json(state.router().replication().entries())
}

/// Drain the retry queue once now instead of waiting for the next tick.
pub async fn process_sync_queue(
    State(state): State<AppState>,
) -> Result<Json<SyncQueueStats>, (StatusCode, Json<Value>)> {
    state
        .router()
        .process_sync_queue()
        .await
        .map_err(|err| (StatusCode::SERVICE_UNAVAILABLE, Json(json!({"error": err.to_string()}))))?;
    Ok(Json(state.router().replication().stats()))
}
