//! Session operations API: listing, stats, kill, cron deliveries.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};

use crate::state::AppState;

pub async fn list(State(state): State<AppState>) -> Json<serde_json::Value> {
    let mut keys = state.sessions.get_active_session_keys();
    keys.sort();
    Json(serde_json::json!({
        "count": keys.len(),
        "session_keys": keys,
    }))
}

pub async fn stats(State(state): State<AppState>) -> Response {
    Json(state.sessions.global_stats()).into_response()
}

pub async fn kill(State(state): State<AppState>, Path(key): Path<String>) -> Response {
    match state.sessions.kill_session(&key) {
        Some(result) => Json(serde_json::json!({
            "killed": true,
            "session_key": key,
            "lost_steering": result,
        }))
        .into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": format!("no session {key}")})),
        )
            .into_response(),
    }
}

pub async fn cron_deliveries(State(state): State<AppState>) -> Response {
    Json(state.cron_deliveries.list()).into_response()
}
