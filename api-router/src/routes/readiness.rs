use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::api_state::ApiState;

/// Readiness probe. Everything lives in process memory, so being able to
/// take the session lock is the whole check.
pub async fn ready(State(state): State<ApiState>) -> impl IntoResponse {
    let active_sessions = state.sessions.len().await;

    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "checks": { "sessions": "ok" },
            "active_sessions": active_sessions,
        })),
    )
}
