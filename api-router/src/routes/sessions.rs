use axum::{
    extract::{Path, State},
    http::StatusCode,
};
use tracing::info;

use crate::{api_state::ApiState, error::ApiError};

/// Drops a session before its inactivity timeout.
pub async fn delete_session(
    State(state): State<ApiState>,
    Path(session_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if state.sessions.remove(&session_id).await {
        info!(%session_id, "Session removed on request");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("Session not found: {session_id}")))
    }
}
