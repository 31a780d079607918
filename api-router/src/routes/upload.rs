use axum::{extract::State, response::IntoResponse, Json};
use axum_typed_multipart::{FieldData, TryFromMultipart, TypedMultipart};
use common::{error::AppError, storage::types::file_info::FileInfo, utils::ingest_limits::validate_upload};
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::info;

use crate::{api_state::ApiState, error::ApiError};

#[derive(Debug, TryFromMultipart)]
pub struct UploadParams {
    // Size is bounded by the route's body limit and `validate_upload`.
    #[form_data(limit = "unlimited")]
    pub file: FieldData<NamedTempFile>,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub session_id: String,
    pub chunk_count: usize,
}

/// Parses, chunks and indexes one document and opens a session over it.
/// The temporary file is removed when the handler returns.
pub async fn upload_document(
    State(state): State<ApiState>,
    TypedMultipart(input): TypedMultipart<UploadParams>,
) -> Result<impl IntoResponse, ApiError> {
    let FieldData { metadata, contents } = input.file;
    let size = contents.as_file().metadata().map_err(AppError::from)?.len();

    let file_info = FileInfo::new(
        metadata.file_name.as_deref(),
        metadata.content_type.as_deref(),
        size,
    )?;
    validate_upload(&state.config, &file_info)?;

    info!(
        file_name = %file_info.file_name,
        mime_type = %file_info.mime_type,
        size,
        "Received document upload"
    );

    let document = state
        .ingestion
        .ingest_file(contents.path(), file_info.kind)
        .await?;
    let chunk_count = document.len();
    let session_id = state.sessions.create(document).await;

    info!(%session_id, chunk_count, "Session created");

    Ok(Json(UploadResponse {
        session_id,
        chunk_count,
    }))
}
