use axum::{
    Json,
    extract::{Multipart, State},
    response::IntoResponse,
};
use tracing::debug;

use crate::{
    api::{app_state::AppState, dto::document_dto::UploadResponse},
    error::AppError,
};

pub async fn upload_document(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("invalid multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        if filename.is_empty() {
            return Err(AppError::Validation("No file selected".to_string()));
        }

        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("failed to read upload: {}", e)))?;

        debug!("Received upload {} ({} bytes)", filename, bytes.len());

        let receipt = state.documents.ingest(&filename, &bytes).await?;
        state.metrics.record_upload();

        return Ok(Json(UploadResponse::from(receipt)));
    }

    Err(AppError::Validation("No file uploaded".to_string()))
}
