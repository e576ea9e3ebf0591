use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use garde::Validate;

use crate::app_state::AppState;
use crate::models::api::{DocumentUpload, PreviewResponse};
use crate::models::document::BomToolDocument;

use super::ApiError;

/// PUT /api/v1/documents/{reference} — store the tabulated spreadsheet of a document.
pub async fn upsert_document(
    State(state): State<AppState>,
    Path(reference): Path<String>,
    Json(upload): Json<DocumentUpload>,
) -> Result<StatusCode, ApiError> {
    upload.validate()?;

    let document = BomToolDocument::new(reference.trim(), upload.file_name, upload.rows);
    state.jobs.upsert_document(&document).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/documents/{reference}/preview — finished goods that would get BOMs.
pub async fn preview_document(
    State(state): State<AppState>,
    Path(reference): Path<String>,
) -> Result<Json<PreviewResponse>, ApiError> {
    let finished_goods = state.jobs.preview(&reference).await?;
    Ok(Json(PreviewResponse {
        document_reference: reference,
        finished_goods,
    }))
}
