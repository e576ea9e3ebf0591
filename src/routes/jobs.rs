use axum::extract::{Query, State};
use axum::Json;
use garde::Validate;

use crate::app_state::AppState;
use crate::models::api::{
    HistoryEntry, HistoryQuery, ProgressQuery, ProgressResponse, TriggerRequest, TriggerResponse,
};
use crate::models::job::HistoryFilter;
use crate::services::job_service::TriggerOutcome;

use super::ApiError;

/// POST /api/v1/jobs — start BOM creation for a document.
pub async fn trigger_job(
    State(state): State<AppState>,
    Json(request): Json<TriggerRequest>,
) -> Result<Json<TriggerResponse>, ApiError> {
    request.validate()?;

    let outcome = state.jobs.trigger_job(&request.document_reference).await?;
    let message = match &outcome {
        TriggerOutcome::Started(_) => {
            "BOM creation started successfully. Check background jobs for progress."
        }
        TriggerOutcome::AlreadyRunning(_) => "A job is already running for this document.",
    };

    Ok(Json(TriggerResponse {
        status: outcome.status().to_string(),
        job_id: outcome.job().id,
        message: message.to_string(),
    }))
}

/// GET /api/v1/jobs/progress — progress of the latest job.
pub async fn get_progress(
    State(state): State<AppState>,
    Query(query): Query<ProgressQuery>,
) -> Result<Json<ProgressResponse>, ApiError> {
    query.validate()?;

    let job = state
        .jobs
        .get_progress(query.document_reference.as_deref())
        .await?;
    Ok(Json(ProgressResponse::from(job)))
}

/// GET /api/v1/jobs/history — failed jobs, newest first.
pub async fn failed_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<HistoryEntry>>, ApiError> {
    query.validate()?;

    let filter = HistoryFilter {
        job_name: query.job_name,
        document_reference: query.document_reference,
    };
    let jobs = state.jobs.failed_history(&filter).await?;
    Ok(Json(jobs.into_iter().map(HistoryEntry::from).collect()))
}
