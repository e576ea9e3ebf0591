//! Test helper utilities for E2E testing

use bom_job_service::models::bom::BomRow;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::sleep;
use uuid::Uuid;

/// Response from POST /api/v1/jobs
#[derive(Debug, Serialize, Deserialize)]
pub struct TriggerResponse {
    pub status: String,
    pub job_id: Uuid,
    pub message: String,
}

/// Response from GET /api/v1/jobs/progress
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ProgressResponse {
    pub job: Option<String>,
    pub progress: Option<String>,
    pub status: Option<String>,
    pub document_reference: Option<String>,
    pub error: Option<String>,
}

/// Response from GET /api/v1/documents/{reference}/preview
#[derive(Debug, Deserialize)]
pub struct PreviewResponse {
    pub document_reference: String,
    pub finished_goods: Vec<String>,
}

/// Store the tabulated spreadsheet of a document
pub async fn upload_document(
    client: &reqwest::Client,
    base_url: &str,
    reference: &str,
    rows: &[BomRow],
) -> Result<(), Box<dyn std::error::Error>> {
    let response = client
        .put(format!("{}/api/v1/documents/{}", base_url, reference))
        .json(&serde_json::json!({ "file_name": "bom.xlsx", "rows": rows }))
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await?;
        return Err(format!("Upload failed with status {}: {}", status, body).into());
    }
    Ok(())
}

/// Trigger a BOM import, returning the HTTP status and parsed body
pub async fn trigger_job(
    client: &reqwest::Client,
    base_url: &str,
    reference: &str,
) -> Result<(reqwest::StatusCode, serde_json::Value), Box<dyn std::error::Error>> {
    let response = client
        .post(format!("{}/api/v1/jobs", base_url))
        .json(&serde_json::json!({ "document_reference": reference }))
        .send()
        .await?;

    let status = response.status();
    let body = response.json::<serde_json::Value>().await?;
    Ok((status, body))
}

/// Fetch progress for a document
pub async fn get_progress(
    client: &reqwest::Client,
    base_url: &str,
    reference: &str,
) -> Result<ProgressResponse, Box<dyn std::error::Error>> {
    let response = client
        .get(format!("{}/api/v1/jobs/progress", base_url))
        .query(&[("document_reference", reference)])
        .send()
        .await?;

    Ok(response.json::<ProgressResponse>().await?)
}

/// Poll progress until the job leaves "running"
pub async fn wait_for_completion(
    client: &reqwest::Client,
    base_url: &str,
    reference: &str,
    max_wait_secs: u64,
) -> Result<ProgressResponse, Box<dyn std::error::Error>> {
    let start = std::time::Instant::now();
    let poll_interval = Duration::from_millis(500);

    loop {
        let progress = get_progress(client, base_url, reference).await?;
        match progress.status.as_deref() {
            Some("completed") | Some("failed") => return Ok(progress),
            Some("running") => {
                if start.elapsed().as_secs() > max_wait_secs {
                    return Err(format!(
                        "Timeout waiting for {} after {}s (progress: {:?})",
                        reference, max_wait_secs, progress.progress
                    )
                    .into());
                }
                sleep(poll_interval).await;
            }
            other => return Err(format!("Unexpected job status: {:?}", other).into()),
        }
    }
}
