use garde::Validate;
use serde::{Deserialize, Serialize};

use super::bom::BomRow;
use super::job::{BomFailure, BomJob, JobStatus};

/// Request to start a BOM import for a document.
#[derive(Debug, Deserialize, Validate)]
pub struct TriggerRequest {
    // Blank references are rejected by the service with its own message.
    #[garde(length(max = 140))]
    pub document_reference: String,
}

/// Response after a trigger request.
#[derive(Debug, Serialize)]
pub struct TriggerResponse {
    /// "started" or "exists"
    pub status: String,
    pub job_id: uuid::Uuid,
    pub message: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ProgressQuery {
    #[garde(length(max = 140))]
    pub document_reference: Option<String>,
}

/// Progress of the job for a document. Every field is absent when no job exists.
#[derive(Debug, Default, Serialize)]
pub struct ProgressResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<JobStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<Option<BomJob>> for ProgressResponse {
    fn from(job: Option<BomJob>) -> Self {
        match job {
            Some(job) => Self {
                progress: Some(job.progress_label()),
                job: Some(job.job_name),
                status: Some(job.status),
                document_reference: Some(job.document_reference),
                error: job.error,
            },
            None => Self::default(),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct HistoryQuery {
    #[garde(length(min = 1, max = 140))]
    pub job_name: Option<String>,
    #[garde(length(min = 1, max = 140))]
    pub document_reference: Option<String>,
}

/// One failed job in the history listing.
#[derive(Debug, Serialize)]
pub struct HistoryEntry {
    pub job_id: uuid::Uuid,
    pub job_name: String,
    pub document_reference: String,
    pub error: Option<String>,
    pub failures: Vec<BomFailure>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub finished_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<BomJob> for HistoryEntry {
    fn from(job: BomJob) -> Self {
        Self {
            job_id: job.id,
            job_name: job.job_name,
            document_reference: job.document_reference,
            error: job.error,
            failures: job.failures,
            created_at: job.created_at,
            finished_at: job.finished_at,
        }
    }
}

/// Body of a document upload. Rows are the already-tabulated spreadsheet.
#[derive(Debug, Deserialize, Validate)]
pub struct DocumentUpload {
    #[garde(length(min = 1, max = 255))]
    pub file_name: Option<String>,
    #[garde(skip)]
    pub rows: Vec<BomRow>,
}

/// Finished goods a trigger would create BOMs for.
#[derive(Debug, Serialize)]
pub struct PreviewResponse {
    pub document_reference: String,
    pub finished_goods: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_trigger_reference_left_to_service() {
        let blank = TriggerRequest {
            document_reference: String::new(),
        };
        assert!(blank.validate().is_ok());

        let too_long = TriggerRequest {
            document_reference: "x".repeat(141),
        };
        assert!(too_long.validate().is_err());
    }
}
