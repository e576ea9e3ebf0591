use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

/// Label shown next to the progress of every BOM import run.
pub const JOB_NAME: &str = "Import BOM Creator";

const QUEUED_MESSAGE: &str = "Background job queued. Please be patient while it's processed.";

/// Status of a BOM import job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, JobStatus::Running)
    }
}

/// One finished good that could not be turned into a BOM.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BomFailure {
    pub item_code: String,
    /// Spreadsheet row of the finished good (header is row 1).
    pub row: usize,
    pub reason: String,
}

/// A BOM import run for one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BomJob {
    pub id: Uuid,
    pub document_reference: String,
    pub job_name: String,
    pub status: JobStatus,
    pub processed: i32,
    pub total: i32,
    pub error: Option<String>,
    pub failures: Vec<BomFailure>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl BomJob {
    pub fn new(document_reference: &str, job_name: &str, total: i32) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            document_reference: document_reference.to_string(),
            job_name: job_name.to_string(),
            status: JobStatus::Running,
            processed: 0,
            total,
            error: None,
            failures: Vec::new(),
            created_at: now,
            started_at: None,
            updated_at: now,
            finished_at: None,
        }
    }

    /// Human-readable progress, e.g. "45.50%" or "100%".
    pub fn progress_label(&self) -> String {
        if self.status == JobStatus::Running && self.started_at.is_none() {
            return QUEUED_MESSAGE.to_string();
        }
        if self.status == JobStatus::Completed && self.total <= 0 {
            return "100%".to_string();
        }
        percent_label(self.processed, self.total)
    }
}

/// Format `processed / total` as a percentage, without decimals for whole numbers.
pub fn percent_label(processed: i32, total: i32) -> String {
    if total <= 0 {
        return "0%".to_string();
    }
    let pct = f64::from(processed.clamp(0, total)) / f64::from(total) * 100.0;
    if pct.fract() == 0.0 {
        format!("{pct:.0}%")
    } else {
        format!("{pct:.2}%")
    }
}

/// Filter for the failed-job history listing.
#[derive(Debug, Clone, Default)]
pub struct HistoryFilter {
    pub job_name: Option<String>,
    pub document_reference: Option<String>,
}

impl HistoryFilter {
    pub fn matches(&self, job: &BomJob) -> bool {
        job.status == JobStatus::Failed
            && self.job_name.as_deref().map_or(true, |n| job.job_name == n)
            && self
                .document_reference
                .as_deref()
                .map_or(true, |r| job.document_reference == r)
    }
}
