use std::sync::Arc;

use tracing::{error, info};

use crate::models::document::BomToolDocument;
use crate::models::job::{BomJob, HistoryFilter, JobStatus, JOB_NAME};
use crate::services::bom_tree;
use crate::services::documents::DocumentStore;
use crate::services::jobs::{JobStore, StartOutcome};
use crate::services::queue::{JobDispatcher, QueueError, QueuedJob};
use crate::services::RepositoryError;

#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("invalid document reference: {0}")]
    InvalidReference(String),

    #[error("repository: {0}")]
    Repository(#[from] RepositoryError),

    #[error("failed to enqueue job: {0}")]
    Dispatch(#[from] QueueError),
}

/// Result of a trigger request.
#[derive(Debug, Clone)]
pub enum TriggerOutcome {
    Started(BomJob),
    AlreadyRunning(BomJob),
}

impl TriggerOutcome {
    /// Wire status: "started" or "exists".
    pub fn status(&self) -> &'static str {
        match self {
            TriggerOutcome::Started(_) => "started",
            TriggerOutcome::AlreadyRunning(_) => "exists",
        }
    }

    pub fn job(&self) -> &BomJob {
        match self {
            TriggerOutcome::Started(job) | TriggerOutcome::AlreadyRunning(job) => job,
        }
    }
}

/// Starts BOM import jobs and reports their progress.
pub struct JobService {
    jobs: Arc<dyn JobStore>,
    documents: Arc<dyn DocumentStore>,
    dispatcher: Arc<dyn JobDispatcher>,
}

impl JobService {
    pub fn new(
        jobs: Arc<dyn JobStore>,
        documents: Arc<dyn DocumentStore>,
        dispatcher: Arc<dyn JobDispatcher>,
    ) -> Self {
        Self {
            jobs,
            documents,
            dispatcher,
        }
    }

    /// Start a BOM import for a document unless one is already running for it.
    pub async fn trigger_job(&self, document_reference: &str) -> Result<TriggerOutcome, JobError> {
        let (reference, tree) = self.load_valid(document_reference).await?;
        let total = i32::try_from(tree.len()).unwrap_or(i32::MAX);

        match self.jobs.try_start(&reference, JOB_NAME, total).await? {
            StartOutcome::AlreadyRunning(job) => {
                metrics::counter!("bom_jobs_rejected_total").increment(1);
                info!(job_id = %job.id, document_reference = %reference, "BOM import already running");
                Ok(TriggerOutcome::AlreadyRunning(job))
            }
            StartOutcome::Started(job) => {
                let queued = QueuedJob {
                    job_id: job.id,
                    document_reference: reference.clone(),
                };
                if let Err(e) = self.dispatcher.dispatch(&queued).await {
                    error!(job_id = %job.id, error = %e, "Failed to enqueue BOM import job");
                    self.jobs
                        .finish(job.id, JobStatus::Failed, Some(&format!("failed to enqueue job: {e}")))
                        .await?;
                    return Err(e.into());
                }

                metrics::counter!("bom_jobs_triggered_total").increment(1);
                info!(job_id = %job.id, document_reference = %reference, total = total, "BOM import started");
                Ok(TriggerOutcome::Started(job))
            }
        }
    }

    /// Latest job for a document, or for any document when no reference is given.
    pub async fn get_progress(
        &self,
        document_reference: Option<&str>,
    ) -> Result<Option<BomJob>, JobError> {
        let reference = document_reference.map(str::trim).filter(|r| !r.is_empty());
        Ok(self.jobs.latest(reference).await?)
    }

    /// Finished goods a trigger would create BOMs for.
    pub async fn preview(&self, document_reference: &str) -> Result<Vec<String>, JobError> {
        let (_, tree) = self.load_valid(document_reference).await?;
        Ok(bom_tree::finished_goods(&tree))
    }

    pub async fn failed_history(&self, filter: &HistoryFilter) -> Result<Vec<BomJob>, JobError> {
        Ok(self.jobs.list_failed(filter).await?)
    }

    pub async fn upsert_document(&self, document: &BomToolDocument) -> Result<(), JobError> {
        if document.reference.trim().is_empty() {
            return Err(JobError::InvalidReference(
                "document reference must not be empty".to_string(),
            ));
        }
        self.documents.upsert(document).await?;
        info!(document_reference = %document.reference, rows = document.rows.len(), "Document stored");
        Ok(())
    }

    async fn load_valid(
        &self,
        document_reference: &str,
    ) -> Result<(String, Vec<crate::models::bom::BomNode>), JobError> {
        let reference = document_reference.trim();
        if reference.is_empty() {
            return Err(JobError::InvalidReference(
                "document reference must not be empty".to_string(),
            ));
        }

        let document = self
            .documents
            .get(reference)
            .await?
            .ok_or_else(|| JobError::InvalidReference(format!("document {reference} does not exist")))?;

        let tree = bom_tree::prepare(&document)
            .map_err(|e| JobError::InvalidReference(e.to_string()))?;
        Ok((reference.to_string(), tree))
    }
}
