use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::job::{BomFailure, BomJob, HistoryFilter, JobStatus};

use super::RepositoryError;

/// Result of an attempt to start a job for a document.
#[derive(Debug, Clone)]
pub enum StartOutcome {
    Started(BomJob),
    /// A job is already running for the document; nothing was created.
    AlreadyRunning(BomJob),
}

/// Job table keyed by document reference.
///
/// Implementations must make `try_start` an atomic check-and-create: for a given
/// document reference at most one job may be `Running`. Once a job leaves `Running`
/// it never returns to it.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn try_start(
        &self,
        document_reference: &str,
        job_name: &str,
        total: i32,
    ) -> Result<StartOutcome, RepositoryError>;

    /// Record that a worker picked the job up.
    async fn mark_started(&self, job_id: Uuid) -> Result<(), RepositoryError>;

    async fn record_progress(
        &self,
        job_id: Uuid,
        processed: i32,
        total: i32,
    ) -> Result<(), RepositoryError>;

    async fn record_failure(
        &self,
        job_id: Uuid,
        failure: &BomFailure,
    ) -> Result<(), RepositoryError>;

    /// Move a running job to a terminal status.
    async fn finish(
        &self,
        job_id: Uuid,
        status: JobStatus,
        error: Option<&str>,
    ) -> Result<(), RepositoryError>;

    async fn get(&self, job_id: Uuid) -> Result<Option<BomJob>, RepositoryError>;

    /// Most recent job for a document. Without a reference: the most recent running
    /// job, falling back to the most recent job of any status.
    async fn latest(
        &self,
        document_reference: Option<&str>,
    ) -> Result<Option<BomJob>, RepositoryError>;

    /// Failed jobs matching the filter, newest first.
    async fn list_failed(&self, filter: &HistoryFilter) -> Result<Vec<BomJob>, RepositoryError>;

    /// Delete completed jobs finished before `cutoff`. Returns the number removed.
    async fn purge_completed_before(&self, cutoff: DateTime<Utc>) -> Result<u64, RepositoryError>;

    /// Fail running jobs with no update since `cutoff`, recording `reason` as their
    /// error. Returns the number of jobs failed.
    async fn fail_stale(&self, cutoff: DateTime<Utc>, reason: &str) -> Result<u64, RepositoryError>;
}

/// Job table held in process memory behind a single lock.
#[derive(Default)]
pub struct InMemoryJobStore {
    jobs: RwLock<Vec<BomJob>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn running_mut(jobs: &mut [BomJob], job_id: Uuid) -> Result<&mut BomJob, RepositoryError> {
    let job = jobs
        .iter_mut()
        .find(|j| j.id == job_id)
        .ok_or(RepositoryError::JobNotFound(job_id))?;
    if job.status.is_terminal() {
        return Err(RepositoryError::NotRunning(job_id));
    }
    Ok(job)
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn try_start(
        &self,
        document_reference: &str,
        job_name: &str,
        total: i32,
    ) -> Result<StartOutcome, RepositoryError> {
        let mut jobs = self.jobs.write().await;
        if let Some(running) = jobs
            .iter()
            .find(|j| j.document_reference == document_reference && j.status == JobStatus::Running)
        {
            return Ok(StartOutcome::AlreadyRunning(running.clone()));
        }

        let job = BomJob::new(document_reference, job_name, total);
        jobs.push(job.clone());
        Ok(StartOutcome::Started(job))
    }

    async fn mark_started(&self, job_id: Uuid) -> Result<(), RepositoryError> {
        let mut jobs = self.jobs.write().await;
        let job = running_mut(&mut jobs, job_id)?;
        let now = Utc::now();
        job.started_at.get_or_insert(now);
        job.updated_at = now;
        Ok(())
    }

    async fn record_progress(
        &self,
        job_id: Uuid,
        processed: i32,
        total: i32,
    ) -> Result<(), RepositoryError> {
        let mut jobs = self.jobs.write().await;
        let job = running_mut(&mut jobs, job_id)?;
        job.processed = processed;
        job.total = total;
        job.updated_at = Utc::now();
        Ok(())
    }

    async fn record_failure(
        &self,
        job_id: Uuid,
        failure: &BomFailure,
    ) -> Result<(), RepositoryError> {
        let mut jobs = self.jobs.write().await;
        let job = running_mut(&mut jobs, job_id)?;
        job.failures.push(failure.clone());
        job.error = Some(failure.reason.clone());
        job.updated_at = Utc::now();
        Ok(())
    }

    async fn finish(
        &self,
        job_id: Uuid,
        status: JobStatus,
        error: Option<&str>,
    ) -> Result<(), RepositoryError> {
        if !status.is_terminal() {
            return Err(RepositoryError::ConstraintViolation(format!(
                "cannot finish job {job_id} as {status}"
            )));
        }
        let mut jobs = self.jobs.write().await;
        let job = running_mut(&mut jobs, job_id)?;
        let now = Utc::now();
        job.status = status;
        if let Some(error) = error {
            job.error = Some(error.to_string());
        }
        job.updated_at = now;
        job.finished_at = Some(now);
        Ok(())
    }

    async fn get(&self, job_id: Uuid) -> Result<Option<BomJob>, RepositoryError> {
        let jobs = self.jobs.read().await;
        Ok(jobs.iter().find(|j| j.id == job_id).cloned())
    }

    async fn latest(
        &self,
        document_reference: Option<&str>,
    ) -> Result<Option<BomJob>, RepositoryError> {
        let jobs = self.jobs.read().await;
        // Jobs are appended in creation order, so the last match is the newest.
        let found = match document_reference {
            Some(reference) => jobs.iter().rev().find(|j| j.document_reference == reference),
            None => jobs
                .iter()
                .rev()
                .find(|j| j.status == JobStatus::Running)
                .or_else(|| jobs.last()),
        };
        Ok(found.cloned())
    }

    async fn list_failed(&self, filter: &HistoryFilter) -> Result<Vec<BomJob>, RepositoryError> {
        let jobs = self.jobs.read().await;
        Ok(jobs.iter().rev().filter(|j| filter.matches(j)).cloned().collect())
    }

    async fn purge_completed_before(&self, cutoff: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let mut jobs = self.jobs.write().await;
        let before = jobs.len();
        jobs.retain(|j| {
            !(j.status == JobStatus::Completed && j.finished_at.map_or(false, |f| f < cutoff))
        });
        Ok((before - jobs.len()) as u64)
    }

    async fn fail_stale(&self, cutoff: DateTime<Utc>, reason: &str) -> Result<u64, RepositoryError> {
        let mut jobs = self.jobs.write().await;
        let now = Utc::now();
        let mut failed = 0;
        for job in jobs
            .iter_mut()
            .filter(|j| j.status == JobStatus::Running && j.updated_at < cutoff)
        {
            job.status = JobStatus::Failed;
            job.error = Some(reason.to_string());
            job.updated_at = now;
            job.finished_at = Some(now);
            failed += 1;
        }
        Ok(failed)
    }
}
