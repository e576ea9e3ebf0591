use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use tracing::instrument;
use uuid::Uuid;

use crate::models::job::{BomFailure, BomJob, HistoryFilter, JobStatus};
use crate::services::jobs::{JobStore, StartOutcome};
use crate::services::RepositoryError;

const JOB_COLUMNS: &str = "id, document_reference, job_name, status, processed, total, error, \
     failures, created_at, started_at, updated_at, finished_at";

/// Attempts at the insert-or-read-running loop before giving up.
const START_ATTEMPTS: usize = 3;

/// Job table in PostgreSQL. A partial unique index on running jobs makes
/// `try_start` a conditional insert.
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn job_from_row(row: &PgRow) -> Result<BomJob, sqlx::Error> {
    let status: String = row.try_get("status")?;
    let status = JobStatus::from_str(&status).map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
    let failures: Json<Vec<BomFailure>> = row.try_get("failures")?;

    Ok(BomJob {
        id: row.try_get("id")?,
        document_reference: row.try_get("document_reference")?,
        job_name: row.try_get("job_name")?,
        status,
        processed: row.try_get("processed")?,
        total: row.try_get("total")?,
        error: row.try_get("error")?,
        failures: failures.0,
        created_at: row.try_get("created_at")?,
        started_at: row.try_get("started_at")?,
        updated_at: row.try_get("updated_at")?,
        finished_at: row.try_get("finished_at")?,
    })
}

impl PgJobStore {
    /// Fails with `JobNotFound` or `NotRunning` when an update touched no row.
    async fn ensure_updated(&self, job_id: Uuid, rows_affected: u64) -> Result<(), RepositoryError> {
        if rows_affected > 0 {
            return Ok(());
        }
        match self.get(job_id).await? {
            Some(_) => Err(RepositoryError::NotRunning(job_id)),
            None => Err(RepositoryError::JobNotFound(job_id)),
        }
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    #[instrument(skip(self))]
    async fn try_start(
        &self,
        document_reference: &str,
        job_name: &str,
        total: i32,
    ) -> Result<StartOutcome, RepositoryError> {
        for _ in 0..START_ATTEMPTS {
            let inserted = sqlx::query(&format!(
                r#"
                INSERT INTO bom_jobs (document_reference, job_name, status, total)
                VALUES ($1, $2, 'running', $3)
                ON CONFLICT (document_reference) WHERE status = 'running' DO NOTHING
                RETURNING {JOB_COLUMNS}
                "#
            ))
            .bind(document_reference)
            .bind(job_name)
            .bind(total)
            .fetch_optional(&self.pool)
            .await?;

            if let Some(row) = inserted {
                return Ok(StartOutcome::Started(job_from_row(&row)?));
            }

            let running = sqlx::query(&format!(
                "SELECT {JOB_COLUMNS} FROM bom_jobs WHERE document_reference = $1 AND status = 'running'"
            ))
            .bind(document_reference)
            .fetch_optional(&self.pool)
            .await?;

            // The running job may finish between the insert and the read; retry then.
            if let Some(row) = running {
                return Ok(StartOutcome::AlreadyRunning(job_from_row(&row)?));
            }
        }

        Err(RepositoryError::ConstraintViolation(format!(
            "could not start job for {document_reference}: running job kept changing"
        )))
    }

    #[instrument(skip(self))]
    async fn mark_started(&self, job_id: Uuid) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE bom_jobs
            SET started_at = COALESCE(started_at, NOW()),
                updated_at = NOW()
            WHERE id = $1 AND status = 'running'
            "#,
        )
        .bind(job_id)
        .execute(&self.pool)
        .await?;

        self.ensure_updated(job_id, result.rows_affected()).await
    }

    #[instrument(skip(self))]
    async fn record_progress(
        &self,
        job_id: Uuid,
        processed: i32,
        total: i32,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE bom_jobs
            SET processed = $1, total = $2, updated_at = NOW()
            WHERE id = $3 AND status = 'running'
            "#,
        )
        .bind(processed)
        .bind(total)
        .bind(job_id)
        .execute(&self.pool)
        .await?;

        self.ensure_updated(job_id, result.rows_affected()).await
    }

    #[instrument(skip(self, failure), fields(item_code = %failure.item_code))]
    async fn record_failure(
        &self,
        job_id: Uuid,
        failure: &BomFailure,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE bom_jobs
            SET failures = failures || $1::jsonb,
                error = $2,
                updated_at = NOW()
            WHERE id = $3 AND status = 'running'
            "#,
        )
        .bind(Json(vec![failure]))
        .bind(&failure.reason)
        .bind(job_id)
        .execute(&self.pool)
        .await?;

        self.ensure_updated(job_id, result.rows_affected()).await
    }

    #[instrument(skip(self))]
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

        let result = sqlx::query(
            r#"
            UPDATE bom_jobs
            SET status = $1,
                error = COALESCE($2, error),
                updated_at = NOW(),
                finished_at = NOW()
            WHERE id = $3 AND status = 'running'
            "#,
        )
        .bind(status.as_ref())
        .bind(error)
        .bind(job_id)
        .execute(&self.pool)
        .await?;

        self.ensure_updated(job_id, result.rows_affected()).await
    }

    async fn get(&self, job_id: Uuid) -> Result<Option<BomJob>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {JOB_COLUMNS} FROM bom_jobs WHERE id = $1"))
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(job_from_row).transpose()?)
    }

    async fn latest(
        &self,
        document_reference: Option<&str>,
    ) -> Result<Option<BomJob>, RepositoryError> {
        let row = match document_reference {
            Some(reference) => {
                sqlx::query(&format!(
                    r#"
                    SELECT {JOB_COLUMNS} FROM bom_jobs
                    WHERE document_reference = $1
                    ORDER BY created_at DESC
                    LIMIT 1
                    "#
                ))
                .bind(reference)
                .fetch_optional(&self.pool)
                .await?
            }
            None => {
                sqlx::query(&format!(
                    r#"
                    SELECT {JOB_COLUMNS} FROM bom_jobs
                    ORDER BY (status = 'running') DESC, created_at DESC
                    LIMIT 1
                    "#
                ))
                .fetch_optional(&self.pool)
                .await?
            }
        };

        Ok(row.as_ref().map(job_from_row).transpose()?)
    }

    async fn list_failed(&self, filter: &HistoryFilter) -> Result<Vec<BomJob>, RepositoryError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {JOB_COLUMNS} FROM bom_jobs
            WHERE status = 'failed'
              AND ($1::text IS NULL OR job_name = $1)
              AND ($2::text IS NULL OR document_reference = $2)
            ORDER BY created_at DESC
            LIMIT 500
            "#
        ))
        .bind(filter.job_name.as_deref())
        .bind(filter.document_reference.as_deref())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|r| job_from_row(r).map_err(RepositoryError::from))
            .collect()
    }

    async fn purge_completed_before(&self, cutoff: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            "DELETE FROM bom_jobs WHERE status = 'completed' AND finished_at < $1",
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    #[instrument(skip(self))]
    async fn fail_stale(&self, cutoff: DateTime<Utc>, reason: &str) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE bom_jobs
            SET status = 'failed',
                error = $2,
                updated_at = NOW(),
                finished_at = NOW()
            WHERE status = 'running' AND updated_at < $1
            "#,
        )
        .bind(cutoff)
        .bind(reason)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
