use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use crate::services::jobs::JobStore;

/// Error recorded on running jobs whose worker stopped reporting.
pub const STALE_JOB_ERROR: &str =
    "BOM import abandoned: no progress from a worker within the job timeout";

/// Slack added to the job timeout before a silent running job counts as abandoned.
const STALE_GRACE: Duration = Duration::from_secs(60);

/// Periodic job table maintenance: fails running jobs that lost their worker and
/// purges completed jobs past retention.
pub struct Housekeeping {
    jobs: Arc<dyn JobStore>,
    retention: chrono::Duration,
    stale_after: chrono::Duration,
}

/// Jobs touched by one sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct SweepReport {
    pub failed_stale: u64,
    pub purged: u64,
}

impl Housekeeping {
    pub fn new(jobs: Arc<dyn JobStore>, retention_hours: i64, job_timeout: Duration) -> Self {
        let stale_after = chrono::Duration::from_std(job_timeout + STALE_GRACE)
            .unwrap_or_else(|_| chrono::Duration::hours(24));
        Self {
            jobs,
            retention: chrono::Duration::hours(retention_hours),
            stale_after,
        }
    }

    /// Run one maintenance pass. Errors are logged and leave the count at zero.
    pub async fn sweep(&self) -> SweepReport {
        let now = Utc::now();
        let mut report = SweepReport::default();

        match self.jobs.fail_stale(now - self.stale_after, STALE_JOB_ERROR).await {
            Ok(0) => {}
            Ok(failed) => {
                metrics::counter!("bom_jobs_failed").increment(failed);
                warn!(failed = failed, "Failed running jobs abandoned by their worker");
                report.failed_stale = failed;
            }
            Err(e) => warn!(error = %e, "Failed to reconcile stale jobs"),
        }

        match self.jobs.purge_completed_before(now - self.retention).await {
            Ok(0) => {}
            Ok(removed) => {
                info!(removed = removed, "Purged completed jobs past retention");
                report.purged = removed;
            }
            Err(e) => warn!(error = %e, "Failed to purge completed jobs"),
        }

        report
    }

    /// Sweep immediately, then every `interval`, forever.
    pub async fn run(self, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            self.sweep().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::job::{JobStatus, JOB_NAME};
    use crate::services::jobs::{InMemoryJobStore, StartOutcome};

    #[tokio::test]
    async fn test_sweep_keeps_live_jobs() {
        let jobs = Arc::new(InMemoryJobStore::new());
        jobs.try_start("doc-1", JOB_NAME, 1).await.unwrap();

        let housekeeping = Housekeeping::new(jobs.clone(), 72, Duration::from_secs(1800));
        assert_eq!(housekeeping.sweep().await, SweepReport::default());

        let job = jobs.latest(Some("doc-1")).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Running);
    }

    #[tokio::test]
    async fn test_sweep_fails_abandoned_and_purges_completed() {
        let jobs = Arc::new(InMemoryJobStore::new());
        let StartOutcome::Started(done) = jobs.try_start("doc-1", JOB_NAME, 1).await.unwrap() else {
            panic!("expected start");
        };
        jobs.finish(done.id, JobStatus::Completed, None).await.unwrap();
        let StartOutcome::Started(lost) = jobs.try_start("doc-2", JOB_NAME, 1).await.unwrap() else {
            panic!("expected start");
        };

        // Negative windows put the cutoffs in the future.
        let housekeeping = Housekeeping {
            jobs: jobs.clone(),
            retention: chrono::Duration::seconds(-1),
            stale_after: chrono::Duration::seconds(-1),
        };
        let report = housekeeping.sweep().await;
        assert_eq!(report, SweepReport { failed_stale: 1, purged: 1 });

        let job = jobs.get(lost.id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error.as_deref(), Some(STALE_JOB_ERROR));
        assert!(jobs.get(done.id).await.unwrap().is_none());

        // The abandoned job is kept for history.
        assert_eq!(housekeeping.sweep().await, SweepReport::default());
        assert!(matches!(
            jobs.try_start("doc-2", JOB_NAME, 1).await.unwrap(),
            StartOutcome::Started(_)
        ));
    }
}
