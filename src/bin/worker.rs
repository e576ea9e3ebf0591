use bom_job_service::{
    config::AppConfig,
    db::{self, document_queries::PgDocumentStore, inventory_queries::PgInventory, job_queries::PgJobStore},
    models::job::JobStatus,
    services::{bom_creator::BomCreator, housekeeping::Housekeeping, jobs::JobStore, queue::JobQueue},
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::Instrument;
use tracing_subscriber::EnvFilter;

/// How often abandoned jobs are failed and completed jobs past retention purged.
const HOUSEKEEPING_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting BOM import worker");

    let config = AppConfig::from_env().expect("Failed to load configuration");
    let poll_interval = Duration::from_millis(config.worker_poll_interval_ms);

    tracing::info!("Connecting to PostgreSQL");
    let db_pool = db::init_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");

    let jobs: Arc<dyn JobStore> = Arc::new(PgJobStore::new(db_pool.clone()));
    let creator = BomCreator::new(
        jobs.clone(),
        Arc::new(PgDocumentStore::new(db_pool.clone())),
        Arc::new(PgInventory::new(db_pool)),
        config.default_company.clone(),
    )
    .with_timeout(Duration::from_secs(config.job_timeout_secs));

    let redis_url = config.require_redis_url().expect("REDIS_URL is required for the worker");
    let queue = JobQueue::new(redis_url).expect("Failed to initialize job queue");

    tracing::info!("Worker ready, starting job processing loop");

    let housekeeping = Housekeeping::new(
        jobs,
        config.job_retention_hours,
        Duration::from_secs(config.job_timeout_secs),
    );
    // The first pass runs before any dequeue, releasing jobs a crashed worker left running.
    let mut last_sweep: Option<Instant> = None;

    loop {
        if last_sweep.map_or(true, |t| t.elapsed() >= HOUSEKEEPING_INTERVAL) {
            housekeeping.sweep().await;
            last_sweep = Some(Instant::now());
        }

        match process_next_job(&queue, &creator).await {
            Ok(true) => {
                tracing::debug!("Job processed, checking for next job");
            }
            Ok(false) => {
                tracing::trace!("No jobs available, sleeping");
                sleep(poll_interval).await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Error reading job queue, will retry");
                sleep(poll_interval).await;
            }
        }
    }
}

/// Process the next job from the queue.
/// Returns Ok(true) if a job was processed, Ok(false) if no job available.
async fn process_next_job(
    queue: &JobQueue,
    creator: &BomCreator,
) -> Result<bool, Box<dyn std::error::Error>> {
    let job = match queue.dequeue().await? {
        Some(j) => j,
        None => return Ok(false),
    };

    if let Ok(depth) = queue.queue_depth().await {
        metrics::gauge!("bom_queue_depth").set(depth as f64);
    }

    let span = tracing::info_span!(
        "bom_import_job",
        job_id = %job.job_id,
        document_reference = %job.document_reference,
    );
    let status = creator.process(&job).instrument(span).await;

    // Failed jobs are not re-queued; a new trigger starts a fresh run.
    queue.complete(&job).await?;

    match status {
        JobStatus::Completed => tracing::info!(job_id = %job.job_id, "Job completed successfully"),
        _ => tracing::warn!(job_id = %job.job_id, status = %status, "Job did not complete"),
    }

    Ok(true)
}
