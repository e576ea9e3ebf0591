mod fixtures;

use std::sync::Arc;

use bom_job_service::{
    config::AppConfig,
    db::{self, document_queries::PgDocumentStore, inventory_queries::PgInventory, job_queries::PgJobStore},
    models::{document::BomToolDocument, job::{JobStatus, JOB_NAME}},
    services::{
        bom_creator::BomCreator,
        documents::DocumentStore,
        job_service::JobService,
        jobs::{JobStore, StartOutcome},
        queue::JobQueue,
    },
};
use fixtures::*;
use uuid::Uuid;

async fn seed_masters(pool: &sqlx::PgPool) {
    for group in ITEM_GROUPS {
        sqlx::query("INSERT INTO item_groups (name) VALUES ($1) ON CONFLICT DO NOTHING")
            .bind(*group)
            .execute(pool)
            .await
            .expect("Failed to seed item group");
    }
    for operation in OPERATIONS {
        sqlx::query("INSERT INTO operations (name) VALUES ($1) ON CONFLICT DO NOTHING")
            .bind(*operation)
            .execute(pool)
            .await
            .expect("Failed to seed operation");
    }
}

/// Integration test: full import flow through PostgreSQL and Redis
///
/// Covers:
/// 1. Database connection and schema
/// 2. Conditional insert of running jobs (one per document)
/// 3. Job queue (enqueue/dequeue/complete)
/// 4. BOM creation and progress updates
///
/// Note: This requires a running PostgreSQL and Redis instance
/// configured via environment variables.
#[tokio::test]
#[ignore] // Run with: cargo test --test integration_test -- --ignored
async fn test_full_integration() {
    let config = AppConfig::from_env().expect("Failed to load config");

    let db_pool = db::init_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");
    db::run_migrations(&db_pool)
        .await
        .expect("Failed to run migrations");
    seed_masters(&db_pool).await;

    let jobs = Arc::new(PgJobStore::new(db_pool.clone()));
    let documents = Arc::new(PgDocumentStore::new(db_pool.clone()));
    let redis_url = config.require_redis_url().expect("REDIS_URL not set");
    let queue = Arc::new(JobQueue::new(redis_url).expect("Failed to init queue"));

    let prefix = format!("IT{}", &Uuid::new_v4().simple().to_string()[..8]);
    let reference = format!("{prefix}-tool");
    documents
        .upsert(&BomToolDocument::new(&reference, Some("bom.xlsx".to_string()), frame_rows(&prefix)))
        .await
        .expect("Failed to store document");

    let service = JobService::new(jobs.clone(), documents.clone(), queue.clone());

    // 1. Trigger twice: one started, one exists
    let first = service.trigger_job(&reference).await.expect("Trigger failed");
    let second = service.trigger_job(&reference).await.expect("Trigger failed");
    assert_eq!(first.status(), "started");
    assert_eq!(second.status(), "exists");
    assert_eq!(first.job().id, second.job().id);

    // 2. Worker side: dequeue and process
    let queued = loop {
        let job = queue
            .dequeue()
            .await
            .expect("Failed to dequeue")
            .expect("No job in queue");
        if job.job_id == first.job().id {
            break job;
        }
        // Leftovers from other runs go back untouched.
        queue.enqueue(&job).await.expect("Failed to requeue");
        queue.complete(&job).await.expect("Failed to complete");
    };

    let creator = BomCreator::new(
        jobs.clone(),
        documents.clone(),
        Arc::new(PgInventory::new(db_pool.clone())),
        config.default_company.clone(),
    );
    assert_eq!(creator.process(&queued).await, JobStatus::Completed);
    queue.complete(&queued).await.expect("Failed to complete");

    // 3. Progress is final and the job never reverts
    let done = service
        .get_progress(Some(&reference))
        .await
        .expect("Progress failed")
        .expect("Job missing");
    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(done.progress_label(), "100%");
    assert!(jobs.finish(done.id, JobStatus::Failed, None).await.is_err());

    // 4. A new run may start
    assert_eq!(service.trigger_job(&reference).await.unwrap().status(), "started");
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn test_concurrent_start_respects_partial_index() {
    let config = AppConfig::from_env().expect("Failed to load config");
    let db_pool = db::init_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");
    db::run_migrations(&db_pool)
        .await
        .expect("Failed to run migrations");

    let store = Arc::new(PgJobStore::new(db_pool));
    let reference = format!("race-{}", Uuid::new_v4());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let store = store.clone();
            let reference = reference.clone();
            tokio::spawn(async move { store.try_start(&reference, JOB_NAME, 1).await })
        })
        .collect();

    let mut started = Vec::new();
    for handle in handles {
        if let StartOutcome::Started(job) = handle.await.unwrap().expect("try_start failed") {
            started.push(job);
        }
    }
    assert_eq!(started.len(), 1);

    store
        .finish(started[0].id, JobStatus::Completed, None)
        .await
        .expect("Failed to finish");
}
