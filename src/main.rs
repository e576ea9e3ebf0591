use axum::routing::{get, post, put};
use axum::Router;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use std::time::Duration;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use bom_job_service::{
    app_state::AppState,
    config::AppConfig,
    db::{self, document_queries::PgDocumentStore, inventory_queries::PgInventory, job_queries::PgJobStore},
    routes,
    services::{
        bom_creator::{self, BomCreator},
        housekeeping::Housekeeping,
        job_service::JobService,
        jobs::JobStore,
        queue::{ChannelDispatcher, JobDispatcher, JobQueue},
    },
};

/// Capacity of the in-process job channel used by the embedded worker.
const EMBEDDED_QUEUE_CAPACITY: usize = 256;

/// How often the embedded worker reconciles and purges the job table.
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

    // Load configuration from environment
    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!("Initializing bom-job-service");

    // Initialize Prometheus metrics recorder
    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    let prometheus_handle = Arc::new(prometheus_handle);

    metrics::describe_counter!("bom_jobs_triggered_total", "BOM import jobs started");
    metrics::describe_counter!(
        "bom_jobs_rejected_total",
        "Trigger requests rejected because a job was already running"
    );
    metrics::describe_counter!("bom_jobs_completed", "BOM import jobs completed");
    metrics::describe_counter!("bom_jobs_failed", "BOM import jobs that failed");
    metrics::describe_counter!("bom_records_created_total", "BOM Creator records created");
    metrics::describe_gauge!("bom_queue_depth", "Pending jobs in the Redis queue");

    tracing::info!("Connecting to PostgreSQL database");
    let db_pool = db::init_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");

    tracing::info!("Running database migrations");
    db::run_migrations(&db_pool)
        .await
        .expect("Failed to run database migrations");

    let job_store = Arc::new(PgJobStore::new(db_pool.clone()));
    let document_store = Arc::new(PgDocumentStore::new(db_pool.clone()));

    let (dispatcher, queue): (Arc<dyn JobDispatcher>, Option<Arc<JobQueue>>) = if config.embedded_worker {
        tracing::info!("Starting embedded BOM worker");
        let creator = BomCreator::new(
            job_store.clone(),
            document_store.clone(),
            Arc::new(PgInventory::new(db_pool.clone())),
            config.default_company.clone(),
        )
        .with_timeout(Duration::from_secs(config.job_timeout_secs));
        let (dispatcher, receiver) = ChannelDispatcher::new(EMBEDDED_QUEUE_CAPACITY);
        tokio::spawn(bom_creator::run_embedded_worker(Arc::new(creator), receiver));

        // Jobs left running by a previous process had their channel entries lost.
        let housekeeping = Housekeeping::new(
            job_store.clone() as Arc<dyn JobStore>,
            config.job_retention_hours,
            Duration::from_secs(config.job_timeout_secs),
        );
        tokio::spawn(housekeeping.run(HOUSEKEEPING_INTERVAL));

        (Arc::new(dispatcher) as Arc<dyn JobDispatcher>, None)
    } else {
        tracing::info!("Connecting to Redis job queue");
        let redis_url = config.require_redis_url().expect("REDIS_URL is required without EMBEDDED_WORKER");
        let queue = Arc::new(JobQueue::new(redis_url).expect("Failed to initialize job queue"));
        (queue.clone() as Arc<dyn JobDispatcher>, Some(queue))
    };

    let jobs = JobService::new(job_store, document_store, dispatcher);
    let state = AppState::new(db_pool, queue, jobs);

    let app = Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/api/v1/jobs", post(routes::jobs::trigger_job))
        .route("/api/v1/jobs/progress", get(routes::jobs::get_progress))
        .route("/api/v1/jobs/history", get(routes::jobs::failed_history))
        .route(
            "/api/v1/documents/{reference}",
            put(routes::documents::upsert_document),
        )
        .route(
            "/api/v1/documents/{reference}/preview",
            get(routes::documents::preview_document),
        )
        .with_state(state)
        // Prometheus metrics endpoint (separate state)
        .route(
            "/metrics",
            get(routes::metrics::prometheus_metrics).with_state(prometheus_handle),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(RequestBodyLimitLayer::new(10 * 1024 * 1024)); // 10 MB limit

    tracing::info!("Starting bom-job-service on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .await
        .expect("Server error");
}
