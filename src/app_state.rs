use sqlx::PgPool;
use std::sync::Arc;

use crate::services::{job_service::JobService, queue::JobQueue};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    /// Absent when jobs run on the embedded worker instead of Redis.
    pub queue: Option<Arc<JobQueue>>,
    pub jobs: Arc<JobService>,
}

impl AppState {
    pub fn new(db: PgPool, queue: Option<Arc<JobQueue>>, jobs: JobService) -> Self {
        Self {
            db,
            queue,
            jobs: Arc::new(jobs),
        }
    }
}
