use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("query failed: {0}")]
    QueryFailed(String),
    #[error("job not found: {0}")]
    JobNotFound(Uuid),
    #[error("job {0} is no longer running")]
    NotRunning(Uuid),
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(e: sqlx::Error) -> Self {
        RepositoryError::QueryFailed(e.to_string())
    }
}
