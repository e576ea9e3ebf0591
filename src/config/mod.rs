use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:3000"). Optional for worker processes.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// PostgreSQL connection string
    pub database_url: String,

    /// Redis connection string for the job queue. Not needed with the embedded worker.
    #[serde(default)]
    pub redis_url: Option<String>,

    /// Company recorded on every created BOM Creator record
    pub default_company: String,

    /// Run BOM creation inside the API process instead of a separate worker
    #[serde(default)]
    pub embedded_worker: bool,

    /// Upper bound for a single BOM import run
    #[serde(default = "default_job_timeout_secs")]
    pub job_timeout_secs: u64,

    /// Completed jobs older than this are purged by housekeeping
    #[serde(default = "default_job_retention_hours")]
    pub job_retention_hours: i64,

    #[serde(default = "default_worker_poll_interval_ms")]
    pub worker_poll_interval_ms: u64,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_job_timeout_secs() -> u64 {
    1800
}

fn default_job_retention_hours() -> i64 {
    72
}

fn default_worker_poll_interval_ms() -> u64 {
    1000
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    /// Redis URL required by the queue-backed modes.
    pub fn require_redis_url(&self) -> Result<&str, envy::Error> {
        self.redis_url
            .as_deref()
            .ok_or_else(|| envy::Error::MissingValue("redis_url"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_embedded_worker_needs_no_redis() {
        let config: AppConfig = envy::from_iter(vars(&[
            ("DATABASE_URL", "postgres://localhost/bom"),
            ("DEFAULT_COMPANY", "Acme Ltd"),
            ("EMBEDDED_WORKER", "true"),
        ]))
        .unwrap();

        assert!(config.embedded_worker);
        assert!(config.redis_url.is_none());
        assert!(config.require_redis_url().is_err());
        assert_eq!(config.job_timeout_secs, 1800);
        assert_eq!(config.job_retention_hours, 72);
    }

    #[test]
    fn test_redis_url_read_when_present() {
        let config: AppConfig = envy::from_iter(vars(&[
            ("DATABASE_URL", "postgres://localhost/bom"),
            ("DEFAULT_COMPANY", "Acme Ltd"),
            ("REDIS_URL", "redis://localhost:6379"),
        ]))
        .unwrap();

        assert!(!config.embedded_worker);
        assert_eq!(config.require_redis_url().unwrap(), "redis://localhost:6379");
    }
}
