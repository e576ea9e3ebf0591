use async_trait::async_trait;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, error::TrySendError};
use uuid::Uuid;

const QUEUE_KEY: &str = "bom_import:jobs";
const PROCESSING_KEY: &str = "bom_import:processing";

/// Job payload handed to the worker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueuedJob {
    pub job_id: Uuid,
    pub document_reference: String,
}

/// Hands accepted jobs to whatever runs the BOM creation work.
#[async_trait]
pub trait JobDispatcher: Send + Sync {
    async fn dispatch(&self, job: &QueuedJob) -> Result<(), QueueError>;
}

/// Redis-backed async job queue.
pub struct JobQueue {
    client: redis::Client,
}

impl JobQueue {
    pub fn new(redis_url: &str) -> Result<Self, QueueError> {
        let client = redis::Client::open(redis_url).map_err(QueueError::Redis)?;
        Ok(Self { client })
    }

    /// Enqueue a BOM import job.
    pub async fn enqueue(&self, job: &QueuedJob) -> Result<(), QueueError> {
        let mut conn = self.client.get_multiplexed_async_connection().await.map_err(QueueError::Redis)?;
        let payload = serde_json::to_string(job).map_err(QueueError::Serialize)?;
        conn.lpush::<_, _, ()>(QUEUE_KEY, &payload)
            .await
            .map_err(QueueError::Redis)?;
        Ok(())
    }

    /// Dequeue a job for processing (pop with move to processing list).
    pub async fn dequeue(&self) -> Result<Option<QueuedJob>, QueueError> {
        let mut conn = self.client.get_multiplexed_async_connection().await.map_err(QueueError::Redis)?;
        let result: Option<String> = conn
            .rpoplpush(QUEUE_KEY, PROCESSING_KEY)
            .await
            .map_err(QueueError::Redis)?;

        match result {
            Some(payload) => {
                let job: QueuedJob = serde_json::from_str(&payload).map_err(QueueError::Serialize)?;
                Ok(Some(job))
            }
            None => Ok(None),
        }
    }

    /// Check Redis connectivity (for health checks).
    pub async fn health_check(&self) -> Result<(), QueueError> {
        let mut conn = self.client.get_multiplexed_async_connection().await.map_err(QueueError::Redis)?;
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map_err(QueueError::Redis)?;
        Ok(())
    }

    /// Get the current queue depth (pending jobs).
    pub async fn queue_depth(&self) -> Result<u64, QueueError> {
        let mut conn = self.client.get_multiplexed_async_connection().await.map_err(QueueError::Redis)?;
        let depth: u64 = conn.llen(QUEUE_KEY).await.map_err(QueueError::Redis)?;
        Ok(depth)
    }

    /// Remove a finished job from the processing list.
    pub async fn complete(&self, job: &QueuedJob) -> Result<(), QueueError> {
        let mut conn = self.client.get_multiplexed_async_connection().await.map_err(QueueError::Redis)?;
        let payload = serde_json::to_string(job).map_err(QueueError::Serialize)?;
        conn.lrem::<_, _, ()>(PROCESSING_KEY, 1, &payload)
            .await
            .map_err(QueueError::Redis)?;
        Ok(())
    }
}

#[async_trait]
impl JobDispatcher for JobQueue {
    async fn dispatch(&self, job: &QueuedJob) -> Result<(), QueueError> {
        self.enqueue(job).await
    }
}

/// Dispatcher feeding an in-process worker task. Never waits for room in the
/// channel: a full channel is reported as [`QueueError::Full`].
pub struct ChannelDispatcher {
    sender: mpsc::Sender<QueuedJob>,
}

impl ChannelDispatcher {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<QueuedJob>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl JobDispatcher for ChannelDispatcher {
    async fn dispatch(&self, job: &QueuedJob) -> Result<(), QueueError> {
        self.sender.try_send(job.clone()).map_err(|e| match e {
            TrySendError::Full(_) => QueueError::Full,
            TrySendError::Closed(_) => QueueError::Closed,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("worker channel closed")]
    Closed,

    #[error("worker channel is full")]
    Full,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_dispatcher_delivers_jobs() {
        let (dispatcher, mut receiver) = ChannelDispatcher::new(4);
        let job = QueuedJob {
            job_id: Uuid::new_v4(),
            document_reference: "doc-1".to_string(),
        };

        dispatcher.dispatch(&job).await.unwrap();
        assert_eq!(receiver.recv().await, Some(job));
    }

    #[tokio::test]
    async fn test_channel_dispatcher_fails_when_worker_gone() {
        let (dispatcher, receiver) = ChannelDispatcher::new(1);
        drop(receiver);

        let job = QueuedJob {
            job_id: Uuid::new_v4(),
            document_reference: "doc-1".to_string(),
        };
        assert!(matches!(dispatcher.dispatch(&job).await, Err(QueueError::Closed)));
    }

    #[tokio::test]
    async fn test_channel_dispatcher_rejects_when_full() {
        let (dispatcher, mut receiver) = ChannelDispatcher::new(1);
        let job = |reference: &str| QueuedJob {
            job_id: Uuid::new_v4(),
            document_reference: reference.to_string(),
        };

        dispatcher.dispatch(&job("doc-1")).await.unwrap();
        assert!(matches!(dispatcher.dispatch(&job("doc-2")).await, Err(QueueError::Full)));

        // Room frees up once the worker takes a job.
        receiver.recv().await.unwrap();
        dispatcher.dispatch(&job("doc-3")).await.unwrap();
    }
}
