use async_trait::async_trait;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tokio::sync::Mutex;
use uuid::Uuid;

const QUEUE_KEY: &str = "whoru_detect:jobs";
const PROCESSING_KEY: &str = "whoru_detect:processing";

/// Job payload handed from the submitting side to the workers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueuedJob {
    pub job_id: Uuid,
    pub asset_ref: String,
}

/// FIFO of jobs waiting for analysis.
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue(&self, job: &QueuedJob) -> Result<(), QueueError>;

    /// Take the next job, if any, without blocking.
    async fn dequeue(&self) -> Result<Option<QueuedJob>, QueueError>;

    /// Acknowledge a dequeued job once its terminal state is stored.
    async fn complete(&self, job: &QueuedJob) -> Result<(), QueueError>;

    /// Number of jobs waiting to be dequeued.
    async fn depth(&self) -> Result<u64, QueueError>;

    async fn health_check(&self) -> Result<(), QueueError>;
}

/// Redis-backed queue shared between the server and standalone workers.
pub struct RedisJobQueue {
    client: redis::Client,
}

impl RedisJobQueue {
    pub fn new(redis_url: &str) -> Result<Self, QueueError> {
        let client = redis::Client::open(redis_url).map_err(QueueError::Redis)?;
        Ok(Self { client })
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection, QueueError> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(QueueError::Redis)
    }
}

#[async_trait]
impl JobQueue for RedisJobQueue {
    async fn enqueue(&self, job: &QueuedJob) -> Result<(), QueueError> {
        let mut conn = self.connection().await?;
        let payload = serde_json::to_string(job).map_err(QueueError::Serialize)?;
        conn.lpush::<_, _, ()>(QUEUE_KEY, &payload)
            .await
            .map_err(QueueError::Redis)?;
        Ok(())
    }

    /// Pops the oldest job and parks it on the processing list until acknowledged.
    async fn dequeue(&self) -> Result<Option<QueuedJob>, QueueError> {
        let mut conn = self.connection().await?;
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

    async fn complete(&self, job: &QueuedJob) -> Result<(), QueueError> {
        let mut conn = self.connection().await?;
        let payload = serde_json::to_string(job).map_err(QueueError::Serialize)?;
        conn.lrem::<_, _, ()>(PROCESSING_KEY, 1, &payload)
            .await
            .map_err(QueueError::Redis)?;
        Ok(())
    }

    async fn depth(&self) -> Result<u64, QueueError> {
        let mut conn = self.connection().await?;
        let depth: u64 = conn.llen(QUEUE_KEY).await.map_err(QueueError::Redis)?;
        Ok(depth)
    }

    async fn health_check(&self) -> Result<(), QueueError> {
        let mut conn = self.connection().await?;
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map_err(QueueError::Redis)?;
        Ok(())
    }
}

/// In-process queue drained by the server's embedded worker.
#[derive(Default)]
pub struct MemoryJobQueue {
    jobs: Mutex<VecDeque<QueuedJob>>,
}

impl MemoryJobQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobQueue for MemoryJobQueue {
    async fn enqueue(&self, job: &QueuedJob) -> Result<(), QueueError> {
        self.jobs.lock().await.push_back(job.clone());
        Ok(())
    }

    async fn dequeue(&self) -> Result<Option<QueuedJob>, QueueError> {
        Ok(self.jobs.lock().await.pop_front())
    }

    async fn complete(&self, _job: &QueuedJob) -> Result<(), QueueError> {
        Ok(())
    }

    async fn depth(&self) -> Result<u64, QueueError> {
        Ok(self.jobs.lock().await.len() as u64)
    }

    async fn health_check(&self) -> Result<(), QueueError> {
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
