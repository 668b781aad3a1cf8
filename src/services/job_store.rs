use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::job::{DetectionJob, JobStatus};

/// Durable table of detection jobs. The store is the only mutator of a job:
/// it creates it `Pending` and performs the single terminal transition.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a new job in `Pending` state.
    async fn create(&self, owner_id: &str, asset_ref: &str) -> Result<DetectionJob, StoreError>;

    /// Move a pending job to `Completed` with its verdict.
    async fn complete(&self, job_id: Uuid, verdict: &str, duration_ms: i64) -> Result<(), StoreError>;

    /// Move a pending job to `Failed` with an error summary.
    async fn fail(&self, job_id: Uuid, error: &str, duration_ms: i64) -> Result<(), StoreError>;

    async fn get(&self, job_id: Uuid) -> Result<Option<DetectionJob>, StoreError>;

    /// All jobs of one owner, newest first.
    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<DetectionJob>, StoreError>;

    /// Pending jobs, oldest first (startup recovery).
    async fn list_pending(&self, limit: i64) -> Result<Vec<DetectionJob>, StoreError>;

    /// Connectivity check for health reporting.
    async fn ping(&self) -> Result<(), StoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Job {0} not found")]
    NotFound(Uuid),

    #[error("Job {0} already reached a terminal state")]
    AlreadyTerminal(Uuid),

    #[error("Unknown job status in store: {0}")]
    InvalidStatus(String),
}

/// In-process store for development runs and tests.
#[derive(Default)]
pub struct MemoryJobStore {
    // Insertion order doubles as the creation-order tiebreaker.
    jobs: RwLock<Vec<DetectionJob>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn finish(
        &self,
        job_id: Uuid,
        status: JobStatus,
        verdict: Option<&str>,
        error: Option<&str>,
        duration_ms: i64,
    ) -> Result<(), StoreError> {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .iter_mut()
            .find(|j| j.id == job_id)
            .ok_or(StoreError::NotFound(job_id))?;

        if job.status.is_terminal() {
            return Err(StoreError::AlreadyTerminal(job_id));
        }

        job.status = status;
        job.verdict = verdict.map(str::to_string);
        job.error = error.map(str::to_string);
        job.processing_duration_ms = Some(duration_ms);
        job.completed_at = Some(Utc::now());
        Ok(())
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create(&self, owner_id: &str, asset_ref: &str) -> Result<DetectionJob, StoreError> {
        let job = DetectionJob {
            id: Uuid::new_v4(),
            owner_id: owner_id.to_string(),
            asset_ref: asset_ref.to_string(),
            status: JobStatus::Pending,
            verdict: None,
            error: None,
            processing_duration_ms: None,
            created_at: Utc::now(),
            completed_at: None,
        };
        self.jobs.write().await.push(job.clone());
        Ok(job)
    }

    async fn complete(&self, job_id: Uuid, verdict: &str, duration_ms: i64) -> Result<(), StoreError> {
        self.finish(job_id, JobStatus::Completed, Some(verdict), None, duration_ms)
            .await
    }

    async fn fail(&self, job_id: Uuid, error: &str, duration_ms: i64) -> Result<(), StoreError> {
        self.finish(job_id, JobStatus::Failed, None, Some(error), duration_ms)
            .await
    }

    async fn get(&self, job_id: Uuid) -> Result<Option<DetectionJob>, StoreError> {
        Ok(self.jobs.read().await.iter().find(|j| j.id == job_id).cloned())
    }

    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<DetectionJob>, StoreError> {
        let jobs = self.jobs.read().await;
        let mut owned: Vec<(usize, DetectionJob)> = jobs
            .iter()
            .enumerate()
            .filter(|(_, j)| j.owner_id == owner_id)
            .map(|(seq, j)| (seq, j.clone()))
            .collect();
        owned.sort_by(|(sa, a), (sb, b)| b.created_at.cmp(&a.created_at).then(sb.cmp(sa)));
        Ok(owned.into_iter().map(|(_, j)| j).collect())
    }

    async fn list_pending(&self, limit: i64) -> Result<Vec<DetectionJob>, StoreError> {
        let limit = usize::try_from(limit.max(0)).unwrap_or(usize::MAX);
        Ok(self
            .jobs
            .read()
            .await
            .iter()
            .filter(|j| j.status == JobStatus::Pending)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_starts_pending_without_verdict() {
        let store = MemoryJobStore::new();
        let job = store.create("u1", "a.mp4").await.unwrap();

        assert_eq!(job.status, JobStatus::Pending);
        assert!(job.verdict.is_none());
        assert_eq!(store.get(job.id).await.unwrap(), Some(job));
    }

    #[tokio::test]
    async fn test_complete_sets_verdict_and_duration() {
        let store = MemoryJobStore::new();
        let job = store.create("u1", "a.mp4").await.unwrap();

        store.complete(job.id, "此影片是真實影片", 1234).await.unwrap();

        let done = store.get(job.id).await.unwrap().unwrap();
        assert_eq!(done.status, JobStatus::Completed);
        assert_eq!(done.verdict.as_deref(), Some("此影片是真實影片"));
        assert_eq!(done.processing_duration_ms, Some(1234));
        assert!(done.completed_at.is_some());
        assert_eq!(done.created_at, job.created_at);
    }

    #[tokio::test]
    async fn test_terminal_transition_happens_once() {
        let store = MemoryJobStore::new();
        let job = store.create("u1", "a.mp4").await.unwrap();

        store.fail(job.id, "exit 1", 10).await.unwrap();
        let again = store.complete(job.id, "late verdict", 20).await;

        assert!(matches!(again, Err(StoreError::AlreadyTerminal(_))));
        let stored = store.get(job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Failed);
        assert_eq!(stored.error.as_deref(), Some("exit 1"));
        assert!(stored.verdict.is_none());
    }

    #[tokio::test]
    async fn test_unknown_job() {
        let store = MemoryJobStore::new();
        let id = Uuid::new_v4();

        assert!(store.get(id).await.unwrap().is_none());
        assert!(matches!(store.complete(id, "x", 0).await, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_by_owner_is_newest_first() {
        let store = MemoryJobStore::new();
        let first = store.create("u1", "1.mp4").await.unwrap();
        store.create("u2", "other.mp4").await.unwrap();
        let second = store.create("u1", "2.mp4").await.unwrap();
        let third = store.create("u1", "3.mp4").await.unwrap();

        let ids: Vec<Uuid> = store
            .list_by_owner("u1")
            .await
            .unwrap()
            .iter()
            .map(|j| j.id)
            .collect();

        assert_eq!(ids, vec![third.id, second.id, first.id]);
    }

    #[tokio::test]
    async fn test_list_pending_skips_terminal_jobs() {
        let store = MemoryJobStore::new();
        let a = store.create("u1", "a.mp4").await.unwrap();
        let b = store.create("u1", "b.mp4").await.unwrap();
        let c = store.create("u1", "c.mp4").await.unwrap();
        store.complete(b.id, "real", 1).await.unwrap();

        let pending: Vec<Uuid> = store.list_pending(10).await.unwrap().iter().map(|j| j.id).collect();
        assert_eq!(pending, vec![a.id, c.id]);
        assert_eq!(store.list_pending(1).await.unwrap().len(), 1);
    }
}
