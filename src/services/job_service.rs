use garde::Validate;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::ServiceError;
use crate::models::detection::SubmitRequest;
use crate::models::job::DetectionJob;
use crate::services::job_store::JobStore;
use crate::services::queue::{JobQueue, QueuedJob};
use crate::services::storage::{AssetStore, AssetUpload};
use crate::services::worker::JobProcessor;

/// How a submission reaches the analysis routine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitMode {
    /// Enqueue and return `Pending` immediately; a worker finishes the job.
    Queued,
    /// Run the analysis inside the submitting request and return the verdict.
    Inline,
}

/// Orchestrates ingestion, job records, dispatch and lookups.
pub struct JobService {
    store: Arc<dyn JobStore>,
    queue: Arc<dyn JobQueue>,
    assets: Arc<AssetStore>,
    processor: Arc<JobProcessor>,
    mode: SubmitMode,
}

impl JobService {
    pub fn new(
        store: Arc<dyn JobStore>,
        queue: Arc<dyn JobQueue>,
        assets: Arc<AssetStore>,
        processor: Arc<JobProcessor>,
        mode: SubmitMode,
    ) -> Self {
        Self {
            store,
            queue,
            assets,
            processor,
            mode,
        }
    }

    pub fn mode(&self) -> SubmitMode {
        self.mode
    }

    pub fn processor(&self) -> Arc<JobProcessor> {
        self.processor.clone()
    }

    /// Accept an upload for `owner_id` and dispatch it for analysis.
    ///
    /// Nothing is written when the owner is missing. When the job record
    /// cannot be created the stored asset is removed again.
    pub async fn submit(
        &self,
        owner_id: Option<&str>,
        upload: AssetUpload,
    ) -> Result<DetectionJob, ServiceError> {
        let request = SubmitRequest {
            owner_id: owner_id.map(str::trim).unwrap_or_default().to_string(),
        };
        request
            .validate()
            .map_err(|e| ServiceError::InvalidRequest(format!("userId: {}", e)))?;
        let owner_id = request.owner_id.as_str();

        let asset_ref = self.assets.ingest(owner_id, &upload).await?;

        let job = match self.store.create(owner_id, &asset_ref).await {
            Ok(job) => job,
            Err(e) => {
                if let Err(cleanup) = self.assets.remove(&asset_ref).await {
                    tracing::warn!(asset_ref = %asset_ref, error = %cleanup, "Failed to remove orphaned asset");
                }
                return Err(e.into());
            }
        };

        metrics::counter!("detection_jobs_total").increment(1);
        tracing::info!(
            job_id = %job.id,
            owner_id = %owner_id,
            asset_ref = %asset_ref,
            mode = ?self.mode,
            "Detection job created"
        );

        let queued = QueuedJob {
            job_id: job.id,
            asset_ref,
        };

        match self.mode {
            SubmitMode::Inline => {
                // Detached so a dropped request cannot cancel the job mid-analysis.
                let processor = self.processor.clone();
                tokio::spawn(async move { processor.process(&queued).await }).await?
            }
            SubmitMode::Queued => {
                if let Err(e) = self.queue.enqueue(&queued).await {
                    // A job nobody will pick up must not stay pending forever.
                    self.store
                        .fail(job.id, &format!("Job could not be queued: {}", e), 0)
                        .await?;
                    metrics::counter!("detection_jobs_failed").increment(1);
                    return Err(e.into());
                }
                Ok(job)
            }
        }
    }

    /// Current state of a job. Never mutates it.
    pub async fn status(&self, job_id: Uuid) -> Result<DetectionJob, ServiceError> {
        self.store
            .get(job_id)
            .await?
            .ok_or(ServiceError::NotFound(job_id))
    }

    /// Jobs submitted by `owner_id`, newest first.
    pub async fn history(&self, owner_id: &str) -> Result<Vec<DetectionJob>, ServiceError> {
        Ok(self.store.list_by_owner(owner_id).await?)
    }

    /// Re-enqueue jobs left `Pending` by a previous process.
    pub async fn recover_pending(&self, limit: i64) -> Result<usize, ServiceError> {
        let pending = self.store.list_pending(limit).await?;
        for job in &pending {
            self.queue
                .enqueue(&QueuedJob {
                    job_id: job.id,
                    asset_ref: job.asset_ref.clone(),
                })
                .await?;
        }

        if !pending.is_empty() {
            tracing::info!(recovered = pending.len(), "Re-enqueued pending jobs");
        }
        Ok(pending.len())
    }
}
