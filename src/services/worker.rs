use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{AcquireError, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;
use uuid::Uuid;

use crate::error::ServiceError;
use crate::models::job::DetectionJob;
use crate::services::analyzer::{AnalysisError, Analyzer};
use crate::services::job_store::{JobStore, StoreError};
use crate::services::queue::{JobQueue, QueuedJob};
use crate::services::storage::AssetStore;
use crate::shutdown::ShutdownToken;

/// Pause before the single retry of a failed terminal write.
const TERMINAL_WRITE_RETRY_DELAY: Duration = Duration::from_millis(200);

/// Runs the analysis routine for one job and records its terminal state.
/// At most `capacity` analyses run at once.
pub struct JobProcessor {
    store: Arc<dyn JobStore>,
    assets: Arc<AssetStore>,
    analyzer: Arc<dyn Analyzer>,
    permits: Arc<Semaphore>,
    capacity: usize,
}

impl JobProcessor {
    pub fn new(
        store: Arc<dyn JobStore>,
        assets: Arc<AssetStore>,
        analyzer: Arc<dyn Analyzer>,
        capacity: usize,
    ) -> Self {
        let capacity = capacity.max(1);
        Self {
            store,
            assets,
            analyzer,
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Wait for a free analysis slot.
    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit, AcquireError> {
        self.permits.clone().acquire_owned().await
    }

    /// Process a job, waiting for a free slot first.
    pub async fn process(&self, job: &QueuedJob) -> Result<DetectionJob, ServiceError> {
        let permit = self
            .acquire()
            .await
            .map_err(|_| ServiceError::PoolClosed)?;
        self.process_with_permit(job, permit).await
    }

    /// Process a job in a slot the caller already holds.
    pub async fn process_with_permit(
        &self,
        job: &QueuedJob,
        _permit: OwnedSemaphorePermit,
    ) -> Result<DetectionJob, ServiceError> {
        let current = self
            .store
            .get(job.job_id)
            .await?
            .ok_or(ServiceError::NotFound(job.job_id))?;

        if current.status.is_terminal() {
            tracing::debug!(job_id = %job.job_id, status = %current.status, "Job already finished, skipping");
            return Ok(current);
        }

        tracing::info!(
            job_id = %job.job_id,
            asset_ref = %job.asset_ref,
            "Processing detection job"
        );

        let path = self.assets.resolve(&job.asset_ref);
        let start = Instant::now();
        let outcome = self.analyzer.analyze(&path).await;
        let elapsed = start.elapsed();
        let duration_ms = i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX);

        metrics::histogram!("detection_processing_seconds").record(elapsed.as_secs_f64());

        match &outcome {
            Ok(verdict) => tracing::info!(
                job_id = %job.job_id,
                duration_ms = duration_ms,
                verdict = %verdict,
                "Analysis complete"
            ),
            Err(e) => tracing::warn!(
                job_id = %job.job_id,
                duration_ms = duration_ms,
                process_error = e.is_process_error(),
                error = %e,
                "Analysis failed"
            ),
        }

        let mut written = self.record(job.job_id, &outcome, duration_ms).await;
        let retry = match &written {
            Ok(()) | Err(StoreError::AlreadyTerminal(_)) => false,
            Err(e) => {
                tracing::warn!(job_id = %job.job_id, error = %e, "Terminal write failed, retrying once");
                true
            }
        };
        if retry {
            tokio::time::sleep(TERMINAL_WRITE_RETRY_DELAY).await;
            written = self.record(job.job_id, &outcome, duration_ms).await;
        }

        match written {
            Ok(()) if outcome.is_ok() => metrics::counter!("detection_jobs_completed").increment(1),
            Ok(()) => metrics::counter!("detection_jobs_failed").increment(1),
            Err(StoreError::AlreadyTerminal(id)) => {
                tracing::debug!(job_id = %id, "Job finished concurrently, result discarded");
            }
            Err(e) => return Err(e.into()),
        }

        self.store
            .get(job.job_id)
            .await?
            .ok_or(ServiceError::NotFound(job.job_id))
    }

    async fn record(
        &self,
        job_id: Uuid,
        outcome: &Result<String, AnalysisError>,
        duration_ms: i64,
    ) -> Result<(), StoreError> {
        match outcome {
            Ok(verdict) => self.store.complete(job_id, verdict, duration_ms).await,
            Err(e) => self.store.fail(job_id, &e.to_string(), duration_ms).await,
        }
    }
}

/// Queue-draining loop feeding the bounded analysis pool.
pub struct Worker {
    queue: Arc<dyn JobQueue>,
    processor: Arc<JobProcessor>,
    poll_interval: Duration,
}

impl Worker {
    pub fn new(queue: Arc<dyn JobQueue>, processor: Arc<JobProcessor>, poll_interval: Duration) -> Self {
        Self {
            queue,
            processor,
            poll_interval,
        }
    }

    /// Run until shutdown is requested, then wait for in-flight jobs.
    pub async fn run(self, mut shutdown: ShutdownToken) {
        tracing::info!(
            capacity = self.processor.capacity(),
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            "Worker started"
        );

        let mut in_flight = JoinSet::new();

        loop {
            while let Some(done) = in_flight.try_join_next() {
                if let Err(e) = done {
                    tracing::error!(error = %e, "Job task panicked");
                }
            }

            if shutdown.is_shutdown() {
                break;
            }

            // Backpressure: nothing is dequeued until a slot is free.
            let permit = tokio::select! {
                permit = self.processor.acquire() => match permit {
                    Ok(p) => p,
                    Err(_) => break,
                },
                _ = shutdown.wait() => break,
            };

            match self.queue.dequeue().await {
                Ok(Some(job)) => {
                    if let Ok(depth) = self.queue.depth().await {
                        metrics::gauge!("detection_queue_depth").set(depth as f64);
                    }

                    let processor = self.processor.clone();
                    let queue = self.queue.clone();
                    in_flight.spawn(async move {
                        match processor.process_with_permit(&job, permit).await {
                            Ok(_) => {}
                            Err(ServiceError::NotFound(id)) => {
                                tracing::warn!(job_id = %id, "Queued job has no record, dropping it");
                            }
                            Err(e) => {
                                // Unacknowledged entries stay on the processing list;
                                // the job is still pending for startup recovery.
                                tracing::error!(job_id = %job.job_id, error = %e, "Failed to record job outcome, leaving it unacknowledged");
                                return;
                            }
                        }
                        if let Err(e) = queue.complete(&job).await {
                            tracing::error!(job_id = %job.job_id, error = %e, "Failed to acknowledge job");
                        }
                    });
                }
                Ok(None) => {
                    drop(permit);
                    tracing::trace!("No jobs available, sleeping");
                    self.idle(&mut shutdown).await;
                }
                Err(e) => {
                    drop(permit);
                    tracing::error!(error = %e, "Error dequeuing job, will retry");
                    self.idle(&mut shutdown).await;
                }
            }
        }

        tracing::info!(in_flight = in_flight.len(), "Worker stopping, draining in-flight jobs");
        while let Some(done) = in_flight.join_next().await {
            if let Err(e) = done {
                tracing::error!(error = %e, "Job task panicked");
            }
        }
        tracing::info!("Worker stopped");
    }

    async fn idle(&self, shutdown: &mut ShutdownToken) {
        tokio::select! {
            _ = tokio::time::sleep(self.poll_interval) => {}
            _ = shutdown.wait() => {}
        }
    }
}
