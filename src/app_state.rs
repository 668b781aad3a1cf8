use std::sync::Arc;

use crate::config::AppConfig;
use crate::db::{self, queries::PgJobStore};
use crate::services::{
    analyzer::{Analyzer, ProcessAnalyzer},
    job_service::{JobService, SubmitMode},
    job_store::{JobStore, MemoryJobStore},
    queue::{JobQueue, MemoryJobQueue, QueueError, RedisJobQueue},
    storage::{AssetStore, IngestError},
    worker::{JobProcessor, Worker},
};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub jobs: Arc<JobService>,
    pub store: Arc<dyn JobStore>,
    pub queue: Arc<dyn JobQueue>,
    pub assets: Arc<AssetStore>,
}

impl AppState {
    /// Wire the pipeline from already constructed collaborators.
    pub fn new(
        store: Arc<dyn JobStore>,
        queue: Arc<dyn JobQueue>,
        assets: Arc<AssetStore>,
        analyzer: Arc<dyn Analyzer>,
        analysis_concurrency: usize,
        mode: SubmitMode,
    ) -> Self {
        let processor = Arc::new(JobProcessor::new(
            store.clone(),
            assets.clone(),
            analyzer,
            analysis_concurrency,
        ));
        let jobs = Arc::new(JobService::new(
            store.clone(),
            queue.clone(),
            assets.clone(),
            processor,
            mode,
        ));

        Self {
            jobs,
            store,
            queue,
            assets,
        }
    }

    /// Connect every backend named by the configuration.
    pub async fn from_config(config: &AppConfig) -> Result<Self, BootstrapError> {
        let store: Arc<dyn JobStore> = match &config.database_url {
            Some(url) => {
                tracing::info!("Connecting to PostgreSQL database");
                let pool = db::init_pool(
                    url,
                    config.database_max_connections,
                    config.database_min_connections,
                )
                .await?;
                tracing::info!("Running database migrations");
                db::run_migrations(&pool).await?;
                Arc::new(PgJobStore::new(pool))
            }
            None => {
                tracing::warn!("DATABASE_URL not set, jobs are kept in memory only");
                Arc::new(MemoryJobStore::new())
            }
        };

        let queue: Arc<dyn JobQueue> = match &config.redis_url {
            Some(url) => {
                tracing::info!("Connecting to Redis job queue");
                Arc::new(RedisJobQueue::new(url)?)
            }
            None => {
                tracing::info!("REDIS_URL not set, using in-process job queue");
                Arc::new(MemoryJobQueue::new())
            }
        };

        tracing::info!(upload_dir = %config.upload_dir.display(), "Opening asset directory");
        let assets = Arc::new(AssetStore::open(&config.upload_dir).await?);

        let analyzer = Arc::new(ProcessAnalyzer::new(
            config.analyzer_program.clone(),
            config.analyzer_args.clone(),
            config.analyzer_timeout(),
        ));

        Ok(Self::new(
            store,
            queue,
            assets,
            analyzer,
            config.analysis_concurrency,
            config.submit_mode(),
        ))
    }

    /// Worker draining this state's queue through its analysis pool.
    pub fn worker(&self, config: &AppConfig) -> Worker {
        Worker::new(
            self.queue.clone(),
            self.jobs.processor(),
            config.worker_poll_interval(),
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error("Database initialization failed: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Job queue initialization failed: {0}")]
    Queue(#[from] QueueError),

    #[error("Asset directory unavailable: {0}")]
    Assets(#[from] IngestError),
}
