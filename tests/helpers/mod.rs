//! Test helper utilities: isolated pipeline instances and an in-process server

#![allow(dead_code)]

use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio::task::JoinHandle;
use uuid::Uuid;

use whoru_detect::{
    app_state::AppState,
    models::job::DetectionJob,
    routes,
    services::{
        analyzer::ProcessAnalyzer,
        job_service::SubmitMode,
        job_store::MemoryJobStore,
        queue::MemoryJobQueue,
        storage::{AssetStore, AssetUpload},
        worker::Worker,
    },
    shutdown::{shutdown_channel, ShutdownSender},
};

pub const TEST_MAX_UPLOAD_BYTES: usize = 8 * 1024 * 1024;

/// One isolated pipeline: memory store and queue, temp asset directory,
/// and a `sh -c` stand-in for the analysis routine.
pub struct TestApp {
    pub state: AppState,
    pub dir: TempDir,
    shutdown: ShutdownSender,
    worker: Option<JoinHandle<()>>,
}

impl TestApp {
    pub async fn new(script: &str, mode: SubmitMode) -> Self {
        Self::with_options(script, mode, 1, Duration::from_secs(10)).await
    }

    pub async fn with_options(
        script: &str,
        mode: SubmitMode,
        capacity: usize,
        deadline: Duration,
    ) -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let assets = Arc::new(AssetStore::open(dir.path()).await.expect("open asset dir"));
        let analyzer = Arc::new(sh_analyzer(script, deadline));

        let state = AppState::new(
            Arc::new(MemoryJobStore::new()),
            Arc::new(MemoryJobQueue::new()),
            assets,
            analyzer,
            capacity,
            mode,
        );

        let (shutdown, _) = shutdown_channel();
        Self {
            state,
            dir,
            shutdown,
            worker: None,
        }
    }

    /// Start a worker draining this app's queue.
    pub fn start_worker(&mut self) {
        let (shutdown, token) = shutdown_channel();
        let worker = Worker::new(
            self.state.queue.clone(),
            self.state.jobs.processor(),
            Duration::from_millis(10),
        );
        self.worker = Some(tokio::spawn(worker.run(token)));
        self.shutdown = shutdown;
    }

    pub async fn stop_worker(&mut self) {
        self.shutdown.shutdown();
        if let Some(handle) = self.worker.take() {
            handle.await.expect("worker task");
        }
    }

    /// Serve the router on an ephemeral local port; returns the base URL.
    pub async fn serve(&self) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let addr = listener.local_addr().expect("local addr");
        let app = routes::router(self.state.clone(), TEST_MAX_UPLOAD_BYTES);

        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("test server");
        });

        format!("http://{}", addr)
    }

    /// Poll the store until the job leaves `Pending`.
    pub async fn wait_for_terminal(&self, job_id: Uuid) -> DetectionJob {
        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            let job = self.state.jobs.status(job_id).await.expect("job exists");
            if job.status.is_terminal() {
                return job;
            }
            assert!(
                Instant::now() < deadline,
                "job {} did not reach a terminal state",
                job_id
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    pub fn stored_asset_count(&self) -> usize {
        std::fs::read_dir(self.dir.path()).expect("read asset dir").count()
    }
}

pub fn sh_analyzer(script: &str, deadline: Duration) -> ProcessAnalyzer {
    ProcessAnalyzer::new(
        "sh",
        vec!["-c".to_string(), script.to_string(), "analyzer".to_string()],
        deadline,
    )
}

pub fn upload(bytes: Vec<u8>, file_name: &str, mime: &str) -> AssetUpload {
    AssetUpload {
        bytes,
        file_name: Some(file_name.to_string()),
        content_type: Some(mime.to_string()),
    }
}
