use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::services::job_service::SubmitMode;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:3000").
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// PostgreSQL connection string. Jobs are kept in memory when unset.
    #[serde(default)]
    pub database_url: Option<String>,

    #[serde(default = "default_database_max_connections")]
    pub database_max_connections: u32,

    #[serde(default = "default_database_min_connections")]
    pub database_min_connections: u32,

    /// Redis connection string for the shared job queue. An in-process
    /// queue is used when unset.
    #[serde(default)]
    pub redis_url: Option<String>,

    /// Flat directory uploaded assets are written to.
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,

    /// Executable of the analysis routine.
    #[serde(default = "default_analyzer_program")]
    pub analyzer_program: String,

    /// Leading arguments; the asset path is appended after them.
    #[serde(default = "default_analyzer_args")]
    pub analyzer_args: Vec<String>,

    /// Deadline for one analysis run, after which the routine is killed.
    #[serde(default = "default_analyzer_timeout_secs")]
    pub analyzer_timeout_secs: u64,

    /// Number of analyses allowed to run at the same time.
    #[serde(default = "default_analysis_concurrency")]
    pub analysis_concurrency: usize,

    #[serde(default = "default_worker_poll_interval_ms")]
    pub worker_poll_interval_ms: u64,

    /// Run a worker inside the server process.
    #[serde(default = "default_true")]
    pub embedded_worker: bool,

    /// Analyze inside the upload request and answer with the verdict.
    #[serde(default)]
    pub inline_submit: bool,

    /// Upper bound on an upload request body.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,

    /// Maximum number of pending jobs re-enqueued at startup.
    #[serde(default = "default_recovery_batch")]
    pub recovery_batch: i64,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_database_max_connections() -> u32 {
    10
}

fn default_database_min_connections() -> u32 {
    1
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("uploads")
}

fn default_analyzer_program() -> String {
    "python".to_string()
}

fn default_analyzer_args() -> Vec<String> {
    vec!["use.py".to_string(), "-i".to_string()]
}

fn default_analyzer_timeout_secs() -> u64 {
    600
}

fn default_analysis_concurrency() -> usize {
    1
}

fn default_worker_poll_interval_ms() -> u64 {
    1000
}

fn default_true() -> bool {
    true
}

fn default_max_upload_bytes() -> usize {
    200 * 1024 * 1024
}

fn default_recovery_batch() -> i64 {
    1000
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    pub fn analyzer_timeout(&self) -> Duration {
        Duration::from_secs(self.analyzer_timeout_secs)
    }

    pub fn worker_poll_interval(&self) -> Duration {
        Duration::from_millis(self.worker_poll_interval_ms)
    }

    pub fn submit_mode(&self) -> SubmitMode {
        if self.inline_submit {
            SubmitMode::Inline
        } else {
            SubmitMode::Queued
        }
    }
}
