use chrono::{DateTime, Utc};
use garde::Validate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::job::{DetectionJob, JobStatus};

/// Owner portion of an upload, validated before anything touches disk.
#[derive(Debug, Deserialize, Validate)]
pub struct SubmitRequest {
    #[garde(length(min = 1, max = 128))]
    pub owner_id: String,
}

/// Query string of the per-owner history endpoint.
#[derive(Debug, Deserialize, Validate)]
pub struct HistoryQuery {
    #[serde(rename = "userId")]
    #[garde(length(min = 1, max = 128))]
    pub user_id: Option<String>,
}

/// Response after uploading an asset for detection.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub video_id: Uuid,
    pub result: String,
    pub status: JobStatus,
    pub message: String,
}

/// Response for querying a job's verdict.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultResponse {
    pub video_id: Uuid,
    pub result: String,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

/// One row of an owner's detection history.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: Uuid,
    pub result: String,
    pub status: JobStatus,
    pub uploaded_at: DateTime<Utc>,
    pub asset_ref: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub processing_duration_ms: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub videos: Vec<HistoryEntry>,
}

impl From<&DetectionJob> for ResultResponse {
    fn from(job: &DetectionJob) -> Self {
        Self {
            video_id: job.id,
            result: job.wire_result(),
            status: job.status,
            error: job.error.clone(),
        }
    }
}

impl HistoryEntry {
    /// `uploads_prefix` is the URL prefix the asset directory is served under.
    pub fn from_job(job: &DetectionJob, uploads_prefix: &str) -> Self {
        Self {
            id: job.id,
            result: job.wire_result(),
            status: job.status,
            uploaded_at: job.created_at,
            asset_ref: job.asset_ref.clone(),
            url: format!("{}/{}", uploads_prefix.trim_end_matches('/'), job.asset_ref),
            processing_duration_ms: job.processing_duration_ms,
            error: job.error.clone(),
        }
    }
}
