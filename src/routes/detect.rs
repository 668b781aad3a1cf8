use axum::extract::{Multipart, Path, Query, State};
use axum::Json;
use garde::Validate;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::error::ServiceError;
use crate::models::detection::{
    HistoryEntry, HistoryQuery, HistoryResponse, ResultResponse, SubmitResponse,
};
use crate::models::job::JobStatus;
use crate::services::storage::{AssetUpload, UPLOADS_PREFIX};

/// Multipart part names accepted for the media payload.
const ASSET_FIELDS: [&str; 2] = ["video", "asset"];

/// POST /upload: Upload a video or image for deepfake detection.
pub async fn submit_detection(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<SubmitResponse>, ServiceError> {
    let mut upload: Option<AssetUpload> = None;
    let mut owner_id: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServiceError::InvalidRequest(e.body_text()))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some(name) if ASSET_FIELDS.contains(&name) => {
                let file_name = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ServiceError::InvalidRequest(e.body_text()))?;

                upload = Some(AssetUpload {
                    bytes: bytes.to_vec(),
                    file_name,
                    content_type,
                });
            }
            Some("userId") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ServiceError::InvalidRequest(e.body_text()))?;
                owner_id = Some(text);
            }
            _ => {}
        }
    }

    // Owner is checked before the payload so a missing id never touches disk.
    if owner_id.as_deref().map(str::trim).unwrap_or_default().is_empty() {
        return Err(ServiceError::InvalidRequest("userId is required".to_string()));
    }
    let upload = upload.ok_or_else(|| ServiceError::InvalidRequest("No video file uploaded".to_string()))?;

    let job = state.jobs.submit(owner_id.as_deref(), upload).await?;

    let message = match job.status {
        JobStatus::Pending => "Video accepted for detection",
        JobStatus::Completed => "Video processed and result saved",
        JobStatus::Failed => "Video processing failed",
    };

    Ok(Json(SubmitResponse {
        video_id: job.id,
        result: job.wire_result(),
        status: job.status,
        message: message.to_string(),
    }))
}

/// GET /video-result/{video_id}: Current verdict of a detection job.
pub async fn get_detection_result(
    State(state): State<AppState>,
    Path(video_id): Path<Uuid>,
) -> Result<Json<ResultResponse>, ServiceError> {
    let job = state.jobs.status(video_id).await?;
    Ok(Json(ResultResponse::from(&job)))
}

/// GET /api/videos/user?userId=: Detection history of one owner, newest first.
pub async fn list_owner_detections(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, ServiceError> {
    query
        .validate()
        .map_err(|e| ServiceError::InvalidRequest(format!("userId: {}", e)))?;
    let owner_id = query
        .user_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ServiceError::InvalidRequest("User ID is required".to_string()))?;

    let videos = state
        .jobs
        .history(owner_id)
        .await?
        .iter()
        .map(|job| HistoryEntry::from_job(job, UPLOADS_PREFIX))
        .collect();

    Ok(Json(HistoryResponse { videos }))
}
