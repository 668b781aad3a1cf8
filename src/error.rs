use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use uuid::Uuid;

use crate::services::job_store::StoreError;
use crate::services::queue::QueueError;
use crate::services::storage::IngestError;

/// Errors surfaced by the job service to its callers.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Unsupported media: {0}")]
    UnsupportedMedia(String),

    #[error("Asset storage unavailable: {0}")]
    StorageUnavailable(std::io::Error),

    #[error("Job {0} not found")]
    NotFound(Uuid),

    #[error("Job store failure: {0}")]
    Persistence(#[from] StoreError),

    #[error("Job queue unavailable: {0}")]
    QueueUnavailable(#[from] QueueError),

    #[error("Analysis pool is shut down")]
    PoolClosed,

    #[error("Analysis task aborted: {0}")]
    TaskAborted(#[from] tokio::task::JoinError),
}

impl From<IngestError> for ServiceError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::MissingOwner => ServiceError::InvalidRequest("userId is required".to_string()),
            IngestError::EmptyPayload => ServiceError::InvalidRequest("Uploaded asset is empty".to_string()),
            IngestError::UnsupportedMedia(what) => ServiceError::UnsupportedMedia(what),
            IngestError::Io(e) => ServiceError::StorageUnavailable(e),
        }
    }
}

impl ServiceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ServiceError::UnsupportedMedia(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ServiceError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Persistence(StoreError::NotFound(_)) => StatusCode::NOT_FOUND,
            ServiceError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServiceError::QueueUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ServiceError::PoolClosed => StatusCode::SERVICE_UNAVAILABLE,
            ServiceError::TaskAborted(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, "Request rejected");
        }

        // Internal details stay in the logs.
        let message = match &self {
            ServiceError::Persistence(_) | ServiceError::TaskAborted(_) => {
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
