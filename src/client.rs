//! HTTP client for the detection API, including the polling loop mobile
//! clients follow while a verdict is pending.

use reqwest::multipart;
use std::time::Duration;
use uuid::Uuid;

use crate::models::detection::{HistoryResponse, ResultResponse, SubmitResponse};

/// Interval between status queries while a job is pending.
pub const POLL_INTERVAL: Duration = Duration::from_secs(5);

pub struct DetectionClient {
    http: reqwest::Client,
    base_url: String,
    poll_interval: Duration,
}

impl DetectionClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            poll_interval: POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// POST /upload with the asset bytes and owner id.
    pub async fn upload(
        &self,
        owner_id: &str,
        file_name: &str,
        mime: &str,
        bytes: Vec<u8>,
    ) -> Result<SubmitResponse, ClientError> {
        let form = multipart::Form::new()
            .part(
                "video",
                multipart::Part::bytes(bytes)
                    .file_name(file_name.to_string())
                    .mime_str(mime)?,
            )
            .text("userId", owner_id.to_string());

        let response = self
            .http
            .post(format!("{}/upload", self.base_url))
            .multipart(form)
            .send()
            .await?;

        Self::json(response).await
    }

    /// GET /video-result/{video_id}
    pub async fn result(&self, video_id: Uuid) -> Result<ResultResponse, ClientError> {
        let response = self
            .http
            .get(format!("{}/video-result/{}", self.base_url, video_id))
            .send()
            .await?;

        Self::json(response).await
    }

    /// GET /api/videos/user?userId=
    pub async fn history(&self, owner_id: &str) -> Result<HistoryResponse, ClientError> {
        let response = self
            .http
            .get(format!("{}/api/videos/user", self.base_url))
            .query(&[("userId", owner_id)])
            .send()
            .await?;

        Self::json(response).await
    }

    /// Poll at a fixed interval, without an attempt limit, until the job reports
    /// a terminal status. Any transport or HTTP error ends the loop.
    pub async fn poll_until_terminal(&self, video_id: Uuid) -> Result<ResultResponse, ClientError> {
        let mut attempt: u64 = 0;
        loop {
            let status = self.result(video_id).await?;
            if status.status.is_terminal() {
                return Ok(status);
            }

            attempt += 1;
            tracing::debug!(video_id = %video_id, attempt, result = %status.result, "Verdict pending");
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn json<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T, ClientError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json::<T>().await?)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server answered {status}: {body}")]
    Status { status: u16, body: String },
}
