use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Literal marker the wire format uses for a job that has no answer yet.
pub const PENDING_SENTINEL: &str = "Pending";

/// Literal marker the wire format uses for a job whose analysis failed.
pub const FAILED_SENTINEL: &str = "Failed";

/// Lifecycle state of a detection job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, EnumString, Display, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, JobStatus::Pending)
    }
}

/// One request to analyze a single uploaded asset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DetectionJob {
    pub id: Uuid,
    pub owner_id: String,
    pub asset_ref: String,
    pub status: JobStatus,
    pub verdict: Option<String>,
    pub error: Option<String>,
    pub processing_duration_ms: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl DetectionJob {
    /// The `result` string exposed to clients: the sentinel while pending,
    /// the verdict once completed, the failure marker otherwise.
    pub fn wire_result(&self) -> String {
        match self.status {
            JobStatus::Pending => PENDING_SENTINEL.to_string(),
            JobStatus::Completed => self
                .verdict
                .clone()
                .unwrap_or_else(|| FAILED_SENTINEL.to_string()),
            JobStatus::Failed => FAILED_SENTINEL.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(status: JobStatus, verdict: Option<&str>) -> DetectionJob {
        DetectionJob {
            id: Uuid::new_v4(),
            owner_id: "u1".to_string(),
            asset_ref: "1700000000000-abcd1234-video.mp4".to_string(),
            status,
            verdict: verdict.map(str::to_string),
            error: None,
            processing_duration_ms: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    #[test]
    fn test_pending_job_reports_sentinel() {
        assert_eq!(job(JobStatus::Pending, None).wire_result(), "Pending");
    }

    #[test]
    fn test_completed_job_reports_verdict() {
        let j = job(JobStatus::Completed, Some("此影片是真實影片"));
        assert_eq!(j.wire_result(), "此影片是真實影片");
    }

    #[test]
    fn test_failed_job_reports_failure_marker() {
        assert_eq!(job(JobStatus::Failed, None).wire_result(), "Failed");
    }

    #[test]
    fn test_status_round_trips_through_database_text() {
        assert_eq!(JobStatus::Completed.to_string(), "completed");
        assert_eq!("failed".parse::<JobStatus>().unwrap(), JobStatus::Failed);
        assert!("processing".parse::<JobStatus>().is_err());
        assert!(!JobStatus::Pending.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }
}
