//! Job domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Job record as reported by the service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    #[serde(rename = "type", default)]
    pub job_type: Option<String>,
    #[serde(default, deserialize_with = "nullable_status")]
    pub status: JobStatus,
    #[serde(default)]
    pub data_size: Option<u64>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub claimed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub claimed_by: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl Job {
    /// Server-supplied error message, ignoring empty strings
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref().filter(|m| !m.is_empty())
    }
}

fn nullable_status<'de, D>(deserializer: D) -> Result<JobStatus, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<JobStatus>::deserialize(deserializer)?.unwrap_or_default())
}

/// Job processing status
///
/// `Unknown` is used when the service omits the field or sends a value
/// this client does not recognise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Claimed,
    Finished,
    Failed,
    #[default]
    #[serde(other)]
    Unknown,
}

impl JobStatus {
    /// Whether no further transition can occur from this status
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Finished | JobStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Claimed => "claimed",
            JobStatus::Finished => "finished",
            JobStatus::Failed => "failed",
            JobStatus::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(JobStatus::Pending),
            "claimed" => Ok(JobStatus::Claimed),
            "finished" => Ok(JobStatus::Finished),
            "failed" => Ok(JobStatus::Failed),
            other => Err(format!(
                "unknown job status '{}' (expected pending, claimed, finished or failed)",
                other
            )),
        }
    }
}

/// Caller-owned reference to a submitted job
///
/// The identifier never changes; the status is the last one observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle {
    id: Uuid,
    pub status: JobStatus,
}

impl JobHandle {
    pub fn new(id: Uuid, status: JobStatus) -> Self {
        Self { id, status }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl From<&Job> for JobHandle {
    fn from(job: &Job) -> Self {
        Self::new(job.id, job.status)
    }
}

/// A job type offered by the service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobType {
    #[serde(rename = "type", default)]
    pub name: String,
    /// MIME types the worker accepts
    #[serde(default)]
    pub mime: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Server version information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerVersion {
    #[serde(default)]
    pub version: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_from_str() {
        assert_eq!("Claimed".parse::<JobStatus>(), Ok(JobStatus::Claimed));
        assert!("unknown".parse::<JobStatus>().is_err());
    }

    #[test]
    fn test_missing_status_decodes_as_unknown() {
        let job: Job =
            serde_json::from_str(r#"{"id":"7f1c9a3e-2b4d-4c8e-9f10-1a2b3c4d5e6f"}"#).unwrap();
        assert_eq!(job.status, JobStatus::Unknown);
        assert!(!job.status.is_terminal());
    }

    #[test]
    fn test_unrecognised_status_decodes_as_unknown() {
        let job: Job = serde_json::from_str(
            r#"{"id":"7f1c9a3e-2b4d-4c8e-9f10-1a2b3c4d5e6f","status":"archived"}"#,
        )
        .unwrap();
        assert_eq!(job.status, JobStatus::Unknown);
    }

    #[test]
    fn test_null_status_decodes_as_unknown() {
        let job: Job = serde_json::from_str(
            r#"{"id":"7f1c9a3e-2b4d-4c8e-9f10-1a2b3c4d5e6f","status":null}"#,
        )
        .unwrap();
        assert_eq!(job.status, JobStatus::Unknown);
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(JobStatus::Finished.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Claimed.is_terminal());
    }

    #[test]
    fn test_empty_error_message_is_ignored() {
        let job: Job = serde_json::from_str(
            r#"{"id":"7f1c9a3e-2b4d-4c8e-9f10-1a2b3c4d5e6f","status":"failed","error_message":""}"#,
        )
        .unwrap();
        assert_eq!(job.error_message(), None);
    }
}
