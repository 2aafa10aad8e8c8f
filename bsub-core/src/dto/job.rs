//! Job DTOs

use serde::{Deserialize, Serialize};

use crate::domain::job::{Job, JobStatus, JobType};

/// `{ "data": ... }` wrapper used by every job endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub data: Option<T>,
}

/// Request to create a new job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateJob {
    #[serde(rename = "type")]
    pub job_type: String,
}

/// Payload of the job listing endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobList {
    #[serde(default)]
    pub jobs: Vec<Job>,
}

/// Payload of the job type listing endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeList {
    #[serde(default)]
    pub types: Vec<JobType>,
}

/// Query parameters for listing jobs
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<JobStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}
