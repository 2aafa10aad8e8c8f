//! Job-related API endpoints

use reqwest::multipart::{Form, Part};
use tracing::debug;
use uuid::Uuid;

use crate::BsubClient;
use crate::error::Result;
use bsub_core::domain::job::Job;
use bsub_core::dto::job::{CreateJob, JobFilter, JobList};

impl BsubClient {
    // =============================================================================
    // Job Lifecycle
    // =============================================================================

    /// Create a job, upload its input and submit it for processing
    ///
    /// The three calls are issued in order; the first failure aborts the
    /// sequence and is returned as-is.
    ///
    /// # Arguments
    /// * `job_type` - The job type (e.g., "pdf_extract")
    /// * `file_name` - Name the input is uploaded under
    /// * `data` - The input bytes
    ///
    /// # Returns
    /// The submitted job
    pub async fn create_and_submit(
        &self,
        job_type: &str,
        file_name: &str,
        data: Vec<u8>,
    ) -> Result<Job> {
        let response = self
            .post("/v1/jobs")
            .json(&CreateJob {
                job_type: job_type.to_string(),
            })
            .send()
            .await?;
        let job: Job = self.handle_data(response).await?;
        debug!("Created job {} ({})", job.id, job_type);

        let size = data.len();
        let form = Form::new().part("file", Part::bytes(data).file_name(file_name.to_string()));
        let response = self
            .post(&format!("/v1/jobs/{}/upload", job.id))
            .multipart(form)
            .send()
            .await?;
        self.handle_empty_response(response).await?;
        debug!("Uploaded {} bytes for job {}", size, job.id);

        let response = self
            .post(&format!("/v1/jobs/{}/submit", job.id))
            .send()
            .await?;
        self.handle_data(response).await
    }

    /// Get a job by ID
    pub async fn get_job(&self, job_id: Uuid) -> Result<Job> {
        let response = self.get(&format!("/v1/jobs/{}", job_id)).send().await?;

        self.handle_data(response).await
    }

    /// List jobs, newest first
    ///
    /// # Arguments
    /// * `filter` - Optional status filter and result limit
    pub async fn list_jobs(&self, filter: &JobFilter) -> Result<Vec<Job>> {
        let response = self.get("/v1/jobs").query(filter).send().await?;

        let list: JobList = self.handle_data(response).await?;
        Ok(list.jobs)
    }

    /// Cancel a pending or claimed job
    pub async fn cancel_job(&self, job_id: Uuid) -> Result<()> {
        let response = self
            .post(&format!("/v1/jobs/{}/cancel", job_id))
            .send()
            .await?;

        self.handle_empty_response(response).await
    }

    /// Delete a job and its stored data
    pub async fn delete_job(&self, job_id: Uuid) -> Result<()> {
        let response = self.delete(&format!("/v1/jobs/{}", job_id)).send().await?;

        self.handle_empty_response(response).await
    }

    // =============================================================================
    // Job Output
    // =============================================================================

    /// Get the output (stdout) of a job
    pub async fn get_job_output(&self, job_id: Uuid) -> Result<Vec<u8>> {
        let response = self
            .get(&format!("/v1/jobs/{}/output", job_id))
            .send()
            .await?;

        self.handle_bytes(response).await
    }

    /// Get the logs (stderr) of a job
    pub async fn get_job_logs(&self, job_id: Uuid) -> Result<Vec<u8>> {
        let response = self
            .get(&format!("/v1/jobs/{}/logs", job_id))
            .send()
            .await?;

        self.handle_bytes(response).await
    }
}
