//! Remote job service abstraction
//!
//! Controllers depend on this trait rather than on [`BsubClient`] so tests can
//! substitute an in-memory service.

use async_trait::async_trait;
use uuid::Uuid;

use crate::BsubClient;
use crate::error::Result;
use bsub_core::domain::job::{Job, JobType, ServerVersion};
use bsub_core::dto::job::JobFilter;

/// Operations offered by the remote job service
#[async_trait]
pub trait JobService: Send + Sync {
    /// Create, upload and submit a job in one step
    async fn create_and_submit(
        &self,
        job_type: &str,
        file_name: &str,
        data: Vec<u8>,
    ) -> Result<Job>;

    /// Fetch the current state of a job
    async fn get_job(&self, job_id: Uuid) -> Result<Job>;

    /// Fetch the output of a job
    async fn get_output(&self, job_id: Uuid) -> Result<Vec<u8>>;

    /// Fetch the logs of a job
    async fn get_logs(&self, job_id: Uuid) -> Result<Vec<u8>>;

    /// List jobs matching a filter
    async fn list_jobs(&self, filter: &JobFilter) -> Result<Vec<Job>>;

    /// Cancel a job
    async fn cancel_job(&self, job_id: Uuid) -> Result<()>;

    /// Delete a job
    async fn delete_job(&self, job_id: Uuid) -> Result<()>;

    /// List available job types
    async fn list_types(&self) -> Result<Vec<JobType>>;

    /// Get the server version
    async fn server_version(&self) -> Result<ServerVersion>;
}

#[async_trait]
impl JobService for BsubClient {
    async fn create_and_submit(
        &self,
        job_type: &str,
        file_name: &str,
        data: Vec<u8>,
    ) -> Result<Job> {
        BsubClient::create_and_submit(self, job_type, file_name, data).await
    }

    async fn get_job(&self, job_id: Uuid) -> Result<Job> {
        BsubClient::get_job(self, job_id).await
    }

    async fn get_output(&self, job_id: Uuid) -> Result<Vec<u8>> {
        self.get_job_output(job_id).await
    }

    async fn get_logs(&self, job_id: Uuid) -> Result<Vec<u8>> {
        self.get_job_logs(job_id).await
    }

    async fn list_jobs(&self, filter: &JobFilter) -> Result<Vec<Job>> {
        BsubClient::list_jobs(self, filter).await
    }

    async fn cancel_job(&self, job_id: Uuid) -> Result<()> {
        BsubClient::cancel_job(self, job_id).await
    }

    async fn delete_job(&self, job_id: Uuid) -> Result<()> {
        BsubClient::delete_job(self, job_id).await
    }

    async fn list_types(&self) -> Result<Vec<JobType>> {
        BsubClient::list_types(self).await
    }

    async fn server_version(&self) -> Result<ServerVersion> {
        BsubClient::server_version(self).await
    }
}
