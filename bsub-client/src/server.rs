//! Service metadata endpoints

use crate::BsubClient;
use crate::error::Result;
use bsub_core::domain::job::{JobType, ServerVersion};
use bsub_core::dto::job::TypeList;

impl BsubClient {
    /// List the job types the service can process
    pub async fn list_types(&self) -> Result<Vec<JobType>> {
        let response = self.get("/v1/types").send().await?;

        let list: TypeList = self.handle_response(response).await?;
        Ok(list.types)
    }

    /// Get the API server version
    pub async fn server_version(&self) -> Result<ServerVersion> {
        let response = self.get("/v1/version").send().await?;

        self.handle_response(response).await
    }
}
