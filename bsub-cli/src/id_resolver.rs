//! ID resolver module
//!
//! Resolves job ID prefixes to full UUIDs by querying the job listing, so
//! users can type `3f2a` instead of a full UUID.

use anyhow::{Context, Result, anyhow};
use uuid::Uuid;

use bsub_client::JobService;
use bsub_core::dto::job::JobFilter;

use crate::types::IdOrPrefix;

/// Number of recent jobs searched when resolving a prefix
const RESOLVE_LIMIT: u32 = 1000;

/// Resolve a job ID or prefix to a full UUID
///
/// A full UUID is returned as-is without contacting the service.
///
/// # Errors
/// Returns an error if no job or more than one job matches the prefix, or
/// if the listing cannot be fetched.
pub async fn resolve_job_id<S: JobService + ?Sized>(
    service: &S,
    id_or_prefix: &IdOrPrefix,
) -> Result<Uuid> {
    if let Some(uuid) = id_or_prefix.as_uuid() {
        return Ok(uuid);
    }

    let filter = JobFilter {
        status: None,
        limit: Some(RESOLVE_LIMIT),
    };
    let jobs = service
        .list_jobs(&filter)
        .await
        .context("Failed to fetch jobs for ID resolution")?;

    let matches: Vec<Uuid> = jobs
        .iter()
        .map(|j| j.id)
        .filter(|id| id_or_prefix.matches(id))
        .collect();

    match matches.as_slice() {
        [] => Err(anyhow!(
            "No job found with ID starting with '{}'",
            id_or_prefix
        )),
        [id] => Ok(*id),
        _ => {
            let ids: Vec<String> = matches.iter().map(Uuid::to_string).collect();
            Err(anyhow!(
                "Ambiguous prefix '{}' matches multiple jobs: {}",
                id_or_prefix,
                ids.join(", ")
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bsub_client::Result as ClientResult;
    use bsub_core::domain::job::{Job, JobStatus, JobType, ServerVersion};

    struct Listing(Vec<Uuid>);

    #[async_trait]
    impl JobService for Listing {
        async fn create_and_submit(&self, _: &str, _: &str, _: Vec<u8>) -> ClientResult<Job> {
            unimplemented!()
        }

        async fn get_job(&self, _: Uuid) -> ClientResult<Job> {
            unimplemented!()
        }

        async fn get_output(&self, _: Uuid) -> ClientResult<Vec<u8>> {
            unimplemented!()
        }

        async fn get_logs(&self, _: Uuid) -> ClientResult<Vec<u8>> {
            unimplemented!()
        }

        async fn list_jobs(&self, _: &JobFilter) -> ClientResult<Vec<Job>> {
            Ok(self
                .0
                .iter()
                .map(|id| Job {
                    id: *id,
                    job_type: None,
                    status: JobStatus::Finished,
                    data_size: None,
                    created_at: None,
                    claimed_at: None,
                    finished_at: None,
                    claimed_by: None,
                    error_message: None,
                })
                .collect())
        }

        async fn cancel_job(&self, _: Uuid) -> ClientResult<()> {
            unimplemented!()
        }

        async fn delete_job(&self, _: Uuid) -> ClientResult<()> {
            unimplemented!()
        }

        async fn list_types(&self) -> ClientResult<Vec<JobType>> {
            unimplemented!()
        }

        async fn server_version(&self) -> ClientResult<ServerVersion> {
            unimplemented!()
        }
    }

    fn listing() -> Listing {
        Listing(vec![
            Uuid::parse_str("3f2a9c1e-0000-4000-8000-000000000001").unwrap(),
            Uuid::parse_str("3f2b0000-0000-4000-8000-000000000002").unwrap(),
            Uuid::parse_str("a0000000-0000-4000-8000-000000000003").unwrap(),
        ])
    }

    #[tokio::test]
    async fn test_unique_prefix_resolves() {
        let service = listing();
        let id = resolve_job_id(&service, &"a0".parse().unwrap()).await.unwrap();
        assert_eq!(id, service.0[2]);
    }

    #[tokio::test]
    async fn test_ambiguous_prefix_is_rejected() {
        let err = resolve_job_id(&listing(), &"3f2".parse().unwrap())
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("Ambiguous prefix '3f2'"));
    }

    #[tokio::test]
    async fn test_unknown_prefix_is_rejected() {
        let err = resolve_job_id(&listing(), &"ff".parse().unwrap())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("No job found"));
    }

    #[tokio::test]
    async fn test_full_id_skips_listing() {
        let id = Uuid::new_v4();
        let resolved = resolve_job_id(&Listing(vec![]), &IdOrPrefix::Full(id))
            .await
            .unwrap();
        assert_eq!(resolved, id);
    }
}
