//! Job lifecycle
//!
//! Drives one job from submission to a final status and retrieves its output.
//! Submission failures are never retried; waiting is delegated to the
//! polling engine, which treats `finished` as success, `failed` as a final
//! failure and every other status as still pending.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::ClientError;
use crate::poll::{PollError, PollEvent, PollOutcome, PollPolicy, poll_until};
use crate::service::JobService;
use bsub_core::domain::job::{Job, JobHandle, JobStatus};

/// Default delay between status checks
pub const DEFAULT_JOB_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Message used when a job fails without an explanation from the server
const GENERIC_FAILURE: &str = "job failed";

/// How to wait for a job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    /// Delay between status checks
    pub interval: Duration,
    /// Give up after this long; wait forever when `None`
    pub timeout: Option<Duration>,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            interval: DEFAULT_JOB_POLL_INTERVAL,
            timeout: None,
        }
    }
}

/// Errors raised while driving a job
#[derive(Debug, Error)]
pub enum JobError {
    /// The input file could not be read
    #[error("failed to read input file {}: {source}", .path.display())]
    ReadInput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The service rejected or never received the submission
    #[error("failed to submit job: {0}")]
    Submission(#[source] ClientError),

    /// Output was requested before the job reached a final status
    #[error("job {id} is not complete (status: {status})")]
    NotReady { id: Uuid, status: JobStatus },

    /// The service refused to return the output
    #[error("output of job {id} is unavailable (HTTP {status}): {message}")]
    OutputUnavailable {
        id: Uuid,
        status: u16,
        message: String,
    },

    /// The job failed; carries the server's message verbatim when supplied
    #[error("{0}")]
    Failed(String),

    /// The caller's deadline, not the service, ended the wait
    #[error("stopped waiting after {waited:?}: deadline reached before the job finished")]
    Timeout { waited: Duration },

    /// The caller cancelled the wait
    #[error("stopped waiting: cancelled before the job finished")]
    Cancelled,

    /// Transport failure while talking to the service
    #[error(transparent)]
    Transport(ClientError),
}

impl From<PollError<String>> for JobError {
    fn from(err: PollError<String>) -> Self {
        match err {
            PollError::Terminal(message) => JobError::Failed(message),
            PollError::Transport(err) => JobError::Transport(err),
            PollError::Timeout { waited } => JobError::Timeout { waited },
            PollError::Cancelled => JobError::Cancelled,
        }
    }
}

/// Classify one status reply for the polling engine
fn classify(job: &Job) -> PollOutcome<(), String> {
    match job.status {
        JobStatus::Finished => PollOutcome::Success(()),
        JobStatus::Failed => PollOutcome::TerminalFailure(
            job.error_message().unwrap_or(GENERIC_FAILURE).to_string(),
        ),
        JobStatus::Pending | JobStatus::Claimed | JobStatus::Unknown => PollOutcome::Pending,
    }
}

/// Submits jobs, waits for them and fetches their results
pub struct JobLifecycle<S> {
    service: S,
}

impl<S: JobService> JobLifecycle<S> {
    pub fn new(service: S) -> Self {
        Self { service }
    }

    /// The underlying job service
    pub fn service(&self) -> &S {
        &self.service
    }

    /// Read `input` and submit it as a job of type `job_type`
    ///
    /// Creates exactly one remote job on success.
    pub async fn submit(&self, input: &Path, job_type: &str) -> Result<JobHandle, JobError> {
        let data = tokio::fs::read(input)
            .await
            .map_err(|source| JobError::ReadInput {
                path: input.to_path_buf(),
                source,
            })?;

        let file_name = input
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "input".to_string());
        let size = data.len();

        let job = self
            .service
            .create_and_submit(job_type, &file_name, data)
            .await
            .map_err(JobError::Submission)?;

        info!(
            "Submitted job {} ({}, {} bytes, type {})",
            job.id, file_name, size, job_type
        );

        Ok(JobHandle::from(&job))
    }

    /// Fetch the current job record and update the handle's status
    pub async fn refresh(&self, handle: &mut JobHandle) -> Result<Job, JobError> {
        let job = self
            .service
            .get_job(handle.id())
            .await
            .map_err(JobError::Transport)?;
        handle.status = job.status;
        Ok(job)
    }

    /// Poll the job until it finishes, fails, the deadline passes or `cancel` fires
    ///
    /// The handle's status is updated after every poll.
    ///
    /// # Returns
    /// `JobStatus::Finished` on success; a failed job yields [`JobError::Failed`]
    pub async fn await_completion<O>(
        &self,
        handle: &mut JobHandle,
        options: &WaitOptions,
        cancel: &CancellationToken,
        on_event: O,
    ) -> Result<JobStatus, JobError>
    where
        O: FnMut(&PollEvent),
    {
        let mut policy = PollPolicy::new(options.interval);
        if let Some(timeout) = options.timeout {
            policy = policy.with_timeout(timeout);
        }

        let job_id = handle.id();
        let observed = Mutex::new(handle.status);
        let service = &self.service;
        let observed_ref = &observed;

        let result = poll_until(
            &policy,
            cancel,
            move || async move {
                match service.get_job(job_id).await {
                    Ok(job) => {
                        debug!("Job {} status: {}", job_id, job.status);
                        if let Ok(mut status) = observed_ref.lock() {
                            *status = job.status;
                        }
                        classify(&job)
                    }
                    Err(err) => PollOutcome::TransportError(err),
                }
            },
            on_event,
        )
        .await;

        handle.status = observed.into_inner().unwrap_or_else(PoisonError::into_inner);

        result.map_err(JobError::from)?;
        Ok(JobStatus::Finished)
    }

    /// Fetch the output of a job that has reached a final status
    pub async fn fetch_output(&self, handle: &JobHandle) -> Result<Vec<u8>, JobError> {
        if !handle.status.is_terminal() {
            return Err(JobError::NotReady {
                id: handle.id(),
                status: handle.status,
            });
        }

        self.service
            .get_output(handle.id())
            .await
            .map_err(|err| unavailable(handle.id(), err))
    }

    /// Fetch the logs of a job
    pub async fn fetch_logs(&self, handle: &JobHandle) -> Result<Vec<u8>, JobError> {
        self.service
            .get_logs(handle.id())
            .await
            .map_err(|err| unavailable(handle.id(), err))
    }
}

fn unavailable(id: Uuid, err: ClientError) -> JobError {
    match err {
        ClientError::ApiError { status, message } => JobError::OutputUnavailable {
            id,
            status,
            message,
        },
        other => JobError::Transport(other),
    }
}
