//! Job command handlers
//!
//! Handles submitting, waiting for, inspecting and removing jobs.

use anyhow::{Context, Result, anyhow, bail};
use colored::*;
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use bsub_client::{BsubClient, ClientError, JobError, JobLifecycle, PollEvent, WaitOptions};
use bsub_core::domain::job::{Job, JobHandle, JobStatus};
use bsub_core::dto::job::JobFilter;

use crate::config::Config;
use crate::id_resolver::resolve_job_id;
use crate::types::IdOrPrefix;

/// Number of jobs fetched by the batch variants of cancel and rm
const BATCH_LIMIT: u32 = 1000;

fn lifecycle(config: &Config) -> Result<JobLifecycle<BsubClient>> {
    Ok(JobLifecycle::new(config.job_client()?))
}

/// Submit a file, optionally waiting for the job and writing its output
pub async fn submit(
    config: &Config,
    file: &Path,
    job_type: &str,
    wait: bool,
    output: Option<&Path>,
    cancel: &CancellationToken,
) -> Result<()> {
    if output.is_some() && !wait {
        bail!("--output requires --wait");
    }

    let lifecycle = lifecycle(config)?;

    eprintln!("{}", "Submitting job...".dimmed());
    let mut handle = lifecycle.submit(file, job_type).await?;
    eprintln!(
        "{} Job submitted: {}",
        "✓".green(),
        handle.id().to_string().cyan()
    );

    if !wait {
        println!("{}", handle.id());
        return Ok(());
    }

    await_job(&lifecycle, &mut handle, WaitOptions::default(), cancel).await?;
    let data = lifecycle.fetch_output(&handle).await?;
    write_output(&data, output)
}

/// Wait for a job to reach a final status
pub async fn wait(
    config: &Config,
    id: &IdOrPrefix,
    interval_secs: u64,
    timeout_secs: Option<u64>,
    cancel: &CancellationToken,
) -> Result<()> {
    let lifecycle = lifecycle(config)?;
    let job_id = resolve_job_id(lifecycle.service(), id).await?;

    let options = WaitOptions {
        interval: Duration::from_secs(interval_secs),
        timeout: timeout_secs.map(Duration::from_secs),
    };

    let mut handle = JobHandle::new(job_id, JobStatus::Unknown);
    await_job(&lifecycle, &mut handle, options, cancel).await
}

/// Print the output of a job
pub async fn cat(
    config: &Config,
    id: &IdOrPrefix,
    wait: bool,
    cancel: &CancellationToken,
) -> Result<()> {
    let lifecycle = lifecycle(config)?;
    let job_id = resolve_job_id(lifecycle.service(), id).await?;

    let mut handle = JobHandle::new(job_id, JobStatus::Unknown);
    lifecycle.refresh(&mut handle).await?;

    if !handle.status.is_terminal() {
        if !wait {
            bail!(
                "job is not complete (status: {}). Use 'bsub wait {}' first or pass --wait",
                handle.status,
                job_id
            );
        }
        eprintln!(
            "{}",
            format!("Job is {}, waiting for completion...", handle.status).dimmed()
        );
        await_job(&lifecycle, &mut handle, WaitOptions::default(), cancel).await?;
    }

    let data = lifecycle.fetch_output(&handle).await?;
    write_output(&data, None)
}

/// Print the logs of a job
pub async fn logs(config: &Config, id: &IdOrPrefix) -> Result<()> {
    let lifecycle = lifecycle(config)?;
    let job_id = resolve_job_id(lifecycle.service(), id).await?;

    let handle = JobHandle::new(job_id, JobStatus::Unknown);
    let data = lifecycle.fetch_logs(&handle).await?;
    write_output(&data, None)
}

/// Show the details of a job
pub async fn status(config: &Config, id: &IdOrPrefix) -> Result<()> {
    let client = config.job_client()?;
    let job_id = resolve_job_id(&client, id).await?;

    let job = client.get_job(job_id).await.map_err(missing_job(job_id))?;
    print_job_details(&job);

    Ok(())
}

/// List jobs, most recent first
pub async fn list(config: &Config, status: Option<JobStatus>, limit: u32) -> Result<()> {
    let client = config.job_client()?;
    let filter = JobFilter {
        status,
        limit: Some(limit),
    };

    let jobs = client.list_jobs(&filter).await?;

    if jobs.is_empty() {
        println!("{}", "No jobs found.".yellow());
        return Ok(());
    }

    let type_width = jobs
        .iter()
        .filter_map(|j| j.job_type.as_deref())
        .map(str::len)
        .max()
        .unwrap_or(0)
        .max("TYPE".len());

    println!(
        "{}",
        format!(
            "{:<36}  {:<type_width$}  {:<10}  {}",
            "JOB ID", "TYPE", "STATUS", "CREATED AT"
        )
        .bold()
    );
    for job in &jobs {
        let created = job
            .created_at
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<36}  {:<type_width$}  {}  {}",
            job.id,
            job.job_type.as_deref().unwrap_or("-"),
            colorize_status(job.status, 10),
            created.dimmed()
        );
    }

    Ok(())
}

/// Cancel one job, or every pending and claimed job
pub async fn cancel(config: &Config, id: Option<&IdOrPrefix>, all: bool) -> Result<()> {
    let client = config.job_client()?;

    if !all {
        let id = id.context("a job ID is required unless --all is given")?;
        let job_id = resolve_job_id(&client, id).await?;
        client
            .cancel_job(job_id)
            .await
            .map_err(missing_job(job_id))?;
        println!("{} Job cancelled: {}", "✓".green(), job_id);
        return Ok(());
    }

    let jobs = list_for_batch(&client).await?;
    let targets: Vec<&Job> = jobs
        .iter()
        .filter(|j| matches!(j.status, JobStatus::Pending | JobStatus::Claimed))
        .collect();

    let mut failed = 0;
    for job in &targets {
        match client.cancel_job(job.id).await {
            Ok(()) => println!("  {} Cancelled {}", "▸".cyan(), job.id),
            Err(e) => {
                failed += 1;
                eprintln!("  {} {}: {}", "✗".red(), job.id, e);
            }
        }
    }

    print_batch_summary("Cancelled", targets.len() - failed, failed)
}

/// Delete one job, or every job
pub async fn remove(config: &Config, id: Option<&IdOrPrefix>, all: bool) -> Result<()> {
    let client = config.job_client()?;

    if !all {
        let id = id.context("a job ID is required unless --all is given")?;
        let job_id = resolve_job_id(&client, id).await?;
        client
            .delete_job(job_id)
            .await
            .map_err(missing_job(job_id))?;
        println!("{} Job deleted: {}", "✓".green(), job_id);
        return Ok(());
    }

    let jobs = list_for_batch(&client).await?;

    let mut failed = 0;
    for job in &jobs {
        match client.delete_job(job.id).await {
            Ok(()) => println!("  {} Deleted {}", "▸".cyan(), job.id),
            Err(e) => {
                failed += 1;
                eprintln!("  {} {}: {}", "✗".red(), job.id, e);
            }
        }
    }

    print_batch_summary("Deleted", jobs.len() - failed, failed)
}

async fn list_for_batch(client: &BsubClient) -> Result<Vec<Job>> {
    let filter = JobFilter {
        status: None,
        limit: Some(BATCH_LIMIT),
    };
    client
        .list_jobs(&filter)
        .await
        .context("Failed to list jobs")
}

/// Turn a 404 for `job_id` into a plain "not found" message
fn missing_job(job_id: Uuid) -> impl FnOnce(ClientError) -> anyhow::Error {
    move |err| {
        if err.is_not_found() {
            anyhow!("Job {} not found", job_id)
        } else {
            err.into()
        }
    }
}

/// Report how a batch went; any per-item failure makes the command fail
fn print_batch_summary(verb: &str, succeeded: usize, failed: usize) -> Result<()> {
    println!("{}", format!("{} {} job(s)", verb, succeeded).bold());
    if failed > 0 {
        bail!("{} job(s) could not be processed", failed);
    }
    Ok(())
}

/// Wait for `handle`, printing a progress dot per poll on stderr
async fn await_job(
    lifecycle: &JobLifecycle<BsubClient>,
    handle: &mut JobHandle,
    options: WaitOptions,
    cancel: &CancellationToken,
) -> Result<()> {
    eprint!("{}", format!("Waiting for job {}", handle.id()).dimmed());

    let result = lifecycle
        .await_completion(handle, &options, cancel, |event| {
            if let PollEvent::Sleeping { .. } = event {
                eprint!("{}", ".".dimmed());
                let _ = std::io::stderr().flush();
            }
        })
        .await;
    eprintln!();

    match result {
        Ok(_) => {
            eprintln!("{} Job completed successfully", "✓".green());
            Ok(())
        }
        Err(err @ JobError::Failed(_)) => {
            eprintln!("{} Job {} failed", "✗".red(), handle.id());
            Err(err.into())
        }
        Err(err) => Err(err.into()),
    }
}

/// Write job output to `path`, or to stdout when no path is given
fn write_output(data: &[u8], path: Option<&Path>) -> Result<()> {
    match path {
        Some(path) => {
            std::fs::write(path, data)
                .with_context(|| format!("Failed to write output to {}", path.display()))?;
            eprintln!("{} Output saved to {}", "✓".green(), path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(data)?;
            stdout.flush()?;
        }
    }
    Ok(())
}

/// Print detailed job information
fn print_job_details(job: &Job) {
    println!("{}", "Job Details:".bold());
    println!("  ID:          {}", job.id.to_string().cyan());
    if let Some(job_type) = &job.job_type {
        println!("  Type:        {}", job_type);
    }
    println!("  Status:      {}", colorize_status(job.status, 0));
    if let Some(size) = job.data_size {
        println!("  Data Size:   {} bytes", size);
    }
    if let Some(created) = job.created_at {
        println!("  Created:     {}", created.format("%Y-%m-%d %H:%M:%S"));
    }
    if let Some(claimed) = job.claimed_at {
        println!("  Claimed:     {}", claimed.format("%Y-%m-%d %H:%M:%S"));
    }
    if let Some(finished) = job.finished_at {
        println!("  Finished:    {}", finished.format("%Y-%m-%d %H:%M:%S"));

        if let Some(claimed) = job.claimed_at {
            let duration = finished.signed_duration_since(claimed);
            println!("  Duration:    {}s", duration.num_seconds());
        }
    }
    if let Some(worker) = &job.claimed_by {
        println!("  Claimed By:  {}", worker.dimmed());
    }

    if let Some(error) = job.error_message() {
        println!("\n{}", "Error:".bold());
        println!("{}", error.red());
    }
}

/// Colorize job status for display, padded to `width`
fn colorize_status(status: JobStatus, width: usize) -> ColoredString {
    let status_str = format!("{:<width$}", status.as_str());
    match status {
        JobStatus::Pending => status_str.yellow(),
        JobStatus::Claimed => status_str.cyan(),
        JobStatus::Finished => status_str.green(),
        JobStatus::Failed => status_str.red(),
        JobStatus::Unknown => status_str.dimmed(),
    }
}
