//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod auth;
mod bench;
mod job;
mod server;

pub use bench::BenchCommands;

use anyhow::Result;
use bsub_core::domain::job::JobStatus;
use clap::Subcommand;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::types::IdOrPrefix;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Register this machine with bsub.io through the browser
    Register,
    /// Store an API key
    Config {
        /// API key to store; prompted for when omitted
        #[arg(long, env = "BSUBIO_API_KEY", hide_env_values = true)]
        api_key: Option<String>,
    },
    /// Submit a job for processing
    Submit {
        /// Wait for the job to complete and print its output
        #[arg(short, long)]
        wait: bool,

        /// Write the output to this file instead of stdout (requires -w)
        #[arg(short, long, requires = "wait")]
        output: Option<PathBuf>,

        /// Path to the input file
        file: PathBuf,

        /// Job type
        job_type: String,
    },
    /// Wait for a job to complete
    Wait {
        /// Polling interval in seconds
        #[arg(
            short = 't',
            long = "interval",
            default_value_t = 5,
            value_parser = clap::value_parser!(u64).range(1..)
        )]
        interval: u64,

        /// Give up after this many seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Job ID or unambiguous prefix
        id: IdOrPrefix,
    },
    /// Print job output
    Cat {
        /// Wait for the job to complete first
        #[arg(long)]
        wait: bool,

        /// Job ID or unambiguous prefix
        id: IdOrPrefix,
    },
    /// Print job logs
    Logs {
        /// Job ID or unambiguous prefix
        id: IdOrPrefix,
    },
    /// Show job details
    Status {
        /// Job ID or unambiguous prefix
        id: IdOrPrefix,
    },
    /// List jobs
    Jobs {
        /// Only list jobs with this status
        #[arg(long)]
        status: Option<JobStatus>,

        /// Maximum number of jobs to list
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
    /// Cancel a job
    Cancel {
        /// Cancel all pending and claimed jobs
        #[arg(short, long, conflicts_with = "id")]
        all: bool,

        /// Job ID or unambiguous prefix
        #[arg(required_unless_present = "all")]
        id: Option<IdOrPrefix>,
    },
    /// Delete a job
    Rm {
        /// Delete all jobs
        #[arg(short, long, conflicts_with = "id")]
        all: bool,

        /// Job ID or unambiguous prefix
        #[arg(required_unless_present = "all")]
        id: Option<IdOrPrefix>,
    },
    /// List available job types
    Types,
    /// Show CLI and server versions
    Version,
    /// Benchmark job processing over a directory of files
    Bench(BenchCommands),
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module. `cancel` is
/// cancelled on Ctrl-C and stops any wait or prompt in progress.
pub async fn handle_command(
    command: Commands,
    config: &Config,
    cancel: &CancellationToken,
) -> Result<()> {
    match command {
        Commands::Register => auth::register(config, cancel).await,
        Commands::Config { api_key } => auth::store_api_key(config, api_key, cancel).await,
        Commands::Submit {
            wait,
            output,
            file,
            job_type,
        } => job::submit(config, &file, &job_type, wait, output.as_deref(), cancel).await,
        Commands::Wait {
            interval,
            timeout,
            id,
        } => job::wait(config, &id, interval, timeout, cancel).await,
        Commands::Cat { wait, id } => job::cat(config, &id, wait, cancel).await,
        Commands::Logs { id } => job::logs(config, &id).await,
        Commands::Status { id } => job::status(config, &id).await,
        Commands::Jobs { status, limit } => job::list(config, status, limit).await,
        Commands::Cancel { all, id } => job::cancel(config, id.as_ref(), all).await,
        Commands::Rm { all, id } => job::remove(config, id.as_ref(), all).await,
        Commands::Types => server::types(config).await,
        Commands::Version => server::version(config).await,
        Commands::Bench(command) => bench::handle_bench_command(command, config, cancel).await,
    }
}
