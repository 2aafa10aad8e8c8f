//! bsub CLI
//!
//! Command-line client for the bsub.io batch processing service.

mod bench;
mod commands;
mod config;
mod id_resolver;
mod prompt;
mod shutdown;
mod types;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use config::Config;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "bsub")]
#[command(about = "bsub.io batch processing CLI", long_about = None)]
#[command(version)]
struct Cli {
    /// API base URL (overrides the stored one)
    #[arg(long, global = true, env = "BSUBIO_BASE_URL")]
    base_url: Option<String>,

    /// Credential file location
    #[arg(long, global = true, env = "BSUBIO_CONFIG")]
    config: Option<PathBuf>,

    /// Log progress details to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "bsub=debug,bsub_client=debug"
    } else {
        "bsub=warn,bsub_client=warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let credentials_path = match cli.config {
        Some(path) => path,
        None => config::default_credentials_path()?,
    };
    let config = Config::load(cli.base_url, credentials_path)?;
    tracing::debug!("Using base URL {}", config.base_url);

    let cancel = shutdown::install_interrupt_handler();
    let result = handle_command(cli.command, &config, &cancel).await;

    if let Err(e) = &result {
        if cancel.is_cancelled() {
            eprintln!("Error: {}", e);
            std::process::exit(shutdown::INTERRUPTED_EXIT_CODE);
        }
    }

    result
}
