//! Server information commands

use anyhow::Result;
use colored::*;

use crate::config::Config;

/// List the job types the service accepts
pub async fn types(config: &Config) -> Result<()> {
    let client = config.job_client()?;
    let types = client.list_types().await?;

    if types.is_empty() {
        println!("{}", "No job types available.".yellow());
        return Ok(());
    }

    println!(
        "{}",
        format!("{:<20} {:<30} {}", "TYPE", "MIME", "DESCRIPTION").bold()
    );
    for job_type in &types {
        let mime = if job_type.mime.is_empty() {
            "-".to_string()
        } else {
            job_type.mime.join(", ")
        };
        println!(
            "{:<20} {:<30} {}",
            job_type.name.cyan(),
            mime,
            job_type.description.as_deref().unwrap_or("").dimmed()
        );
    }

    Ok(())
}

/// Print the CLI version and, when reachable, the server version
pub async fn version(config: &Config) -> Result<()> {
    println!("CLI Version:    {}", env!("CARGO_PKG_VERSION"));

    let client = config.job_client()?;
    let server = client.server_version().await?;
    println!(
        "Server Version: {}",
        server.version.as_deref().unwrap_or("unknown")
    );

    Ok(())
}
