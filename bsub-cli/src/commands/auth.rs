//! Credential commands
//!
//! `register` runs the device authorization flow; `config` stores a key
//! obtained some other way.

use anyhow::{Context, Result, bail};
use colored::*;
use std::io::Write;
use tokio_util::sync::CancellationToken;

use bsub_client::{AuthError, DeviceAuthorizer, PollEvent};

use crate::config::{Config, Credentials};
use crate::prompt::read_line;

/// Register this machine through the browser and store the issued key
pub async fn register(config: &Config, cancel: &CancellationToken) -> Result<()> {
    let hostname = hostname::get()
        .context("Failed to get hostname")?
        .to_string_lossy()
        .into_owned();
    tracing::debug!("Registering {} against {}", hostname, config.base_url);

    let authorizer = DeviceAuthorizer::new(config.auth_client()?, config.trusted_domain.as_str());

    println!("Registering with bsub.io...");
    let session = authorizer.request_code(&hostname).await?;

    // Refuse untrusted URIs before asking the user to open them
    let uri = authorizer.verify_uri(&session)?;

    println!();
    println!(
        "{} First copy your one-time code: {}",
        "!".yellow().bold(),
        session.user_code.bold()
    );
    read_line(
        &format!("Press Enter to open {} in your browser...", uri),
        cancel,
    )
    .await?;

    match authorizer.open_browser(&session) {
        Ok(()) => {}
        Err(AuthError::BrowserLaunch(e)) => {
            tracing::debug!("Browser launch failed: {}", e);
            println!(
                "{}",
                "Could not open a browser automatically. Please visit the URL above manually."
                    .yellow()
            );
        }
        Err(e) => return Err(e.into()),
    }

    print!("{}", "Waiting for authorization".dimmed());
    let _ = std::io::stdout().flush();
    let result = authorizer
        .await_authorization(&session, cancel, |event| {
            if let PollEvent::Sleeping { .. } = event {
                print!("{}", ".".dimmed());
                let _ = std::io::stdout().flush();
            }
        })
        .await;
    println!();

    let authorization = result.context("Authorization failed")?;
    println!("{} Authentication complete.", "✓".green());

    Credentials {
        api_key: authorization.api_key,
        base_url: config.base_url.clone(),
    }
    .save(&config.credentials_path)
    .context("Failed to save configuration")?;

    println!("{} Logged in as {}", "✓".green(), authorization.user);
    Ok(())
}

/// Store an API key for subsequent commands
pub async fn store_api_key(
    config: &Config,
    api_key: Option<String>,
    cancel: &CancellationToken,
) -> Result<()> {
    let api_key = match api_key {
        Some(key) => key,
        None => read_line("API key: ", cancel).await?,
    };
    let api_key = api_key.trim().to_string();

    if api_key.is_empty() {
        bail!("API key cannot be empty");
    }

    config.validate()?;
    Credentials {
        api_key,
        base_url: config.base_url.clone(),
    }
    .save(&config.credentials_path)?;

    println!(
        "{} Configuration saved to {}",
        "✓".green(),
        config.credentials_path.display()
    );
    Ok(())
}
