//! Configuration module
//!
//! Handles the stored credential record and the per-invocation configuration
//! built from it. The configuration is created once in `main` and passed by
//! reference to every command.

use anyhow::{Context, Result, anyhow};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use bsub_client::{AuthClient, BsubClient};

/// Base URL used when nothing else is configured
pub const DEFAULT_BASE_URL: &str = "https://app.bsub.io";

/// Domain every verification URI must belong to
pub const TRUSTED_DOMAIN: &str = "bsub.io";

/// Connection timeout applied to every request
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Overall timeout applied to every request
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Get the path to the credential file, `~/.config/bsubio/config.json`
pub fn default_credentials_path() -> Result<PathBuf> {
    let home = home::home_dir().ok_or_else(|| anyhow!("Home directory not found"))?;
    Ok(home.join(".config").join("bsubio").join("config.json"))
}

/// Credential record persisted between invocations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub api_key: String,
    pub base_url: String,
}

impl Credentials {
    /// Load the record at `path`, or `None` when the file does not exist
    pub fn load_from_file(path: &Path) -> Result<Option<Self>> {
        let data = match fs::read(path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", path.display()));
            }
        };

        let credentials = serde_json::from_slice(&data)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(Some(credentials))
    }

    /// Save the record to `path`, readable and writable by the owner only
    ///
    /// Parent directories are created if they don't exist.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let json = serde_json::to_string_pretty(self).context("Failed to serialize credentials")?;
        write_private(path, json.as_bytes())
            .with_context(|| format!("Failed to write {}", path.display()))
    }
}

#[cfg(unix)]
fn write_private(path: &Path, data: &[u8]) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    // mode() only applies on creation
    file.set_permissions(fs::Permissions::from_mode(0o600))?;
    file.write_all(data)
}

#[cfg(not(unix))]
fn write_private(path: &Path, data: &[u8]) -> std::io::Result<()> {
    fs::write(path, data)
}

/// CLI configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the bsub.io API
    pub base_url: String,
    /// API key, when one has been stored
    pub api_key: Option<String>,
    /// Domain verification URIs must belong to
    pub trusted_domain: String,
    /// Location of the credential record
    pub credentials_path: PathBuf,
}

impl Config {
    /// Build the configuration from the stored record and overrides
    ///
    /// Base URL precedence: `base_url_override` (flag or `BSUBIO_BASE_URL`),
    /// then the stored record, then [`DEFAULT_BASE_URL`].
    pub fn load(base_url_override: Option<String>, credentials_path: PathBuf) -> Result<Self> {
        // A corrupt record is ignored; `register` and `config` overwrite it
        let stored = match Credentials::load_from_file(&credentials_path) {
            Ok(stored) => stored,
            Err(e) => {
                tracing::warn!("Ignoring stored credentials: {:#}", e);
                None
            }
        };
        Ok(Self::resolve(base_url_override, stored, credentials_path))
    }

    fn resolve(
        base_url_override: Option<String>,
        stored: Option<Credentials>,
        credentials_path: PathBuf,
    ) -> Self {
        let stored_url = stored
            .as_ref()
            .map(|c| c.base_url.clone())
            .filter(|url| !url.is_empty());

        Self {
            base_url: base_url_override
                .filter(|url| !url.is_empty())
                .or(stored_url)
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            api_key: stored.map(|c| c.api_key).filter(|key| !key.is_empty()),
            trusted_domain: TRUSTED_DOMAIN.to_string(),
            credentials_path,
        }
    }

    /// The stored API key
    pub fn api_key(&self) -> Result<&str> {
        self.api_key.as_deref().ok_or_else(|| {
            anyhow!(
                "No API key configured ({} not found). Run 'bsub register' or 'bsub config' to set up",
                self.credentials_path.display()
            )
        })
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<()> {
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            anyhow::bail!("base URL must start with http:// or https://");
        }
        Ok(())
    }

    /// HTTP client with the timeouts applied to every remote call
    fn http_client(&self) -> Result<Client> {
        Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")
    }

    /// Authenticated client for the job API
    pub fn job_client(&self) -> Result<BsubClient> {
        self.validate()?;
        let api_key = self.api_key()?;
        Ok(BsubClient::with_client(
            &self.base_url,
            api_key,
            self.http_client()?,
        ))
    }

    /// Unauthenticated client for the device-flow endpoints
    pub fn auth_client(&self) -> Result<AuthClient> {
        self.validate()?;
        Ok(AuthClient::with_client(&self.base_url, self.http_client()?))
    }
}
