//! Device authorization
//!
//! Implements the device flow: request a code, let the user approve it in a
//! browser, then poll until the service reports the outcome.
//!
//! ```text
//! Requested -> AwaitingUser -> Authorized | Denied | Expired
//! ```
//!
//! Rate limiting keeps the session in `AwaitingUser` with a longer interval.

use std::time::Duration;

use reqwest::Url;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::auth::{DeviceAuthApi, RawResponse};
use crate::error::ClientError;
use crate::poll::{PollError, PollEvent, PollOutcome, PollPolicy, poll_until};
use bsub_core::domain::auth::Authorization;
use bsub_core::dto::auth::{DeviceCodeResponse, DeviceTokenRequest, DeviceTokenResponse, SlowDown};

/// Interval used when the service does not issue one
pub const DEFAULT_DEVICE_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// A device code waiting for the user's approval
///
/// Lives for a single `register` invocation and is never persisted.
#[derive(Debug, Clone)]
pub struct DeviceAuthSession {
    pub device_code: String,
    pub user_code: String,
    pub verification_uri: String,
    pub expires_in: Duration,
    pub poll_interval: Duration,
    pub issued_at: Instant,
}

impl DeviceAuthSession {
    pub fn new(response: DeviceCodeResponse, issued_at: Instant) -> Self {
        let poll_interval = match response.interval {
            0 => DEFAULT_DEVICE_POLL_INTERVAL,
            secs => Duration::from_secs(secs),
        };

        Self {
            device_code: response.device_code,
            user_code: response.user_code,
            verification_uri: response.verification_uri,
            expires_in: Duration::from_secs(response.expires_in),
            poll_interval,
            issued_at,
        }
    }

    /// Moment after which the device code is no longer valid
    ///
    /// `None` when the lifetime is too large to represent.
    pub fn deadline(&self) -> Option<Instant> {
        self.issued_at.checked_add(self.expires_in)
    }
}

/// Final failures reported by the token endpoint
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthFailure {
    #[error("authorization denied by user")]
    Denied,

    #[error("authorization code expired")]
    Expired,

    #[error("server returned {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Errors raised during device authorization
#[derive(Debug, Error)]
pub enum AuthError {
    /// The service did not issue a device code
    #[error("failed to request device code: {0}")]
    CodeRequest(#[source] ClientError),

    /// The user declined the request
    #[error("authorization denied by user")]
    Denied,

    /// The service reported that the device code expired
    #[error("authorization code expired")]
    Expired,

    /// Any other reply from the token endpoint
    #[error("server returned {status}: {body}")]
    Rejected { status: u16, body: String },

    /// The verification URI failed validation and was not opened
    #[error("refusing to open verification URI {uri}: {reason}")]
    UntrustedUri { uri: String, reason: String },

    /// The verification URI is trusted but no browser could be started
    #[error("could not open a browser: {0}")]
    BrowserLaunch(#[source] std::io::Error),

    /// The device code's lifetime elapsed locally before approval
    #[error("authorization timed out after {waited:?}: the code's deadline passed before approval")]
    Timeout { waited: Duration },

    /// The caller cancelled the wait
    #[error("authorization cancelled")]
    Cancelled,

    /// Transport failure or malformed reply from the token endpoint
    #[error(transparent)]
    Transport(ClientError),
}

impl From<PollError<AuthFailure>> for AuthError {
    fn from(err: PollError<AuthFailure>) -> Self {
        match err {
            PollError::Terminal(AuthFailure::Denied) => AuthError::Denied,
            PollError::Terminal(AuthFailure::Expired) => AuthError::Expired,
            PollError::Terminal(AuthFailure::Rejected { status, body }) => {
                AuthError::Rejected { status, body }
            }
            PollError::Transport(err) => AuthError::Transport(err),
            PollError::Timeout { waited } => AuthError::Timeout { waited },
            PollError::Cancelled => AuthError::Cancelled,
        }
    }
}

/// Classify one reply of the token endpoint for the polling engine
pub fn classify_token_response(response: &RawResponse) -> PollOutcome<Authorization, AuthFailure> {
    match response.status {
        200 => match serde_json::from_str::<DeviceTokenResponse>(&response.body) {
            Ok(token) if token.status == "authorized" && !token.api_key.is_empty() => {
                PollOutcome::Success(Authorization {
                    api_key: token.api_key,
                    user: token.user,
                })
            }
            Ok(_) => PollOutcome::Pending,
            Err(e) => PollOutcome::TransportError(ClientError::ParseError(format!(
                "Failed to parse authorization response: {}",
                e
            ))),
        },
        202 => PollOutcome::Pending,
        429 => {
            let requested = serde_json::from_str::<SlowDown>(&response.body)
                .ok()
                .filter(|slow_down| slow_down.interval > 0)
                .map(|slow_down| Duration::from_secs(slow_down.interval as u64));
            PollOutcome::RateLimited(requested)
        }
        410 => PollOutcome::TerminalFailure(AuthFailure::Expired),
        403 => PollOutcome::TerminalFailure(AuthFailure::Denied),
        status => PollOutcome::TerminalFailure(AuthFailure::Rejected {
            status,
            body: response.body.clone(),
        }),
    }
}

/// Check that `uri` is HTTPS and points at `trusted_domain` or one of its subdomains
pub fn verify_verification_uri(uri: &str, trusted_domain: &str) -> Result<Url, AuthError> {
    let untrusted = |reason: String| AuthError::UntrustedUri {
        uri: uri.to_string(),
        reason,
    };

    let url = Url::parse(uri).map_err(|e| untrusted(format!("invalid URL: {}", e)))?;

    if url.scheme() != "https" {
        return Err(untrusted("verification URL must use HTTPS".to_string()));
    }

    let host = url
        .host_str()
        .ok_or_else(|| untrusted("verification URL has no host".to_string()))?
        .to_ascii_lowercase();
    let domain = trusted_domain.to_ascii_lowercase();

    if host != domain && !host.ends_with(&format!(".{}", domain)) {
        return Err(untrusted(format!("unexpected verification host: {}", host)));
    }

    Ok(url)
}

/// Runs the device flow against a [`DeviceAuthApi`]
pub struct DeviceAuthorizer<A> {
    api: A,
    trusted_domain: String,
}

impl<A: DeviceAuthApi> DeviceAuthorizer<A> {
    /// Create an authorizer that only opens verification URIs under `trusted_domain`
    pub fn new(api: A, trusted_domain: impl Into<String>) -> Self {
        Self {
            api,
            trusted_domain: trusted_domain.into(),
        }
    }

    /// Request a device code for this machine
    pub async fn request_code(&self, hostname: &str) -> Result<DeviceAuthSession, AuthError> {
        let response = self
            .api
            .request_device_code(hostname)
            .await
            .map_err(AuthError::CodeRequest)?;

        let session = DeviceAuthSession::new(response, Instant::now());
        debug!(
            "Device code received (expires in {:?}, poll interval {:?})",
            session.expires_in, session.poll_interval
        );
        Ok(session)
    }

    /// Validate the session's verification URI against the trusted domain
    pub fn verify_uri(&self, session: &DeviceAuthSession) -> Result<Url, AuthError> {
        verify_verification_uri(&session.verification_uri, &self.trusted_domain)
    }

    /// Open the verification URI in the user's browser
    ///
    /// The URI is validated first; an untrusted URI is never opened.
    pub fn open_browser(&self, session: &DeviceAuthSession) -> Result<(), AuthError> {
        let url = self.verify_uri(session)?;
        launch_browser(url.as_str()).map_err(AuthError::BrowserLaunch)
    }

    /// Poll until the user approves or rejects the device, or the code expires
    ///
    /// Uses the session's interval as the initial interval and its
    /// `issued_at + expires_in` as the deadline.
    pub async fn await_authorization<O>(
        &self,
        session: &DeviceAuthSession,
        cancel: &CancellationToken,
        on_event: O,
    ) -> Result<Authorization, AuthError>
    where
        O: FnMut(&PollEvent),
    {
        let mut policy = PollPolicy::new(session.poll_interval);
        if let Some(deadline) = session.deadline() {
            policy = policy.with_deadline(deadline);
        }
        let request = DeviceTokenRequest {
            device_code: session.device_code.clone(),
            user_code: session.user_code.clone(),
        };
        let api = &self.api;
        let request = &request;

        let authorization = poll_until(
            &policy,
            cancel,
            move || async move {
                match api.poll_device_token(request).await {
                    Ok(response) => classify_token_response(&response),
                    Err(err) => PollOutcome::TransportError(err),
                }
            },
            on_event,
        )
        .await?;

        info!("Authorization granted for {}", authorization.user.email);
        Ok(authorization)
    }
}

fn launch_browser(url: &str) -> std::io::Result<()> {
    use std::process::Command;

    let mut command = if cfg!(target_os = "macos") {
        let mut command = Command::new("open");
        command.arg(url);
        command
    } else if cfg!(target_os = "windows") {
        let mut command = Command::new("cmd");
        command.args(["/c", "start", url]);
        command
    } else {
        let mut command = Command::new("xdg-open");
        command.arg(url);
        command
    };

    spawn_detached(command)
}

/// Start `command` without waiting for it; a background thread reaps the child
fn spawn_detached(mut command: std::process::Command) -> std::io::Result<()> {
    let mut child = command.spawn()?;
    std::thread::spawn(move || {
        let _ = child.wait();
    });
    Ok(())
}
