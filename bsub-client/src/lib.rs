//! Bsub HTTP Client
//!
//! A type-safe client for the bsub.io batch processing API, plus the polling
//! machinery that drives jobs and device authorizations to a terminal state.
//!
//! - [`BsubClient`] talks to the job endpoints and implements [`JobService`]
//! - [`AuthClient`] talks to the device-flow endpoints and implements [`DeviceAuthApi`]
//! - [`poll`] is the backoff/deadline/cancellation loop shared by both flows
//! - [`JobLifecycle`] and [`DeviceAuthorizer`] are the controllers built on top
//!
//! # Example
//!
//! ```no_run
//! use bsub_client::{BsubClient, JobLifecycle, WaitOptions};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = BsubClient::new("https://app.bsub.io", "my-api-key");
//!     let lifecycle = JobLifecycle::new(client);
//!
//!     let mut handle = lifecycle.submit(std::path::Path::new("report.pdf"), "pdf_extract").await?;
//!     lifecycle
//!         .await_completion(&mut handle, &WaitOptions::default(), &CancellationToken::new(), |_| {})
//!         .await?;
//!
//!     let output = lifecycle.fetch_output(&handle).await?;
//!     println!("{}", String::from_utf8_lossy(&output));
//!     Ok(())
//! }
//! ```

mod auth;
pub mod device;
pub mod error;
mod jobs;
pub mod lifecycle;
pub mod poll;
mod server;
mod service;

// Re-export commonly used types
pub use auth::{AuthClient, DeviceAuthApi, RawResponse};
pub use device::{AuthError, AuthFailure, DeviceAuthSession, DeviceAuthorizer};
pub use error::{ClientError, Result};
pub use lifecycle::{JobError, JobLifecycle, WaitOptions};
pub use poll::{PollError, PollEvent, PollOutcome, PollPolicy};
pub use service::JobService;

use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;

use bsub_core::dto::job::Envelope;

/// HTTP client for the bsub.io job API
///
/// Every request is authenticated with the API key as a bearer token.
#[derive(Debug, Clone)]
pub struct BsubClient {
    /// Base URL of the service (e.g., "https://app.bsub.io")
    base_url: String,
    /// API key sent as a bearer token
    api_key: String,
    /// HTTP client instance
    client: Client,
}

impl BsubClient {
    /// Create a new client
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the bsub.io API (e.g., "https://app.bsub.io")
    /// * `api_key` - The API key issued by `config` or `register`
    ///
    /// # Example
    /// ```
    /// use bsub_client::BsubClient;
    ///
    /// let client = BsubClient::new("https://app.bsub.io", "my-api-key");
    /// ```
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self::with_client(base_url, api_key, Client::new())
    }

    /// Create a new client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    ///
    /// # Example
    /// ```
    /// use bsub_client::BsubClient;
    /// use reqwest::Client;
    /// use std::time::Duration;
    ///
    /// let http_client = Client::builder()
    ///     .timeout(Duration::from_secs(30))
    ///     .build()
    ///     .unwrap();
    ///
    /// let client = BsubClient::with_client("https://app.bsub.io", "my-api-key", http_client);
    /// ```
    pub fn with_client(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        client: Client,
    ) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        }
    }

    /// Get the base URL of the service
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.client
            .get(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.api_key)
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.client
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.api_key)
    }

    fn delete(&self, path: &str) -> RequestBuilder {
        self.client
            .delete(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.api_key)
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Handle an API response and deserialize JSON
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let response = check_status(response).await?;

        response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }

    /// Handle an API response wrapped in a `{ "data": ... }` envelope
    async fn handle_data<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let envelope: Envelope<T> = self.handle_response(response).await?;
        unwrap_data(envelope)
    }

    /// Handle an API response whose body is returned verbatim
    async fn handle_bytes(&self, response: reqwest::Response) -> Result<Vec<u8>> {
        let response = check_status(response).await?;
        Ok(response.bytes().await?.to_vec())
    }

    /// Handle an API response that returns no content (e.g., DELETE operations)
    async fn handle_empty_response(&self, response: reqwest::Response) -> Result<()> {
        check_status(response).await.map(|_| ())
    }
}

/// Take the payload out of a `{ "data": ... }` envelope
fn unwrap_data<T>(envelope: Envelope<T>) -> Result<T> {
    envelope
        .data
        .ok_or_else(|| ClientError::ParseError("unexpected response format".to_string()))
}

/// Turn a non-success status into an API error carrying the response body
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();

    if !status.is_success() {
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(ClientError::api_error(status.as_u16(), error_text));
    }

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bsub_core::domain::job::{Job, JobStatus};
    use bsub_core::dto::job::JobFilter;

    #[test]
    fn test_client_creation() {
        let client = BsubClient::new("https://app.bsub.io", "key");
        assert_eq!(client.base_url(), "https://app.bsub.io");
    }

    #[test]
    fn test_client_trims_trailing_slash() {
        let client = BsubClient::new("https://app.bsub.io/", "key");
        assert_eq!(client.base_url(), "https://app.bsub.io");
    }

    #[test]
    fn test_client_with_custom_client() {
        let http_client = Client::new();
        let client = BsubClient::with_client("https://app.bsub.io", "key", http_client);
        assert_eq!(client.base_url(), "https://app.bsub.io");
    }

    #[test]
    fn test_envelope_without_data_is_parse_error() {
        let envelope: Envelope<Job> = serde_json::from_str(r#"{"error":"oops"}"#).unwrap();
        assert!(matches!(unwrap_data(envelope), Err(ClientError::ParseError(_))));

        let envelope: Envelope<Job> = serde_json::from_str(
            r#"{"data":{"id":"7f1c9a3e-2b4d-4c8e-9f10-1a2b3c4d5e6f","status":"claimed"}}"#,
        )
        .unwrap();
        let job = unwrap_data(envelope).unwrap();
        assert_eq!(job.status, JobStatus::Claimed);
    }

    #[test]
    fn test_job_filter_query_string() {
        let client = BsubClient::new("https://app.bsub.io", "key");
        let filter = JobFilter {
            status: Some(JobStatus::Pending),
            limit: Some(20),
        };

        let request = client.get("/v1/jobs").query(&filter).build().unwrap();
        assert_eq!(request.url().path(), "/v1/jobs");
        assert_eq!(request.url().query(), Some("status=pending&limit=20"));

        let request = client
            .get("/v1/jobs")
            .query(&JobFilter::default())
            .build()
            .unwrap();
        assert_eq!(request.url().query(), None);
    }
}
