//! Device authorization endpoints
//!
//! These endpoints are called before an API key exists, so they live on a
//! separate, unauthenticated client.

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::error::{ClientError, Result};
use bsub_core::dto::auth::{DeviceCodeRequest, DeviceCodeResponse, DeviceTokenRequest};

/// Status code and body of a response, before any interpretation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

/// Device-flow operations offered by the service
#[async_trait]
pub trait DeviceAuthApi: Send + Sync {
    /// Request a new device code for this machine
    async fn request_device_code(&self, hostname: &str) -> Result<DeviceCodeResponse>;

    /// Ask whether the device code has been approved
    ///
    /// Every HTTP status is returned as data; only transport failures are errors.
    async fn poll_device_token(&self, request: &DeviceTokenRequest) -> Result<RawResponse>;
}

/// Unauthenticated HTTP client for the device-flow endpoints
#[derive(Debug, Clone)]
pub struct AuthClient {
    base_url: String,
    client: Client,
}

impl AuthClient {
    /// Create a new device-flow client
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Create a new device-flow client with a custom HTTP client
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Get the base URL of the service
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl DeviceAuthApi for AuthClient {
    async fn request_device_code(&self, hostname: &str) -> Result<DeviceCodeResponse> {
        let url = format!("{}/v1/auth/device/code", self.base_url);
        debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .json(&DeviceCodeRequest {
                hostname: hostname.to_string(),
            })
            .send()
            .await?;

        let status = response.status();
        debug!("Response status: {}", status);

        if status != reqwest::StatusCode::OK {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse device code: {}", e)))
    }

    async fn poll_device_token(&self, request: &DeviceTokenRequest) -> Result<RawResponse> {
        let url = format!("{}/v1/auth/device/token", self.base_url);
        debug!("POST {}", url);

        let response = self.client.post(&url).json(request).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        debug!("Response status: {}", status);

        Ok(RawResponse { status, body })
    }
}
