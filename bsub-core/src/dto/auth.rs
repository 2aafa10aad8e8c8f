//! Device authorization DTOs
//!
//! Fixed wire contract of `/v1/auth/device/code` and `/v1/auth/device/token`.

use serde::{Deserialize, Serialize};

use crate::domain::auth::UserInfo;

/// Body of `POST /v1/auth/device/code`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceCodeRequest {
    pub hostname: String,
}

/// Successful reply of `POST /v1/auth/device/code`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceCodeResponse {
    pub device_code: String,
    pub user_code: String,
    pub verification_uri: String,
    #[serde(default)]
    pub expires_in: u64,
    #[serde(default)]
    pub interval: u64,
}

/// Body of `POST /v1/auth/device/token`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceTokenRequest {
    pub device_code: String,
    pub user_code: String,
}

/// HTTP 200 reply of `POST /v1/auth/device/token`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceTokenResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub user: UserInfo,
}

/// HTTP 429 reply of `POST /v1/auth/device/token`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SlowDown {
    #[serde(default)]
    pub interval: i64,
}
