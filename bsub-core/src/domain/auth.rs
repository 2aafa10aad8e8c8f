//! Device authorization domain types

use serde::{Deserialize, Serialize};

/// Identity of the user who approved the device
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

impl std::fmt::Display for UserInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} ({})", self.first_name, self.last_name, self.email)
    }
}

/// Credential issued once the user approves the device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authorization {
    pub api_key: String,
    pub user: UserInfo,
}
