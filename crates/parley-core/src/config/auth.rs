//! Token verification configuration.

use serde::{Deserialize, Serialize};

/// Settings for verifying the session tokens issued by the identity service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Shared secret for JWT verification (HMAC-SHA256).
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,
    /// Expected `iss` claim; empty disables the check.
    #[serde(default)]
    pub issuer: String,
    /// Clock skew leeway in seconds.
    #[serde(default = "default_leeway")]
    pub leeway_seconds: u64,
    /// TTL for tokens minted by the dev CLI, in minutes.
    #[serde(default = "default_dev_token_ttl")]
    pub dev_token_ttl_minutes: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: default_jwt_secret(),
            issuer: String::new(),
            leeway_seconds: default_leeway(),
            dev_token_ttl_minutes: default_dev_token_ttl(),
        }
    }
}

fn default_jwt_secret() -> String {
    "CHANGE_ME_IN_PRODUCTION".to_string()
}

fn default_leeway() -> u64 {
    5
}

fn default_dev_token_ttl() -> u64 {
    60
}
