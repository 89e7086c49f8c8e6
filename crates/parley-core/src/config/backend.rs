//! External collaborator configuration.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which implementation backs room authorization, persistence, and the
/// user directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendProvider {
    /// In-process static membership (development and tests).
    #[default]
    Memory,
    /// The application backend over HTTP.
    Http,
}

/// Collaborator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Provider selection.
    #[serde(default)]
    pub provider: BackendProvider,
    /// Base URL of the application backend (`http` provider).
    #[serde(default)]
    pub base_url: String,
    /// Bearer token presented to the backend (`http` provider).
    #[serde(default)]
    pub api_key: String,
    /// Request timeout in milliseconds (`http` provider).
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Static room membership: room id → member user ids (`memory` provider).
    #[serde(default)]
    pub rooms: HashMap<String, Vec<Uuid>>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            provider: BackendProvider::default(),
            base_url: String::new(),
            api_key: String::new(),
            timeout_ms: default_timeout_ms(),
            rooms: HashMap::new(),
        }
    }
}

fn default_timeout_ms() -> u64 {
    3000
}
