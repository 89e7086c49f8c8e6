//! Application configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section.

pub mod app;
pub mod auth;
pub mod backend;
pub mod hub;
pub mod logging;

use serde::{Deserialize, Serialize};

pub use self::app::ServerConfig;
pub use self::auth::AuthConfig;
pub use self::backend::{BackendConfig, BackendProvider};
pub use self::hub::HubConfig;
pub use self::logging::LoggingConfig;

use crate::error::AppError;

/// Root application configuration.
///
/// This struct is the top-level deserialization target for the merged
/// TOML configuration files (default.toml + environment overlay).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Token verification settings.
    #[serde(default)]
    pub auth: AuthConfig,
    /// Hub (rooms, relay, calls, heartbeat) settings.
    #[serde(default)]
    pub hub: HubConfig,
    /// External collaborator settings.
    #[serde(default)]
    pub backend: BackendConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from TOML files.
    ///
    /// Merges `config/default.toml` with an environment-specific overlay
    /// (`config/{env}.toml`) and environment variables prefixed with
    /// `PARLEY__` (e.g. `PARLEY__HUB__RING_TIMEOUT_SECONDS=30`).
    pub fn load(env: &str) -> Result<Self, AppError> {
        Self::load_from("config", env)
    }

    /// Load configuration from an explicit directory.
    pub fn load_from(dir: &str, env: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(&format!("{dir}/default")).required(false))
            .add_source(config::File::with_name(&format!("{dir}/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("PARLEY")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        let parsed: Self = config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))?;

        parsed.validate()?;
        Ok(parsed)
    }

    /// Reject settings the hub cannot run with.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.hub.heartbeat_interval_seconds == 0 {
            return Err(AppError::configuration(
                "hub.heartbeat_interval_seconds must be greater than zero",
            ));
        }
        if self.hub.heartbeat_miss_limit == 0 {
            return Err(AppError::configuration(
                "hub.heartbeat_miss_limit must be greater than zero",
            ));
        }
        if self.hub.outbound_buffer_size == 0 {
            return Err(AppError::configuration(
                "hub.outbound_buffer_size must be greater than zero",
            ));
        }
        if self.hub.max_message_bytes == 0 {
            return Err(AppError::configuration(
                "hub.max_message_bytes must be greater than zero",
            ));
        }
        if self.hub.max_frame_bytes <= self.hub.max_message_bytes {
            return Err(AppError::configuration(
                "hub.max_frame_bytes must be greater than hub.max_message_bytes",
            ));
        }
        if self.hub.max_transport_frame_bytes <= self.hub.max_frame_bytes {
            return Err(AppError::configuration(
                "hub.max_transport_frame_bytes must be greater than hub.max_frame_bytes",
            ));
        }
        if self.backend.provider == BackendProvider::Http && self.backend.base_url.is_empty() {
            return Err(AppError::configuration(
                "backend.base_url is required when backend.provider = \"http\"",
            ));
        }
        Ok(())
    }
}
