//! Collaborator wiring for the configured backend provider.

pub mod http;

use std::sync::Arc;

use tracing::info;

use parley_core::AppResult;
use parley_core::config::{BackendConfig, BackendProvider};
use parley_realtime::Collaborators;
use parley_realtime::collab::{InMemoryPersister, StaticDirectory, StaticMembership};

pub use http::HttpBackend;

/// Builds the authorizer, persister, and directory for `config.provider`.
pub fn build_collaborators(config: &BackendConfig) -> AppResult<Collaborators> {
    match config.provider {
        BackendProvider::Memory => {
            let membership = StaticMembership::from_config(&config.rooms)?;
            info!(rooms = config.rooms.len(), "Using in-memory collaborators");
            Ok(Collaborators {
                authorizer: Arc::new(membership),
                persister: Arc::new(InMemoryPersister::new()),
                directory: Arc::new(StaticDirectory::new()),
            })
        }
        BackendProvider::Http => {
            let backend = Arc::new(HttpBackend::new(config)?);
            info!(base_url = %config.base_url, "Using HTTP collaborators");
            Ok(Collaborators {
                authorizer: backend.clone(),
                persister: backend.clone(),
                directory: backend,
            })
        }
    }
}
