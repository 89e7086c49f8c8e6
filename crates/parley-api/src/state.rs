//! Application state shared across all handlers.

use std::sync::Arc;
use std::time::Instant;

use parley_auth::jwt::decoder::JwtDecoder;
use parley_core::config::AppConfig;
use parley_realtime::HubEngine;

/// Application state containing all shared dependencies.
///
/// Passed to every Axum handler via `State<AppState>`.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<AppConfig>,
    /// Real-time hub
    pub hub: Arc<HubEngine>,
    /// Handshake token verifier
    pub jwt_decoder: Arc<JwtDecoder>,
    /// Process start, for uptime reporting
    pub started_at: Instant,
}

impl AppState {
    /// Builds state around an existing hub.
    pub fn new(config: AppConfig, hub: Arc<HubEngine>) -> Self {
        let jwt_decoder = Arc::new(JwtDecoder::new(&config.auth));
        Self {
            config: Arc::new(config),
            hub,
            jwt_decoder,
            started_at: Instant::now(),
        }
    }
}
