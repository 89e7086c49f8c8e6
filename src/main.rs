//! Parley server: real-time chat, presence, and call signaling hub.
//!
//! Loads layered configuration (`config/default.toml`, then
//! `config/$PARLEY_ENV.toml`, then `PARLEY__*` variables) and serves
//! until SIGINT/SIGTERM.

use parley_core::config::AppConfig;

#[tokio::main]
async fn main() {
    let env = std::env::var("PARLEY_ENV").unwrap_or_else(|_| "development".to_string());

    let config = match AppConfig::load(&env) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    parley_api::init_logging(&config.logging);
    tracing::info!(env = %env, "Configuration loaded");

    if let Err(e) = parley_api::run_server(config).await {
        tracing::error!(error = %e, "Server error");
        std::process::exit(1);
    }
}
