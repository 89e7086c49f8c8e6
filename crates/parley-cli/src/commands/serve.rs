//! Runs the hub server.

use parley_core::config::AppConfig;
use parley_core::error::AppError;

/// Start the server with logging configured from `[logging]`.
pub async fn execute(config: AppConfig) -> Result<(), AppError> {
    parley_api::init_logging(&config.logging);
    parley_api::run_server(config).await
}
