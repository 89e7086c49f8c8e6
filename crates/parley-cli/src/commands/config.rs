//! Configuration management CLI commands.

use clap::{Args, Subcommand};

use parley_core::config::{AppConfig, BackendProvider};
use parley_core::error::AppError;

use super::Cli;
use crate::output::{self, OutputFormat};

/// Arguments for config commands
#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Config subcommand
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Config subcommands
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show the effective configuration (secrets masked)
    Show,
    /// Validate the configuration
    Validate,
}

/// Execute config commands
pub fn execute(args: &ConfigArgs, cli: &Cli, format: OutputFormat) -> Result<(), AppError> {
    match &args.command {
        ConfigCommand::Show => {
            let config = masked(cli.load_config()?);
            output::print_item(&config, format);
        }
        ConfigCommand::Validate => match cli.load_config() {
            Ok(config) => {
                output::print_success(&format!(
                    "Configuration '{}' ({}) is valid",
                    cli.config_dir,
                    cli.environment()
                ));
                output::print_kv("Listen", &config.server.bind_address());
                output::print_kv("Backend", backend_label(&config));
                output::print_kv(
                    "Max conns per user",
                    &config.hub.max_connections_per_user.to_string(),
                );
                output::print_kv(
                    "Ring timeout",
                    &format!("{}s", config.hub.ring_timeout_seconds),
                );
                output::print_kv(
                    "Heartbeat",
                    &format!(
                        "{}s x {}",
                        config.hub.heartbeat_interval_seconds, config.hub.heartbeat_miss_limit
                    ),
                );
                if config.auth.jwt_secret == AppConfig::default().auth.jwt_secret {
                    output::print_warning("auth.jwt_secret is the built-in default");
                }
            }
            Err(e) => {
                output::print_error(&format!("Configuration invalid: {e}"));
                return Err(e);
            }
        },
    }

    Ok(())
}

fn backend_label(config: &AppConfig) -> &'static str {
    match config.backend.provider {
        BackendProvider::Memory => "memory",
        BackendProvider::Http => "http",
    }
}

/// Replace secrets with a fixed mask for display.
fn masked(mut config: AppConfig) -> AppConfig {
    config.auth.jwt_secret = "****".to_string();
    if !config.backend.api_key.is_empty() {
        config.backend.api_key = "****".to_string();
    }
    config
}
