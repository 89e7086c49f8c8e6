//! CLI command definitions and dispatch.

pub mod config;
pub mod serve;
pub mod status;
pub mod token;

use clap::{Parser, Subcommand};

use parley_core::config::AppConfig;
use parley_core::error::AppError;

use crate::output::OutputFormat;

/// Parley real-time communication hub
#[derive(Debug, Parser)]
#[command(name = "parley", version, about, long_about = None)]
pub struct Cli {
    /// Directory holding `default.toml` and environment overlays
    #[arg(short, long, default_value = "config")]
    pub config_dir: String,

    /// Environment overlay to load (falls back to `PARLEY_ENV`, then `development`)
    #[arg(short, long)]
    pub env: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start the hub server
    Serve,
    /// Mint a development access token
    Token(token::TokenArgs),
    /// Configuration management
    Config(config::ConfigArgs),
    /// Show live counts from a running hub
    Status(status::StatusArgs),
}

impl Cli {
    /// Whether this invocation runs the server, which installs its own
    /// logging from configuration.
    pub fn is_serve(&self) -> bool {
        matches!(self.command, Commands::Serve)
    }

    /// Execute the CLI command
    pub async fn execute(&self) -> Result<(), AppError> {
        match &self.command {
            Commands::Serve => serve::execute(self.load_config()?).await,
            Commands::Token(args) => token::execute(args, &self.load_config()?, self.format),
            Commands::Config(args) => config::execute(args, self, self.format),
            Commands::Status(args) => status::execute(args, self.format).await,
        }
    }

    /// Resolved environment name.
    pub fn environment(&self) -> String {
        self.env
            .clone()
            .or_else(|| std::env::var("PARLEY_ENV").ok())
            .unwrap_or_else(|| "development".to_string())
    }

    /// Load configuration for the selected directory and environment.
    pub fn load_config(&self) -> Result<AppConfig, AppError> {
        AppConfig::load_from(&self.config_dir, &self.environment())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_token_command() {
        let cli = Cli::try_parse_from([
            "parley",
            "--env",
            "test",
            "token",
            "--username",
            "alice",
        ])
        .unwrap();
        assert_eq!(cli.environment(), "test");
        assert!(!cli.is_serve());
        match cli.command {
            Commands::Token(args) => assert_eq!(args.username, "alice"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_serve_flag() {
        let cli = Cli::try_parse_from(["parley", "serve"]).unwrap();
        assert!(cli.is_serve());
        assert_eq!(cli.config_dir, "config");
    }
}
