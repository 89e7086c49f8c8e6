//! Development token minting.

use clap::Args;
use serde::Serialize;
use tabled::Tabled;

use parley_auth::JwtEncoder;
use parley_core::config::AppConfig;
use parley_core::error::AppError;
use parley_core::types::UserId;

use crate::output::{self, OutputFormat};

/// Arguments for `token`
#[derive(Debug, Args)]
pub struct TokenArgs {
    /// Username embedded in the token
    #[arg(short, long)]
    pub username: String,

    /// User id; a random one is generated when omitted
    #[arg(long)]
    pub user_id: Option<UserId>,

    /// Lifetime in minutes (defaults to `auth.dev_token_ttl_minutes`)
    #[arg(long)]
    pub ttl_minutes: Option<i64>,
}

#[derive(Debug, Serialize, Tabled)]
struct TokenRow {
    /// User ID
    user_id: String,
    /// Username
    username: String,
    /// Expires
    expires_at: String,
    /// Token
    token: String,
}

/// Mint a token signed with the configured secret.
pub fn execute(args: &TokenArgs, config: &AppConfig, format: OutputFormat) -> Result<(), AppError> {
    if args.username.trim().is_empty() {
        return Err(AppError::invalid_message("username must not be empty"));
    }

    let user_id = args.user_id.unwrap_or_default();
    let encoder = JwtEncoder::new(&config.auth);
    let (token, expires_at) = match args.ttl_minutes {
        Some(minutes) if minutes <= 0 => {
            return Err(AppError::invalid_message("ttl-minutes must be positive"));
        }
        Some(minutes) => {
            encoder.generate_with_ttl(user_id, &args.username, chrono::Duration::minutes(minutes))?
        }
        None => encoder.generate_access_token(user_id, &args.username)?,
    };

    let row = TokenRow {
        user_id: user_id.to_string(),
        username: args.username.clone(),
        expires_at: expires_at.to_rfc3339(),
        token,
    };

    match format {
        OutputFormat::Json => output::print_item(&row, format),
        OutputFormat::Table => {
            output::print_kv("User ID", &row.user_id);
            output::print_kv("Username", &row.username);
            output::print_kv("Expires", &row.expires_at);
            println!();
            println!("{}", row.token);
        }
    }
    Ok(())
}
