//! JWT token minting for development and tests.
//!
//! Production tokens come from the identity service; this encoder signs
//! with the same shared secret so a local hub can be exercised end to end.

use chrono::Utc;
use jsonwebtoken::{EncodingKey, Header, encode};
use uuid::Uuid;

use parley_core::config::AuthConfig;
use parley_core::error::AppError;
use parley_core::types::UserId;

use super::claims::{Claims, TokenType};

/// Creates signed access tokens.
#[derive(Clone)]
pub struct JwtEncoder {
    /// HMAC secret key for signing.
    encoding_key: EncodingKey,
    /// Issuer claim to stamp, if configured.
    issuer: Option<String>,
    /// Default TTL in minutes.
    ttl_minutes: i64,
}

impl std::fmt::Debug for JwtEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtEncoder")
            .field("issuer", &self.issuer)
            .field("ttl_minutes", &self.ttl_minutes)
            .finish()
    }
}

impl JwtEncoder {
    /// Creates a new encoder from auth configuration.
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            issuer: (!config.issuer.is_empty()).then(|| config.issuer.clone()),
            ttl_minutes: config.dev_token_ttl_minutes as i64,
        }
    }

    /// Generates an access token with the configured TTL.
    pub fn generate_access_token(
        &self,
        user_id: UserId,
        username: &str,
    ) -> Result<(String, chrono::DateTime<Utc>), AppError> {
        self.generate_with_ttl(user_id, username, chrono::Duration::minutes(self.ttl_minutes))
    }

    /// Generates an access token expiring after `ttl`.
    pub fn generate_with_ttl(
        &self,
        user_id: UserId,
        username: &str,
        ttl: chrono::Duration,
    ) -> Result<(String, chrono::DateTime<Utc>), AppError> {
        let now = Utc::now();
        let exp = now + ttl;

        let claims = Claims {
            sub: user_id.into_uuid(),
            username: username.to_string(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
            jti: Uuid::new_v4(),
            iss: self.issuer.clone(),
            token_type: TokenType::Access,
        };

        let token = encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AppError::internal(format!("Failed to encode access token: {e}")))?;

        Ok((token, exp))
    }
}
