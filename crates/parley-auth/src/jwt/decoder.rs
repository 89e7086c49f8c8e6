//! JWT token validation.

use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};

use parley_core::config::AuthConfig;
use parley_core::error::AppError;

use super::claims::{AuthenticatedUser, Claims, TokenType};

/// Validates session tokens presented on the WebSocket handshake.
#[derive(Clone)]
pub struct JwtDecoder {
    /// HMAC secret key for verification.
    decoding_key: DecodingKey,
    /// Validation configuration.
    validation: Validation,
}

impl std::fmt::Debug for JwtDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtDecoder")
            .field("validation", &self.validation)
            .finish()
    }
}

impl JwtDecoder {
    /// Creates a new decoder from auth configuration.
    pub fn new(config: &AuthConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = config.leeway_seconds;
        if !config.issuer.is_empty() {
            validation.set_issuer(&[config.issuer.as_str()]);
        }

        Self {
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            validation,
        }
    }

    /// Decodes and validates an access token string.
    ///
    /// Checks signature, expiry, issuer (when configured), and that the
    /// token is an access token.
    pub fn decode_access_token(&self, token: &str) -> Result<Claims, AppError> {
        let token_data =
            decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
                match e.kind() {
                    jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                        AppError::unauthorized("Token has expired")
                    }
                    jsonwebtoken::errors::ErrorKind::InvalidToken => {
                        AppError::unauthorized("Invalid token format")
                    }
                    jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                        AppError::unauthorized("Invalid token signature")
                    }
                    jsonwebtoken::errors::ErrorKind::InvalidIssuer => {
                        AppError::unauthorized("Invalid token issuer")
                    }
                    _ => AppError::unauthorized(format!("Token validation failed: {e}")),
                }
            })?;

        let claims = token_data.claims;
        if claims.token_type != TokenType::Access {
            return Err(AppError::unauthorized(
                "Invalid token type: expected access token",
            ));
        }

        Ok(claims)
    }

    /// Verifies a token and returns the identity the hub will trust.
    pub fn authenticate(&self, token: &str) -> Result<AuthenticatedUser, AppError> {
        let claims = self.decode_access_token(token)?;
        tracing::debug!(user_id = %claims.sub, "Token verified");
        Ok(claims.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jwt::encoder::JwtEncoder;
    use parley_core::error::ErrorKind;
    use parley_core::types::UserId;

    fn config(secret: &str, issuer: &str) -> AuthConfig {
        AuthConfig {
            jwt_secret: secret.to_string(),
            issuer: issuer.to_string(),
            ..AuthConfig::default()
        }
    }

    #[test]
    fn test_roundtrip_identity() {
        let cfg = config("secret-a", "");
        let user_id = UserId::new();
        let (token, _) = JwtEncoder::new(&cfg)
            .generate_access_token(user_id, "alice")
            .unwrap();

        let user = JwtDecoder::new(&cfg).authenticate(&token).unwrap();
        assert_eq!(user.user_id, user_id);
        assert_eq!(user.username, "alice");
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let (token, _) = JwtEncoder::new(&config("secret-a", ""))
            .generate_access_token(UserId::new(), "alice")
            .unwrap();

        let err = JwtDecoder::new(&config("secret-b", ""))
            .authenticate(&token)
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Unauthorized);
    }

    #[test]
    fn test_expired_token_rejected() {
        let cfg = config("secret-a", "");
        let (token, _) = JwtEncoder::new(&cfg)
            .generate_with_ttl(UserId::new(), "alice", chrono::Duration::minutes(-10))
            .unwrap();

        let err = JwtDecoder::new(&cfg).authenticate(&token).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Unauthorized);
    }

    #[test]
    fn test_issuer_mismatch_rejected() {
        let (token, _) = JwtEncoder::new(&config("secret-a", "someone-else"))
            .generate_access_token(UserId::new(), "alice")
            .unwrap();

        let err = JwtDecoder::new(&config("secret-a", "identity.parley"))
            .authenticate(&token)
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Unauthorized);
    }

    #[test]
    fn test_garbage_rejected() {
        let err = JwtDecoder::new(&config("secret-a", ""))
            .authenticate("not-a-jwt")
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Unauthorized);
    }
}
