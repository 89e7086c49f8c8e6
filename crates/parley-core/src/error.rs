//! Unified application error types for Parley.
//!
//! Every hub operation returns [`AppError`]. The [`ErrorKind`] maps 1:1 to
//! the structured error codes sent back to the originating connection.

use std::fmt;
use thiserror::Error;

/// Top-level error kind categorization used across the entire hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    /// The caller is not allowed to perform the action (join, seen, call control).
    Forbidden,
    /// Message content or framing is invalid (empty, oversized, malformed).
    InvalidMessage,
    /// The operation is not legal in the current call or room state.
    InvalidState,
    /// The room, call, message, or target user is unknown.
    NotFound,
    /// The connection exceeded a burst limit.
    RateLimited,
    /// The connection handshake could not be authenticated.
    Unauthorized,
    /// A configuration error occurred.
    Configuration,
    /// A serialization/deserialization error occurred.
    Serialization,
    /// An external collaborator (authorization, persistence, directory) failed.
    ExternalService,
    /// An internal invariant was violated.
    Internal,
}

impl ErrorKind {
    /// Wire-level error code sent to clients.
    ///
    /// Infrastructure kinds collapse into `INTERNAL_ERROR`.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Forbidden => "FORBIDDEN",
            Self::InvalidMessage => "INVALID_MESSAGE",
            Self::InvalidState => "INVALID_STATE",
            Self::NotFound => "NOT_FOUND",
            Self::RateLimited => "RATE_LIMITED",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Configuration
            | Self::Serialization
            | Self::ExternalService
            | Self::Internal => "INTERNAL_ERROR",
        }
    }

    /// Whether this kind represents an infrastructure failure rather than a
    /// client mistake.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            Self::Configuration | Self::Serialization | Self::ExternalService | Self::Internal
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration => write!(f, "CONFIGURATION"),
            Self::Serialization => write!(f, "SERIALIZATION"),
            Self::ExternalService => write!(f, "EXTERNAL_SERVICE"),
            other => write!(f, "{}", other.code()),
        }
    }
}

/// The unified application error used throughout Parley.
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct AppError {
    /// The category of error.
    pub kind: ErrorKind,
    /// A human-readable error message.
    pub message: String,
    /// Optional underlying cause.
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    /// Create a new application error.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Create a new application error with an underlying cause.
    pub fn with_source(
        kind: ErrorKind,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a forbidden error.
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Forbidden, message)
    }

    /// Create an invalid-message error.
    pub fn invalid_message(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidMessage, message)
    }

    /// Create an invalid-state error.
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidState, message)
    }

    /// Create a not-found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// Create a rate-limited error.
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RateLimited, message)
    }

    /// Create an unauthorized error.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthorized, message)
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    /// Create an external-service error.
    pub fn external(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ExternalService, message)
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// Wire-level error code for this error.
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }
}

impl Clone for AppError {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            message: self.message.clone(),
            source: None,
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::with_source(
            ErrorKind::Serialization,
            format!("JSON serialization error: {err}"),
            err,
        )
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::with_source(ErrorKind::Internal, format!("I/O error: {err}"), err)
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::with_source(
            ErrorKind::Configuration,
            format!("Configuration error: {err}"),
            err,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_codes() {
        assert_eq!(AppError::forbidden("x").code(), "FORBIDDEN");
        assert_eq!(AppError::invalid_message("x").code(), "INVALID_MESSAGE");
        assert_eq!(AppError::invalid_state("x").code(), "INVALID_STATE");
        assert_eq!(AppError::not_found("x").code(), "NOT_FOUND");
        assert_eq!(AppError::rate_limited("x").code(), "RATE_LIMITED");
    }

    #[test]
    fn test_infrastructure_kinds_collapse_to_internal() {
        assert_eq!(AppError::external("down").code(), "INTERNAL_ERROR");
        assert_eq!(AppError::configuration("bad").code(), "INTERNAL_ERROR");
        assert!(ErrorKind::ExternalService.is_internal());
        assert!(!ErrorKind::Forbidden.is_internal());
    }

    #[test]
    fn test_display_includes_kind_and_message() {
        let err = AppError::external("directory timeout");
        assert_eq!(err.to_string(), "EXTERNAL_SERVICE: directory timeout");
    }

    #[test]
    fn test_json_error_maps_to_serialization() {
        let err: AppError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert_eq!(err.kind, ErrorKind::Serialization);
    }
}
