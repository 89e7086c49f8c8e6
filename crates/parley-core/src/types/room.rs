//! Room (conversation thread) identifier.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Maximum accepted room id length.
pub const MAX_ROOM_ID_LEN: usize = 128;

/// Externally assigned, opaque conversation identifier.
///
/// The hub never interprets the value; it only checks that it is a
/// reasonable key (non-empty, bounded, no whitespace or control characters).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    /// Validates and wraps a room id.
    pub fn parse(raw: impl Into<String>) -> Result<Self, AppError> {
        let raw = raw.into();
        if raw.is_empty() || raw.len() > MAX_ROOM_ID_LEN {
            return Err(AppError::invalid_message("Invalid room id length"));
        }
        if !raw
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, ':' | '-' | '_' | '.'))
        {
            return Err(AppError::invalid_message(
                "Room id contains invalid characters",
            ));
        }
        Ok(Self(raw))
    }

    /// Borrow the raw id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RoomId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
