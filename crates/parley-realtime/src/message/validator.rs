//! Field validation for chat events.

use parley_core::AppError;

/// Maximum client nonce length in characters.
pub const MAX_NONCE_LEN: usize = 64;

/// Validates chat content: non-blank and within the byte limit.
pub fn validate_content(content: &str, max_bytes: usize) -> Result<(), AppError> {
    if content.trim().is_empty() {
        return Err(AppError::invalid_message("Message content is empty"));
    }
    if content.len() > max_bytes {
        return Err(AppError::invalid_message(format!(
            "Message content exceeds {max_bytes} bytes"
        )));
    }
    Ok(())
}

/// Validates a client idempotency nonce.
pub fn validate_nonce(nonce: &str) -> Result<(), AppError> {
    if nonce.is_empty() || nonce.chars().count() > MAX_NONCE_LEN {
        return Err(AppError::invalid_message(format!(
            "Nonce must be 1..={MAX_NONCE_LEN} characters"
        )));
    }
    Ok(())
}
