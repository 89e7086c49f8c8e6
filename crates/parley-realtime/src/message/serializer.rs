//! JSON framing for WebSocket text frames.

use parley_core::AppError;

use super::types::{InboundMessage, OutboundMessage};

/// Serialize an outbound event to a text frame.
pub fn serialize_outbound(msg: &OutboundMessage) -> Result<String, AppError> {
    Ok(serde_json::to_string(msg)?)
}

/// Parse an inbound text frame, enforcing the frame size limit.
///
/// Anything that is not a well-formed, known event is `INVALID_MESSAGE`.
pub fn deserialize_inbound(text: &str, max_frame_bytes: usize) -> Result<InboundMessage, AppError> {
    if text.len() > max_frame_bytes {
        return Err(AppError::invalid_message(format!(
            "Frame exceeds maximum size of {max_frame_bytes} bytes"
        )));
    }
    if text.trim().is_empty() {
        return Err(AppError::invalid_message("Empty frame"));
    }
    serde_json::from_str(text)
        .map_err(|e| AppError::invalid_message(format!("Malformed event: {e}")))
}
