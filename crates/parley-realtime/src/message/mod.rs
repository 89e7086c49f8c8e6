//! WebSocket wire protocol: event types, framing, and field validation.

pub mod serializer;
pub mod types;
pub mod validator;

pub use types::{InboundMessage, OutboundMessage};
