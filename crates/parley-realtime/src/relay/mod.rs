//! Chat relay — messages, typing indicators, read receipts.

pub mod ledger;
pub mod rate_limit;
pub mod relay;
pub mod status;
pub mod typing;

pub use ledger::{MessageAck, MessageLedger, MessageRecord};
pub use rate_limit::RateLimiter;
pub use relay::MessageRelay;
pub use status::DeliveryStatus;
pub use typing::TypingTracker;
