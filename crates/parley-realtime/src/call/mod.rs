//! One-to-one call signaling.

pub mod session;
pub mod signaling;
pub mod state;

pub use session::{CallInfo, CallSession, PairKey};
pub use signaling::{AnswerOutcome, CallSignaling};
pub use state::{CallEndReason, CallEvent, CallState};
