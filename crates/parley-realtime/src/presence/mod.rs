//! Presence and liveness — derived online state and the heartbeat monitor.

pub mod monitor;
pub mod tracker;

pub use monitor::run_monitor;
pub use tracker::{ExpiredConnection, ExpiryCause, PresenceSnapshot, PresenceTracker};
