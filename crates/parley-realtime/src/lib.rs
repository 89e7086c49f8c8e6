//! # parley-realtime
//!
//! Real-time communication hub for Parley. Provides:
//!
//! - Connection registry with multi-device fan-out and bounded outbound queues
//! - Room manager with authorized joins and broadcast-except-sender
//! - Message relay with nonce idempotency, delivery/read status, typing indicators
//! - Call signaling state machine keyed by user pair, with ring timeouts
//! - Presence and heartbeat monitoring that reaps dead or stalled connections

pub mod call;
pub mod collab;
pub mod connection;
pub mod message;
pub mod metrics;
pub mod presence;
pub mod relay;
pub mod room;
pub mod server;

pub use call::CallSignaling;
pub use connection::ConnectionRegistry;
pub use presence::PresenceTracker;
pub use relay::MessageRelay;
pub use room::RoomManager;
pub use server::{Collaborators, HubEngine};
