//! Core type definitions used across the Parley workspace.

pub mod id;
pub mod room;

pub use id::*;
pub use room::RoomId;
