//! Collaborator traits defined in `parley-core` and implemented by other crates.
//!
//! The hub owns no durable state: membership checks, message persistence,
//! and display-name lookups are delegated through these seams.

pub mod authorizer;
pub mod directory;
pub mod persister;

pub use authorizer::RoomAuthorizer;
pub use directory::{UserDirectory, UserDisplayInfo};
pub use persister::{MessagePersister, PersistMessage};
