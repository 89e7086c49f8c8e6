//! In-process collaborator implementations.
//!
//! Used by the `memory` backend provider and throughout the tests.

pub mod memory;

pub use memory::{InMemoryPersister, StaticDirectory, StaticMembership};
