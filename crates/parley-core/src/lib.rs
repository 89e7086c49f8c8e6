//! # parley-core
//!
//! Core crate for the Parley communication hub. Contains configuration
//! schemas, typed identifiers, the collaborator traits the hub consumes
//! (room authorization, message persistence, user directory), and the
//! unified error system.
//!
//! This crate has **no** internal dependencies on other Parley crates.

pub mod config;
pub mod error;
pub mod result;
pub mod traits;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
