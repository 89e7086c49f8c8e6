//! # parley-auth
//!
//! Adapter for the external identity service. The hub never handles
//! credentials: clients present a session token issued elsewhere, and this
//! crate verifies it and extracts the user identity the hub trusts.
//!
//! ## Modules
//!
//! - `jwt` — claims, verification, and dev token minting

pub mod jwt;

pub use jwt::{AuthenticatedUser, Claims, JwtDecoder, JwtEncoder};
