//! JWT claims, verification, and minting.

pub mod claims;
pub mod decoder;
pub mod encoder;

pub use claims::{AuthenticatedUser, Claims};
pub use decoder::JwtDecoder;
pub use encoder::JwtEncoder;
