//! WebSocket connection management — handles, pool, and the registry.

pub mod handle;
pub mod pool;
pub mod registry;

pub use handle::{ConnectionHandle, ConnectionInfo, SendOutcome};
pub use registry::{ConnectionRegistry, Registration};
