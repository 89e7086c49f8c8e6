//! # parley-api
//!
//! HTTP layer for Parley built on Axum.
//!
//! Provides the authenticated WebSocket upgrade that feeds the hub, the
//! health endpoints, CORS and request tracing, HTTP-backed collaborators,
//! and error mapping.

pub mod app;
pub mod collaborators;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;

pub use app::{build_app, init_logging, run_server};
pub use state::AppState;
