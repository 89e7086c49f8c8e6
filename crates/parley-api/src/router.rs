//! Route definitions for the Parley HTTP surface.
//!
//! Health endpoints are mounted under `/api`; the WebSocket upgrade lives
//! at `/ws`.

use axum::Router;
use axum::routing::get;

use crate::handlers;
use crate::state::AppState;

/// Build the router and thread `AppState` through every route.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .nest("/api", health_routes())
        .route("/ws", get(handlers::ws::ws_upgrade))
        .with_state(state)
}

/// Health check endpoints (no auth required)
fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/health/detailed", get(handlers::health::health_detailed))
}
