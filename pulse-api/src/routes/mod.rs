//! API route definitions

mod health;
mod notifications;
mod signals;
pub mod ws;

use axum::Router;
use serde::Serialize;

use crate::AppState;

/// Error body shared by all JSON endpoints
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

/// Create all API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(signals::routes())
        .merge(notifications::routes())
        .merge(health::routes())
}

/// Create WebSocket routes (separate from API)
pub fn ws_routes() -> Router<AppState> {
    ws::routes()
}
