//! Health check endpoints

use axum::{extract::State, response::Json, routing::get, Router};
use serde::Serialize;

use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    credential_configured: bool,
    refresh_running: bool,
}

/// Health check handler
///
/// Reports `degraded` while no provider credential is configured, since every
/// refresh will fail with `API_KEY_MISSING`.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = if state.credential_configured {
        "healthy"
    } else {
        "degraded"
    };

    Json(HealthResponse {
        status: status.to_string(),
        credential_configured: state.credential_configured,
        refresh_running: state.refresh_service.is_running(),
    })
}

/// Simple liveness check (always returns OK if server is running)
async fn liveness() -> &'static str {
    "OK"
}

/// Create health routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/health/live", get(liveness))
}
