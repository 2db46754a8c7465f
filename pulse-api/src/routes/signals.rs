//! Signal state and refresh endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use pulse_core::{instruments, AssetSymbol};
use serde::Serialize;
use tracing::info;

use super::ErrorResponse;
use crate::AppState;

/// Create signal routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/state", get(get_state))
        .route("/instruments", get(list_instruments))
        .route("/signals/{symbol}", get(get_signal))
        .route("/refresh", post(start_refresh))
}

#[derive(Debug, Serialize)]
struct RefreshResponse {
    started: bool,
    loading: bool,
}

/// Full refresh state snapshot
async fn get_state(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.refresh_service.snapshot())
}

async fn list_instruments() -> impl IntoResponse {
    Json(instruments())
}

/// One symbol's slot, for the detail view
async fn get_signal(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> impl IntoResponse {
    let symbol: AssetSymbol = match symbol.parse() {
        Ok(symbol) => symbol,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    error: format!("Unknown symbol: {}", symbol),
                }),
            )
                .into_response();
        }
    };

    Json(state.refresh_service.signal(symbol)).into_response()
}

/// Start a refresh cycle in the background
async fn start_refresh(State(state): State<AppState>) -> impl IntoResponse {
    if state.refresh_service.spawn_refresh() {
        info!("Refresh started via API");
        (
            StatusCode::ACCEPTED,
            Json(RefreshResponse {
                started: true,
                loading: true,
            }),
        )
            .into_response()
    } else {
        (
            StatusCode::CONFLICT,
            Json(ErrorResponse {
                error: "A refresh is already running".to_string(),
            }),
        )
            .into_response()
    }
}
