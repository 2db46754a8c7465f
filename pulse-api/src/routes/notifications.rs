//! Notification preference endpoints

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::ErrorResponse;
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route(
        "/notifications",
        get(get_notifications).post(set_notifications),
    )
}

#[derive(Debug, Serialize, Deserialize)]
struct NotificationSettings {
    enabled: bool,
}

async fn get_notifications(State(state): State<AppState>) -> impl IntoResponse {
    Json(NotificationSettings {
        enabled: state.refresh_service.notifications_enabled(),
    })
}

/// Toggle completion notifications; enabling requires host permission
async fn set_notifications(
    State(state): State<AppState>,
    Json(settings): Json<NotificationSettings>,
) -> impl IntoResponse {
    match state.refresh_service.set_notifications(settings.enabled).await {
        Ok(()) => Json(NotificationSettings {
            enabled: state.refresh_service.notifications_enabled(),
        })
        .into_response(),
        Err(e) => (
            StatusCode::FORBIDDEN,
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )
            .into_response(),
    }
}
