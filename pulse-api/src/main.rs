//! Forex Pulse API Server
//!
//! HTTP API server that runs grounded signal refresh cycles and exposes the
//! resulting state.

mod routes;

use axum::{
    http::{header, Method},
    Router,
};
use pulse_intel::{GeminiClient, ResponseClassifier};
use pulse_services::{LogNotifier, Notifier, PulseConfig, RefreshService, WebhookNotifier};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub refresh_service: Arc<RefreshService>,
    /// Whether a provider credential was found at startup
    pub credential_configured: bool,
}

/// Build the application router
pub fn app(state: AppState) -> Router {
    // Configure CORS for frontend
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        .nest("/api", routes::api_routes())
        .merge(routes::ws_routes())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env.local file
    if let Err(e) = dotenvy::from_filename(".env.local") {
        // Not an error if the file doesn't exist
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env.local: {}", e);
        }
    }

    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,pulse_api=debug")),
        )
        .init();

    info!("Starting Forex Pulse API");

    let config = PulseConfig::from_env()?;

    let client = GeminiClient::new(config.gemini.clone())?;
    let credential_configured = client.has_credential();
    if credential_configured {
        info!("Gemini credential found, using model {}", client.model());
    } else {
        warn!("No GEMINI_API_KEY set - refresh cycles will fail with API_KEY_MISSING");
    }

    let notifier: Arc<dyn Notifier> = match &config.notify_webhook_url {
        Some(url) => {
            info!("Completion notifications will be posted to {}", url);
            Arc::new(WebhookNotifier::new(url.clone())?)
        }
        None => Arc::new(LogNotifier),
    };

    let refresh_service = Arc::new(RefreshService::new(
        Arc::new(client),
        notifier,
        ResponseClassifier::new(config.classifier_rules.clone()),
        config.refresh.clone(),
    ));

    // Initial refresh on startup, then periodically if configured
    match config.refresh_interval {
        Some(interval) => {
            refresh_service.spawn_periodic(interval);
        }
        None => {
            refresh_service.spawn_refresh();
        }
    }

    let state = AppState {
        refresh_service: Arc::clone(&refresh_service),
        credential_configured,
    };

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    refresh_service.shutdown();
    info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
