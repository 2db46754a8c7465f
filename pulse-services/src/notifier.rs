//! Completion notifications delivered to the host

use async_trait::async_trait;
use pulse_core::PulseError;
use reqwest::Client;
use serde::Serialize;
use tracing::{info, instrument};

pub const NOTIFICATION_TITLE: &str = "Forex Pulse Update";

/// Body of the completion notification
pub fn completion_body(count: usize) -> String {
    format!("Analysis complete. Found {} fresh signals.", count)
}

/// Whether the host lets us deliver notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationPermission {
    Granted,
    Denied,
}

/// Returned when notifications are enabled without host permission
#[derive(Debug, Clone, thiserror::Error)]
#[error("Notification permission denied. Please enable it in the host settings.")]
pub struct PermissionDenied;

/// Delivery channel for one-shot notifications
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Current permission, without prompting
    fn permission(&self) -> NotificationPermission;

    /// Ask the host for permission; defaults to the current state
    async fn request_permission(&self) -> NotificationPermission {
        self.permission()
    }

    async fn notify(&self, title: &str, body: &str) -> Result<(), PulseError>;
}

/// Writes notifications to the log
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn permission(&self) -> NotificationPermission {
        NotificationPermission::Granted
    }

    async fn notify(&self, title: &str, body: &str) -> Result<(), PulseError> {
        info!("[NOTIFY] {}: {}", title, body);
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    title: &'a str,
    body: &'a str,
}

/// POSTs notifications as JSON to a configured URL
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Result<Self, PulseError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| PulseError::network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    fn permission(&self) -> NotificationPermission {
        NotificationPermission::Granted
    }

    #[instrument(skip(self, body))]
    async fn notify(&self, title: &str, body: &str) -> Result<(), PulseError> {
        let response = self
            .client
            .post(&self.url)
            .json(&WebhookPayload { title, body })
            .send()
            .await
            .map_err(|e| PulseError::network(format!("Webhook request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(PulseError::network(format!(
                "Webhook rejected notification ({})",
                response.status()
            )));
        }

        Ok(())
    }
}
