//! Service layer for Forex Pulse
//!
//! This crate owns the refresh lifecycle: configuration, the countdown
//! estimate, merging acquired batches into the signal board, and completion
//! notifications.

pub mod config;
pub mod countdown;
pub mod merge;
pub mod notifier;
pub mod refresh_service;

pub use config::{PulseConfig, RefreshConfig, DEFAULT_SCAN_DURATION_SECS};
pub use countdown::Countdown;
pub use merge::merge_signals;
pub use notifier::{
    completion_body, LogNotifier, NotificationPermission, Notifier, PermissionDenied,
    WebhookNotifier, NOTIFICATION_TITLE,
};
pub use refresh_service::{RefreshOutcome, RefreshService, RefreshSnapshot, RefreshUpdate};
