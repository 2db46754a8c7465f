//! Refresh state shared with the presentation layer

use chrono::{DateTime, Local, Utc};
use serde::Serialize;

use crate::error::{AcquisitionError, ErrorDescriptor};
use crate::signal::SignalBoard;

/// State of the refresh pipeline.
///
/// Owned by the refresh orchestrator; everything else sees clones.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RefreshState {
    pub signals: SignalBoard,
    pub loading: bool,
    pub last_sync: Option<DateTime<Utc>>,
    pub error: Option<ErrorDescriptor>,
}

impl RefreshState {
    pub fn new() -> Self {
        Self {
            signals: SignalBoard::new(),
            loading: false,
            last_sync: None,
            error: None,
        }
    }

    /// Enter the loading state.
    ///
    /// Returns `false` without touching anything when a cycle is already loading.
    pub fn begin_cycle(&mut self) -> bool {
        if self.loading {
            return false;
        }
        self.loading = true;
        self.error = None;
        true
    }

    /// Publish the merged board of a successful cycle
    pub fn complete_cycle(&mut self, signals: SignalBoard, synced_at: DateTime<Utc>) {
        self.signals = signals;
        self.loading = false;
        self.last_sync = Some(synced_at);
        self.error = None;
    }

    /// Record a failed cycle, leaving the signal board untouched
    pub fn fail_cycle(&mut self, error: &AcquisitionError) {
        self.loading = false;
        self.error = Some(ErrorDescriptor::from(error));
    }

    /// Wall-clock time of the last sync in the host's local zone
    pub fn last_sync_display(&self) -> Option<String> {
        self.last_sync
            .map(|at| at.with_timezone(&Local).format("%H:%M:%S").to_string())
    }
}

impl Default for RefreshState {
    fn default() -> Self {
        Self::new()
    }
}
