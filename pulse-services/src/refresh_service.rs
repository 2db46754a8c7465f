//! Refresh orchestration for market signals
//!
//! This service owns the refresh state and runs acquisition cycles against a
//! [`SignalProvider`]: single-flight start, countdown feedback, error
//! classification, merge, completion notification, and progress updates via
//! a broadcast channel.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use pulse_core::{
    AcquisitionError, AssetSymbol, ErrorDescriptor, RefreshState, SignalBoard, SignalSlot,
};
use pulse_intel::{ResponseClassifier, SignalBatch, SignalProvider};
use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, instrument, warn};

use crate::config::RefreshConfig;
use crate::countdown::Countdown;
use crate::merge::merge_signals;
use crate::notifier::{
    completion_body, NotificationPermission, Notifier, PermissionDenied, NOTIFICATION_TITLE,
};

/// Terminal result of a refresh request
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    Completed { count: usize },
    Failed(AcquisitionError),
    /// Another cycle was in flight; nothing was started
    AlreadyRunning,
}

/// Progress events broadcast to subscribers
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RefreshUpdate {
    CycleStarted { estimate_secs: u32 },
    Countdown { remaining_secs: u32 },
    Completed { count: usize, synced_at: DateTime<Utc> },
    Failed { error: ErrorDescriptor },
}

/// Caller-facing view of the refresh state
#[derive(Debug, Clone, Serialize)]
pub struct RefreshSnapshot {
    #[serde(flatten)]
    pub state: RefreshState,
    pub last_sync_display: Option<String>,
    pub countdown_secs: u32,
    pub scan_duration_secs: u32,
    pub notifications_enabled: bool,
}

/// Service coordinating refresh cycles
pub struct RefreshService {
    provider: Arc<dyn SignalProvider>,
    classifier: ResponseClassifier,
    notifier: Arc<dyn Notifier>,
    config: RefreshConfig,
    state: RwLock<RefreshState>,
    countdown: Countdown,
    /// Session-scoped; not persisted across restarts
    notifications_enabled: AtomicBool,
    update_tx: broadcast::Sender<RefreshUpdate>,
}

impl RefreshService {
    pub fn new(
        provider: Arc<dyn SignalProvider>,
        notifier: Arc<dyn Notifier>,
        classifier: ResponseClassifier,
        config: RefreshConfig,
    ) -> Self {
        let (update_tx, _) = broadcast::channel(100);

        Self {
            provider,
            classifier,
            notifier,
            config,
            state: RwLock::new(RefreshState::new()),
            countdown: Countdown::new(),
            notifications_enabled: AtomicBool::new(false),
            update_tx,
        }
    }

    /// Subscribe to refresh updates
    pub fn subscribe(&self) -> broadcast::Receiver<RefreshUpdate> {
        self.update_tx.subscribe()
    }

    /// Watch the countdown value
    pub fn countdown(&self) -> watch::Receiver<u32> {
        self.countdown.subscribe()
    }

    pub fn state(&self) -> RefreshState {
        self.state.read().clone()
    }

    pub fn snapshot(&self) -> RefreshSnapshot {
        let state = self.state();
        RefreshSnapshot {
            last_sync_display: state.last_sync_display(),
            state,
            countdown_secs: self.countdown.remaining(),
            scan_duration_secs: self.config.scan_duration_secs,
            notifications_enabled: self.notifications_enabled(),
        }
    }

    pub fn signal(&self, symbol: AssetSymbol) -> SignalSlot {
        self.state.read().signals.get(symbol).clone()
    }

    pub fn is_running(&self) -> bool {
        self.state.read().loading
    }

    pub fn notifications_enabled(&self) -> bool {
        self.notifications_enabled.load(Ordering::SeqCst)
    }

    /// Toggle completion notifications for this session.
    ///
    /// Enabling asks the notifier for permission and fails if it is denied.
    pub async fn set_notifications(&self, enabled: bool) -> Result<(), PermissionDenied> {
        if enabled && self.notifier.request_permission().await != NotificationPermission::Granted {
            warn!("Notification permission denied");
            return Err(PermissionDenied);
        }

        self.notifications_enabled.store(enabled, Ordering::SeqCst);
        info!("Notifications {}", if enabled { "enabled" } else { "disabled" });
        Ok(())
    }

    /// Run one refresh cycle to completion.
    ///
    /// Returns [`RefreshOutcome::AlreadyRunning`] immediately when a cycle is in
    /// flight.
    pub async fn refresh(&self) -> RefreshOutcome {
        match self.claim_cycle() {
            Some(snapshot) => self.run_cycle(snapshot).await,
            None => RefreshOutcome::AlreadyRunning,
        }
    }

    /// Start a cycle on a background task.
    ///
    /// Returns `false` when a cycle is already in flight. The cycle is claimed
    /// before this returns, so a `true` result always means this call owns it.
    pub fn spawn_refresh(self: &Arc<Self>) -> bool {
        let Some(snapshot) = self.claim_cycle() else {
            return false;
        };

        let service = Arc::clone(self);
        tokio::spawn(async move {
            service.run_cycle(snapshot).await;
        });
        true
    }

    /// Refresh now and then every `interval`.
    ///
    /// Ticks that land while a cycle is still running are skipped.
    pub fn spawn_periodic(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let service = Arc::clone(self);
        tokio::spawn(async move {
            info!("Periodic refresh every {:?}", interval);
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;
                if service.refresh().await == RefreshOutcome::AlreadyRunning {
                    info!("Skipping scheduled refresh, a cycle is already running");
                }
            }
        })
    }

    /// Cancel timing feedback; used on teardown
    pub fn shutdown(&self) {
        self.countdown.stop();
    }

    /// Enter `Running` and snapshot the board the merge will build on
    fn claim_cycle(&self) -> Option<SignalBoard> {
        let mut state = self.state.write();
        if !state.begin_cycle() {
            info!("Refresh already in flight, ignoring start request");
            return None;
        }
        Some(state.signals.clone())
    }

    #[instrument(skip(self, snapshot))]
    async fn run_cycle(&self, snapshot: SignalBoard) -> RefreshOutcome {
        let mut guard = CycleGuard {
            service: self,
            settled: false,
        };

        self.countdown.start(self.config.scan_duration_secs);
        let _ = self.update_tx.send(RefreshUpdate::CycleStarted {
            estimate_secs: self.config.scan_duration_secs,
        });
        info!("Refresh cycle started");

        let result = self.acquire().await;
        self.countdown.stop();

        let outcome = match result {
            Ok(batch) => {
                let count = batch.len();
                let synced_at = Utc::now();
                let merged = merge_signals(&snapshot, &batch, synced_at);

                self.state.write().complete_cycle(merged, synced_at);
                guard.settled = true;

                info!("Refresh cycle completed with {} signals", count);
                let _ = self
                    .update_tx
                    .send(RefreshUpdate::Completed { count, synced_at });

                self.notify_completion(count).await;
                RefreshOutcome::Completed { count }
            }
            Err(err) => {
                self.state.write().fail_cycle(&err);
                guard.settled = true;

                warn!("Refresh cycle failed: {}", err);
                let _ = self.update_tx.send(RefreshUpdate::Failed {
                    error: ErrorDescriptor::from(&err),
                });
                RefreshOutcome::Failed(err)
            }
        };

        drop(guard);
        outcome
    }

    /// Bounded acquisition with classification at the boundary
    async fn acquire(&self) -> Result<SignalBatch, AcquisitionError> {
        let timeout = self.config.acquisition_timeout;
        match tokio::time::timeout(timeout, self.provider.acquire_signals()).await {
            Ok(Ok(batch)) => Ok(batch),
            Ok(Err(err)) => Err(self.classifier.classify(err)),
            Err(_) => Err(AcquisitionError::Timeout(timeout.as_secs())),
        }
    }

    async fn notify_completion(&self, count: usize) {
        if !self.notifications_enabled() {
            return;
        }
        if self.notifier.permission() != NotificationPermission::Granted {
            warn!("Notifications enabled but permission is no longer granted");
            return;
        }

        if let Err(e) = self
            .notifier
            .notify(NOTIFICATION_TITLE, &completion_body(count))
            .await
        {
            error!("Failed to deliver notification: {}", e);
        }
    }
}

/// Ends the cycle if its future is dropped before settling
struct CycleGuard<'a> {
    service: &'a RefreshService,
    settled: bool,
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        // A settled cycle already stopped its countdown; a newer cycle may own it now
        if self.settled {
            return;
        }

        self.service.countdown.stop();
        let err = AcquisitionError::unclassified("Refresh cycle cancelled before completion");
        warn!("{}", err);
        self.service.state.write().fail_cycle(&err);
        let _ = self.service.update_tx.send(RefreshUpdate::Failed {
            error: ErrorDescriptor::from(&err),
        });
    }
}

impl Drop for RefreshService {
    fn drop(&mut self) {
        self.countdown.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use pulse_core::{CitationSource, ErrorKind, PulseError, SignalType, PRICE_UNAVAILABLE};
    use pulse_intel::{ProviderError, SignalReport};
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    /// Provider replaying scripted results, optionally held at a gate
    #[derive(Default)]
    struct ScriptedProvider {
        results: Mutex<VecDeque<Result<SignalBatch, ProviderError>>>,
        calls: AtomicUsize,
        entered: Notify,
        gate: Option<Notify>,
        delay: Option<Duration>,
    }

    impl ScriptedProvider {
        fn with(results: Vec<Result<SignalBatch, ProviderError>>) -> Self {
            Self {
                results: Mutex::new(results.into()),
                ..Self::default()
            }
        }

        fn gated(mut self) -> Self {
            self.gate = Some(Notify::new());
            self
        }

        fn delayed(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        fn release(&self) {
            if let Some(gate) = &self.gate {
                gate.notify_one();
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SignalProvider for ScriptedProvider {
        async fn acquire_signals(&self) -> Result<SignalBatch, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.entered.notify_one();

            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            self.results
                .lock()
                .pop_front()
                .unwrap_or(Err(ProviderError::EmptyResponse))
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        deny: bool,
        sent: Mutex<Vec<(String, String)>>,
        entered: Notify,
        gate: Option<Notify>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        fn permission(&self) -> NotificationPermission {
            if self.deny {
                NotificationPermission::Denied
            } else {
                NotificationPermission::Granted
            }
        }

        async fn notify(&self, title: &str, body: &str) -> Result<(), PulseError> {
            self.entered.notify_one();
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            self.sent.lock().push((title.to_string(), body.to_string()));
            Ok(())
        }
    }

    fn report(symbol: &str, signal: SignalType) -> SignalReport {
        SignalReport {
            symbol: symbol.to_string(),
            signal,
            last_price: PRICE_UNAVAILABLE.to_string(),
            technical_summary: "t".to_string(),
            fundamental_summary: "f".to_string(),
            justification: String::new(),
        }
    }

    fn batch(reports: Vec<SignalReport>) -> SignalBatch {
        SignalBatch {
            reports,
            sources: vec![CitationSource {
                title: "Investing.com".to_string(),
                uri: "https://www.investing.com".to_string(),
            }],
        }
    }

    fn service_with(
        provider: Arc<ScriptedProvider>,
        notifier: Arc<RecordingNotifier>,
    ) -> Arc<RefreshService> {
        Arc::new(RefreshService::new(
            provider,
            notifier,
            ResponseClassifier::default(),
            RefreshConfig {
                scan_duration_secs: 60,
                acquisition_timeout: Duration::from_secs(5),
            },
        ))
    }

    fn assert_idle(service: &RefreshService) {
        assert!(!service.is_running());
        assert_eq!(service.snapshot().countdown_secs, 0);
        assert_eq!(service.state().signals.len(), AssetSymbol::ALL.len());
    }

    #[tokio::test]
    async fn test_successful_cycle_merges_batch() {
        let provider = Arc::new(ScriptedProvider::with(vec![Ok(batch(vec![report(
            "XAUUSD",
            SignalType::Buy,
        )]))]));
        let service = service_with(provider.clone(), Arc::default());

        let outcome = service.refresh().await;
        assert_eq!(outcome, RefreshOutcome::Completed { count: 1 });

        let state = service.state();
        assert_eq!(
            state.signals.get(AssetSymbol::Xauusd).as_signal().map(|s| s.signal),
            Some(SignalType::Buy)
        );
        assert_eq!(state.signals.get(AssetSymbol::Eurusd), &SignalSlot::Absent);
        assert!(state.error.is_none());
        assert!(state.last_sync.is_some());
        assert_eq!(provider.calls(), 1);
        assert_idle(&service);
    }

    #[tokio::test]
    async fn test_failed_cycle_keeps_previous_board() {
        let provider = Arc::new(ScriptedProvider::with(vec![
            Ok(batch(vec![
                report("XAUUSD", SignalType::Buy),
                report("GBPEUR", SignalType::Sell),
            ])),
            Err(ProviderError::MalformedResponse("expected value".to_string())),
        ]));
        let service = service_with(provider, Arc::default());

        service.refresh().await;
        let before = service.state();

        let outcome = service.refresh().await;
        assert!(matches!(
            outcome,
            RefreshOutcome::Failed(AcquisitionError::MalformedResponse(_))
        ));

        let after = service.state();
        assert_eq!(after.signals, before.signals);
        assert_eq!(after.last_sync, before.last_sync);
        assert_eq!(
            after.error.as_ref().map(|e| e.kind),
            Some(ErrorKind::MalformedResponse)
        );
        assert_idle(&service);
    }

    #[tokio::test]
    async fn test_rate_limit_error_is_classified() {
        let provider = Arc::new(ScriptedProvider::with(vec![Err(ProviderError::Transport(
            "HTTP 429 Too Many Requests".to_string(),
        ))]));
        let service = service_with(provider, Arc::default());

        let outcome = service.refresh().await;
        assert!(matches!(
            outcome,
            RefreshOutcome::Failed(AcquisitionError::RateLimited(_))
        ));
        let error = service.state().error.unwrap();
        assert!(error.message.contains("RATE_LIMITED"));
        assert!(error.retryable);
    }

    #[tokio::test]
    async fn test_success_clears_previous_error() {
        let provider = Arc::new(ScriptedProvider::with(vec![
            Err(ProviderError::CredentialMissing),
            Ok(batch(vec![report("EURUSD", SignalType::Neutral)])),
        ]));
        let service = service_with(provider, Arc::default());

        service.refresh().await;
        assert_eq!(
            service.state().error.map(|e| e.kind),
            Some(ErrorKind::CredentialMissing)
        );

        service.refresh().await;
        assert!(service.state().error.is_none());
    }

    #[tokio::test]
    async fn test_second_start_while_running_is_rejected() {
        let provider = Arc::new(
            ScriptedProvider::with(vec![Ok(batch(vec![report("EURUSD", SignalType::Sell)]))])
                .gated(),
        );
        let service = service_with(provider.clone(), Arc::default());

        let first = tokio::spawn({
            let service = Arc::clone(&service);
            async move { service.refresh().await }
        });
        provider.entered.notified().await;

        assert!(service.is_running());
        assert_eq!(service.refresh().await, RefreshOutcome::AlreadyRunning);
        assert!(!service.spawn_refresh());
        assert_eq!(provider.calls(), 1);

        provider.release();
        assert_eq!(first.await.unwrap(), RefreshOutcome::Completed { count: 1 });
        assert_eq!(provider.calls(), 1);
        assert_idle(&service);
    }

    #[tokio::test]
    async fn test_spawn_refresh_claims_cycle() {
        let provider = Arc::new(
            ScriptedProvider::with(vec![Ok(batch(vec![report("GBPUSD", SignalType::Buy)]))])
                .gated(),
        );
        let service = service_with(provider.clone(), Arc::default());
        let mut updates = service.subscribe();

        assert!(service.spawn_refresh());
        assert!(service.is_running(), "claimed before the task runs");
        assert!(!service.spawn_refresh());

        provider.entered.notified().await;
        provider.release();

        let mut completed = None;
        while let Ok(update) = updates.recv().await {
            if let RefreshUpdate::Completed { count, .. } = update {
                completed = Some(count);
                break;
            }
        }
        assert_eq!(completed, Some(1));
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquisition_timeout() {
        let provider = Arc::new(
            ScriptedProvider::with(vec![Ok(batch(vec![]))]).delayed(Duration::from_secs(30)),
        );
        let service = service_with(provider, Arc::default());

        let outcome = service.refresh().await;
        assert_eq!(outcome, RefreshOutcome::Failed(AcquisitionError::Timeout(5)));
        assert_eq!(
            service.state().error.map(|e| e.kind),
            Some(ErrorKind::Timeout)
        );
        assert_idle(&service);
    }

    #[tokio::test(start_paused = true)]
    async fn test_countdown_runs_during_cycle() {
        let provider = Arc::new(
            ScriptedProvider::with(vec![Ok(batch(vec![]))]).delayed(Duration::from_secs(3)),
        );
        let service = service_with(provider.clone(), Arc::default());
        let countdown = service.countdown();

        let cycle = tokio::spawn({
            let service = Arc::clone(&service);
            async move { service.refresh().await }
        });
        provider.entered.notified().await;
        tokio::time::sleep(Duration::from_millis(2_500)).await;

        let remaining = *countdown.borrow();
        assert_eq!(remaining, 58);

        cycle.await.unwrap();
        assert_eq!(*countdown.borrow(), 0);
        assert_idle(&service);
    }

    #[tokio::test]
    async fn test_cancelled_cycle_settles_as_failure() {
        let provider = Arc::new(ScriptedProvider::with(vec![]).gated());
        let service = service_with(provider.clone(), Arc::default());

        let cycle = tokio::spawn({
            let service = Arc::clone(&service);
            async move { service.refresh().await }
        });
        provider.entered.notified().await;

        cycle.abort();
        assert!(cycle.await.unwrap_err().is_cancelled());

        let state = service.state();
        assert!(!state.loading);
        assert_eq!(state.error.map(|e| e.kind), Some(ErrorKind::Unclassified));
        assert_idle(&service);
    }

    #[tokio::test]
    async fn test_notification_sent_when_enabled() {
        let provider = Arc::new(ScriptedProvider::with(vec![
            Ok(batch(vec![report("XAUUSD", SignalType::Buy)])),
            Ok(batch(vec![
                report("XAUUSD", SignalType::Sell),
                report("EURUSD", SignalType::Buy),
            ])),
        ]));
        let notifier = Arc::new(RecordingNotifier::default());
        let service = service_with(provider, notifier.clone());

        service.refresh().await;
        assert!(notifier.sent.lock().is_empty(), "disabled by default");

        service.set_notifications(true).await.unwrap();
        assert!(service.notifications_enabled());
        service.refresh().await;

        let sent = notifier.sent.lock().clone();
        assert_eq!(
            sent,
            vec![(
                NOTIFICATION_TITLE.to_string(),
                "Analysis complete. Found 2 fresh signals.".to_string()
            )]
        );
    }

    #[tokio::test]
    async fn test_slow_notification_keeps_next_cycle_countdown() {
        let provider = Arc::new(
            ScriptedProvider::with(vec![
                Ok(batch(vec![report("XAUUSD", SignalType::Buy)])),
                Ok(batch(vec![report("EURUSD", SignalType::Sell)])),
            ])
            .gated(),
        );
        // First acquisition passes straight through the gate
        provider.release();

        let notifier = Arc::new(RecordingNotifier {
            gate: Some(Notify::new()),
            ..RecordingNotifier::default()
        });
        let service = service_with(provider.clone(), notifier.clone());
        service.set_notifications(true).await.unwrap();

        let first = tokio::spawn({
            let service = Arc::clone(&service);
            async move { service.refresh().await }
        });

        // First cycle has settled and is stuck delivering its notification
        notifier.entered.notified().await;
        provider.entered.notified().await;
        assert!(!service.is_running());

        let mut updates = service.subscribe();
        assert!(service.spawn_refresh());
        provider.entered.notified().await;
        assert_eq!(provider.calls(), 2);

        if let Some(gate) = &notifier.gate {
            gate.notify_one();
        }
        assert_eq!(first.await.unwrap(), RefreshOutcome::Completed { count: 1 });

        assert!(service.is_running());
        let remaining = service.snapshot().countdown_secs;
        assert!(
            remaining > 0 && remaining <= 60,
            "second cycle lost its countdown: {}",
            remaining
        );

        provider.release();
        loop {
            if let RefreshUpdate::Completed { count, .. } = updates.recv().await.unwrap() {
                assert_eq!(count, 1);
                break;
            }
        }
        assert_eq!(service.snapshot().countdown_secs, 0);
    }

    #[tokio::test]
    async fn test_enabling_notifications_requires_permission() {
        let notifier = Arc::new(RecordingNotifier {
            deny: true,
            ..RecordingNotifier::default()
        });
        let provider = Arc::new(ScriptedProvider::with(vec![Ok(batch(vec![report(
            "XAUUSD",
            SignalType::Buy,
        )]))]));
        let service = service_with(provider, notifier.clone());

        assert!(service.set_notifications(true).await.is_err());
        assert!(!service.notifications_enabled());

        service.refresh().await;
        assert!(notifier.sent.lock().is_empty());

        assert!(service.set_notifications(false).await.is_ok());
    }

    #[tokio::test]
    async fn test_failure_broadcasts_descriptor() {
        let provider = Arc::new(ScriptedProvider::with(vec![Err(ProviderError::Http {
            status: 401,
            message: "Request had invalid authentication credentials".to_string(),
        })]));
        let service = service_with(provider, Arc::default());
        let mut updates = service.subscribe();

        service.refresh().await;

        assert!(matches!(
            updates.recv().await.unwrap(),
            RefreshUpdate::CycleStarted { estimate_secs: 60 }
        ));
        match updates.recv().await.unwrap() {
            RefreshUpdate::Failed { error } => {
                assert_eq!(error.kind, ErrorKind::InvalidCredential);
                assert!(!error.retryable);
            }
            other => panic!("unexpected update: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_snapshot_serializes_state_surface() {
        let provider = Arc::new(ScriptedProvider::with(vec![Ok(batch(vec![report(
            "GBPUSD",
            SignalType::StrongSell,
        )]))]));
        let service = service_with(provider, Arc::default());
        service.refresh().await;

        let json = serde_json::to_value(service.snapshot()).unwrap();
        assert_eq!(json["loading"], false);
        assert_eq!(json["countdown_secs"], 0);
        assert_eq!(json["scan_duration_secs"], 60);
        assert!(json["error"].is_null());
        assert!(json["last_sync_display"].is_string());
        assert_eq!(json["signals"]["GBPUSD"]["status"], "present");
        assert_eq!(json["signals"]["GBPUSD"]["signal"]["signal"], "STRONG_SELL");
        assert_eq!(json["signals"]["XAUUSD"]["status"], "absent");
    }
}
