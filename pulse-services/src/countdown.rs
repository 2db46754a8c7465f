//! Countdown feedback for in-flight refresh cycles
//!
//! A single ticker task decrements a watch value once per second. The value is
//! only a time estimate for the caller and never influences the cycle itself.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

const TICK: Duration = Duration::from_secs(1);

/// Decrementing one-second countdown with at most one active ticker
#[derive(Debug)]
pub struct Countdown {
    value: Arc<watch::Sender<u32>>,
    /// Bumped on every start/stop so a superseded ticker cannot write
    generation: Arc<AtomicU64>,
    ticker: Mutex<Option<JoinHandle<()>>>,
}

impl Countdown {
    pub fn new() -> Self {
        let (value, _) = watch::channel(0);
        Self {
            value: Arc::new(value),
            generation: Arc::new(AtomicU64::new(0)),
            ticker: Mutex::new(None),
        }
    }

    /// Seconds left on the estimate
    pub fn remaining(&self) -> u32 {
        *self.value.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<u32> {
        self.value.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.ticker
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Start counting down from `duration_secs`, replacing any active ticker.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self, duration_secs: u32) {
        let mut ticker = self.ticker.lock();
        if let Some(previous) = ticker.take() {
            previous.abort();
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.value.send_replace(duration_secs);
        debug!("Countdown started at {}s", duration_secs);

        let value = Arc::clone(&self.value);
        let current = Arc::clone(&self.generation);
        *ticker = Some(tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + TICK, TICK);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                interval.tick().await;
                value.send_if_modified(|remaining| {
                    if current.load(Ordering::SeqCst) != generation || *remaining == 0 {
                        return false;
                    }
                    *remaining -= 1;
                    true
                });
            }
        }));
    }

    /// Halt ticking and reset to zero
    pub fn stop(&self) {
        let mut ticker = self.ticker.lock();
        if let Some(handle) = ticker.take() {
            handle.abort();
        }
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.value.send_replace(0);
    }
}

impl Default for Countdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Countdown {
    fn drop(&mut self) {
        if let Some(handle) = self.ticker.get_mut().take() {
            handle.abort();
        }
    }
}
