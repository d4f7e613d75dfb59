//! Background polling.
//!
//! The [`Poller`] runs the [`ScanEngine`] on a fixed interval in a tokio task. Its running state is an explicit state
//! object owned by the poller, guarded by a single mutex that is only ever held for a few instructions, never across
//! an await point. `start`, `stop` and `status` are the only ways to change or observe it.
//!
//! Every call to `start` begins a new run generation. A polling loop only keeps going while the poller is active
//! *and* the generation it was started with is still current, so a loop left over from an earlier start/stop cycle
//! always exits, even if the poller has been restarted since.
use std::{
    fmt::Debug,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use log::*;
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;

use crate::{source::NotificationSource, traits::IngestionStore, zpe_api::scan_engine::ScanEngine};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_POLL_LOOKBACK_DAYS: u32 = 7;
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// The pause between the end of one scan and the start of the next.
    pub interval: Duration,
    pub lookback_days: u32,
    /// The pause before the first scan after the poller starts.
    pub initial_delay: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            lookback_days: DEFAULT_POLL_LOOKBACK_DAYS,
            initial_delay: DEFAULT_INITIAL_DELAY,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollerStatus {
    pub active: bool,
    pub interval_seconds: u64,
}

#[derive(Debug, Default)]
struct PollerState {
    active: bool,
    generation: u64,
}

/// The state shared between the poller and its polling loop.
#[derive(Default)]
struct Shared {
    state: Mutex<PollerState>,
    wake: Notify,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, PollerState> {
        // The guarded data is two plain values, so a poisoned lock is still usable
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_current(&self, generation: u64) -> bool {
        let state = self.lock();
        state.active && state.generation == generation
    }
}

pub struct Poller<S, B> {
    engine: ScanEngine<S, B>,
    config: PollerConfig,
    shared: Arc<Shared>,
}

impl<S, B> Debug for Poller<S, B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Poller ({:?})", self.config)
    }
}

impl<S, B> Poller<S, B> {
    pub fn new(engine: ScanEngine<S, B>, config: PollerConfig) -> Self {
        Self { engine, config, shared: Arc::new(Shared::default()) }
    }

    pub fn config(&self) -> &PollerConfig {
        &self.config
    }

    pub fn status(&self) -> PollerStatus {
        let active = self.shared.lock().active;
        PollerStatus { active, interval_seconds: self.config.interval.as_secs() }
    }

    pub fn is_active(&self) -> bool {
        self.shared.lock().active
    }

    /// Asks the polling loop to stop. A scan that is already in progress runs to completion, but no new scan is
    /// started. Returns false if the poller was not running.
    pub fn stop(&self) -> bool {
        let was_active = {
            let mut state = self.shared.lock();
            std::mem::replace(&mut state.active, false)
        };
        self.shared.wake.notify_waiters();
        if was_active {
            info!("🕰️ Poller stop requested");
        }
        was_active
    }
}

impl<S, B> Poller<S, B>
where
    S: NotificationSource,
    B: IngestionStore,
{
    /// Starts the polling loop in a new tokio task. Returns false, and does nothing, if the poller is already running.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) -> bool {
        let generation = {
            let mut state = self.shared.lock();
            if state.active {
                return false;
            }
            state.active = true;
            state.generation += 1;
            state.generation
        };
        let poll_loop = PollLoop {
            engine: self.engine.clone(),
            config: self.config.clone(),
            shared: Arc::clone(&self.shared),
            generation,
        };
        tokio::spawn(poll_loop.run());
        info!(
            "🕰️ Poller started (generation {generation}). Scanning the last {} days every {}s",
            self.config.lookback_days,
            self.config.interval.as_secs()
        );
        true
    }
}

struct PollLoop<S, B> {
    engine: ScanEngine<S, B>,
    config: PollerConfig,
    shared: Arc<Shared>,
    generation: u64,
}

impl<S, B> PollLoop<S, B>
where
    S: NotificationSource,
    B: IngestionStore,
{
    async fn run(self) {
        let generation = self.generation;
        if self.pause(self.config.initial_delay).await {
            while self.shared.is_current(generation) {
                self.poll_once().await;
                if !self.pause(self.config.interval).await {
                    break;
                }
            }
        }
        info!("🕰️ Polling loop (generation {generation}) has exited");
    }

    /// Runs one scan in its own task, so that a panic inside the scan is reported and the loop carries on.
    async fn poll_once(&self) {
        let engine = self.engine.clone();
        let lookback_days = self.config.lookback_days;
        match tokio::spawn(async move { engine.scan(lookback_days).await }).await {
            Ok(summary) if summary.created > 0 => {
                info!("🕰️ Poll found {} new payment(s), {} auto-matched", summary.created, summary.auto_matched);
            },
            Ok(summary) if summary.has_errors() => {
                warn!("🕰️ Poll finished with {} error(s). Will retry next interval", summary.errors.len());
            },
            Ok(summary) => debug!("🕰️ No new payments ({} notifications examined)", summary.examined),
            Err(e) => error!("🕰️ Scan failed. {e}. Will retry next interval"),
        }
    }

    /// Sleeps for `duration`, or until the poller is stopped. Returns true if the loop should carry on.
    async fn pause(&self, duration: Duration) -> bool {
        let notified = self.shared.wake.notified();
        tokio::pin!(notified);
        // Register for wake-ups before checking the state, so that a stop between the check and the sleep is not lost
        notified.as_mut().enable();
        if !self.shared.is_current(self.generation) {
            return false;
        }
        if !duration.is_zero() {
            tokio::select! {
                _ = tokio::time::sleep(duration) => {},
                _ = &mut notified => {},
            }
        }
        self.shared.is_current(self.generation)
    }
}
