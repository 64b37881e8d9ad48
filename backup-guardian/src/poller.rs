//! Periodic refresh driver.
//!
//! Owns the refresh schedule and the published view. At most one cycle runs
//! at a time; a cycle started while another is in flight is skipped. Views
//! are swapped in whole through a `watch` channel so readers never see a
//! half-built one.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::engine::Refresh;
use crate::model::AggregateView;

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(300);

pub type SharedView = Arc<AggregateView>;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PollerState {
    Idle,
    Fetching,
    Published,
    Failed { error: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleOutcome {
    Published,
    Failed,
    /// Another cycle was already running.
    Skipped,
    /// Shutdown arrived mid-cycle; nothing was published.
    Abandoned,
}

pub struct Poller {
    engine: Arc<dyn Refresh>,
    interval: Duration,
    cycle_lock: Mutex<()>,
    view_tx: watch::Sender<Option<SharedView>>,
    state_tx: watch::Sender<PollerState>,
}

impl Poller {
    pub fn new(engine: Arc<dyn Refresh>, interval: Duration) -> Self {
        let (view_tx, _) = watch::channel(None);
        let (state_tx, _) = watch::channel(PollerState::Idle);
        Self {
            engine,
            interval,
            cycle_lock: Mutex::new(()),
            view_tx,
            state_tx,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Receives every newly published view. `None` until the first publish.
    pub fn subscribe(&self) -> watch::Receiver<Option<SharedView>> {
        self.view_tx.subscribe()
    }

    pub fn latest(&self) -> Option<SharedView> {
        self.view_tx.borrow().clone()
    }

    pub fn state(&self) -> PollerState {
        self.state_tx.borrow().clone()
    }

    pub fn watch_state(&self) -> watch::Receiver<PollerState> {
        self.state_tx.subscribe()
    }

    pub fn configured_sources(&self) -> Vec<crate::model::SourceTag> {
        self.engine.configured_sources()
    }

    /// Run one refresh cycle now.
    pub async fn run_cycle(&self, cancel: &CancellationToken) -> CycleOutcome {
        let Ok(_guard) = self.cycle_lock.try_lock() else {
            debug!("Refresh already in flight, skipping");
            return CycleOutcome::Skipped;
        };

        let previous = self.state_tx.send_replace(PollerState::Fetching);

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = self.engine.refresh() => Some(result),
        };

        match result {
            None => {
                self.state_tx.send_replace(previous);
                info!("Refresh cycle abandoned on shutdown");
                CycleOutcome::Abandoned
            }
            Some(Ok(view)) => {
                debug!(total = view.total_count, "Publishing aggregate view");
                self.view_tx.send_replace(Some(Arc::new(view)));
                self.state_tx.send_replace(PollerState::Published);
                CycleOutcome::Published
            }
            Some(Err(e)) => {
                error!(error = %e, "Refresh cycle failed, keeping the last published view");
                self.state_tx.send_replace(PollerState::Failed {
                    error: e.to_string(),
                });
                CycleOutcome::Failed
            }
        }
    }

    /// Refresh immediately, then once per interval until cancelled.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(interval_secs = self.interval.as_secs(), "Poller started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    self.run_cycle(&cancel).await;
                }
            }
        }
        info!("Poller stopped");
    }

    pub fn spawn(self: &Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(Arc::clone(self).run(cancel))
    }
}
