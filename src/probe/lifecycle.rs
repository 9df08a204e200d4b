// src/probe/lifecycle.rs
use std::fmt;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::metrics::MetricEvent;
use crate::targets::TargetSource;

use super::{Probe, Reconciler};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Starting,
    AwaitingFirstTargets,
    Steady,
    Stopped,
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ControllerState::Starting => "starting",
            ControllerState::AwaitingFirstTargets => "awaiting-first-targets",
            ControllerState::Steady => "steady",
            ControllerState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Drives target refreshes for one configured probe.
///
/// Refreshes quickly until the first targets appear, then settles on the
/// probe's targets update interval. Cancelling the token stops every loop
/// the controller started before [`ProbeController::run`] returns.
pub struct ProbeController {
    reconciler: Reconciler,
    token: CancellationToken,
    state: watch::Sender<ControllerState>,
}

impl ProbeController {
    pub fn new(
        probe: Probe,
        source: Arc<dyn TargetSource>,
        events: mpsc::Sender<MetricEvent>,
        token: CancellationToken,
    ) -> Self {
        let reconciler = Reconciler::new(Arc::new(probe), source, events, token.clone());
        let (state, _) = watch::channel(ControllerState::Starting);
        Self {
            reconciler,
            token,
            state,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<ControllerState> {
        self.state.subscribe()
    }

    pub async fn run(mut self) {
        let options = self.reconciler.probe().options().clone();
        info!(
            "Probe({}) targets update interval: {:?}",
            options.name,
            options.targets_update_interval()
        );

        let mut state = ControllerState::Starting;
        loop {
            state = match state {
                ControllerState::Starting => self.start().await,
                ControllerState::AwaitingFirstTargets => self.await_first_targets().await,
                ControllerState::Steady => self.steady().await,
                ControllerState::Stopped => break,
            };
            if self.token.is_cancelled() {
                state = ControllerState::Stopped;
            }
            self.transition(state);
        }

        self.reconciler.shutdown().await;
        info!("Probe({}) stopped", options.name);
    }

    fn transition(&self, next: ControllerState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            debug!(
                "Probe({}) {} -> {}",
                self.reconciler.probe().name(),
                previous,
                next
            );
        }
    }

    async fn start(&mut self) -> ControllerState {
        let summary = self.reconciler.reconcile().await;
        if summary.active == 0 {
            ControllerState::AwaitingFirstTargets
        } else {
            ControllerState::Steady
        }
    }

    async fn await_first_targets(&mut self) -> ControllerState {
        let refresh = self.reconciler.probe().options().initial_refresh_interval();
        loop {
            tokio::select! {
                biased;
                _ = self.token.cancelled() => return ControllerState::Stopped,
                _ = sleep(refresh) => {}
            }
            if self.reconciler.reconcile().await.active > 0 {
                return ControllerState::Steady;
            }
        }
    }

    async fn steady(&mut self) -> ControllerState {
        let every = self.reconciler.probe().options().targets_update_interval();
        let mut ticker = interval_at(Instant::now() + every, every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                _ = self.token.cancelled() => return ControllerState::Stopped,
                _ = ticker.tick() => {
                    self.reconciler.reconcile().await;
                }
            }
        }
    }
}
