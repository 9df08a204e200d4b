// src/probe/reconciler.rs
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::mpsc;
use tokio::task::{Id, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::metrics::MetricEvent;
use crate::targets::{Target, TargetSource};

use super::{run_probe, Probe};

/// Spacing between the first attempts of newly added targets.
pub const DEFAULT_START_GAP: Duration = Duration::from_millis(10);

struct ActiveProbe {
    target: Target,
    token: CancellationToken,
    task: Id,
}

/// What one reconciliation pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    /// Targets the probe is responsible for after the pass
    pub active: usize,
}

impl ReconcileSummary {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Keeps exactly one probe loop per desired target.
pub struct Reconciler {
    probe: Arc<Probe>,
    source: Arc<dyn TargetSource>,
    events: mpsc::Sender<MetricEvent>,
    token: CancellationToken,
    registry: HashMap<String, ActiveProbe>,
    tasks: JoinSet<()>,
    start_gap: Duration,
}

impl Reconciler {
    pub fn new(
        probe: Arc<Probe>,
        source: Arc<dyn TargetSource>,
        events: mpsc::Sender<MetricEvent>,
        token: CancellationToken,
    ) -> Self {
        Self {
            probe,
            source,
            events,
            token,
            registry: HashMap::new(),
            tasks: JoinSet::new(),
            start_gap: DEFAULT_START_GAP,
        }
    }

    pub fn with_start_gap(mut self, gap: Duration) -> Self {
        self.start_gap = gap;
        self
    }

    pub fn probe(&self) -> &Probe {
        &self.probe
    }

    /// Diff the source's targets against the running loops.
    ///
    /// Loops for vanished targets are signalled and forgotten at once; their
    /// tasks are reaped on later passes or by [`Reconciler::shutdown`]. A
    /// failing source leaves every running loop untouched.
    pub async fn reconcile(&mut self) -> ReconcileSummary {
        self.reap();

        let name = self.probe.name().to_string();
        let targets = match self.source.list_targets().await {
            Ok(targets) => targets,
            Err(e) => {
                warn!("Probe({}) failed to list targets, keeping {} running: {}", name, self.registry.len(), e);
                return ReconcileSummary {
                    active: self.registry.len(),
                    ..Default::default()
                };
            }
        };
        debug!("Probe({}) got {} targets", name, targets.len());

        let mut seen = HashSet::new();
        let desired: Vec<(String, Target)> = targets
            .into_iter()
            .filter_map(|target| {
                let key = target.key();
                seen.insert(key.clone()).then_some((key, target))
            })
            .collect();

        let mut summary = ReconcileSummary::default();

        let mut stale: Vec<String> = self
            .registry
            .keys()
            .filter(|key| !seen.contains(*key))
            .cloned()
            .collect();
        stale.sort();
        for key in stale {
            if let Some(active) = self.registry.remove(&key) {
                debug!("Probe({}) stopping {}", name, active.target);
                active.token.cancel();
                summary.removed.push(key);
            }
        }

        let mut wait = Duration::ZERO;
        for (key, target) in desired {
            if self.registry.contains_key(&key) {
                continue;
            }
            self.spawn(key.clone(), target, wait);
            summary.added.push(key);
            wait += self.start_gap;
        }

        summary.active = self.registry.len();
        if !summary.is_empty() {
            info!(
                "Probe({}) targets updated: +{} -{} ({} active)",
                name,
                summary.added.len(),
                summary.removed.len(),
                summary.active
            );
        }
        summary
    }

    fn spawn(&mut self, key: String, target: Target, wait: Duration) {
        let jitter_max = (self.start_gap.as_micros() / 10) as u64;
        let jitter = if jitter_max == 0 {
            Duration::ZERO
        } else {
            Duration::from_micros(rand::rng().random_range(0..jitter_max))
        };

        let token = self.token.child_token();
        let probe = self.probe.clone();
        let events = self.events.clone();
        let period = probe.period();
        let worker_target = target.clone();
        let worker_token = token.clone();

        let handle = self.tasks.spawn(async move {
            tokio::select! {
                _ = worker_token.cancelled() => return,
                _ = tokio::time::sleep(wait + jitter) => {}
            }
            run_probe(probe, worker_target, events, worker_token, period).await;
        });

        debug!("Probe({}) starting {} after {:?}", self.probe.name(), target, wait + jitter);
        self.registry.insert(
            key,
            ActiveProbe {
                target,
                token,
                task: handle.id(),
            },
        );
    }

    /// Collect finished tasks. A loop that ended on its own (a panic) loses
    /// its registry entry so the next pass starts it again.
    fn reap(&mut self) {
        while let Some(joined) = self.tasks.try_join_next_with_id() {
            let id = match joined {
                Ok((id, ())) => id,
                Err(e) => {
                    if e.is_panic() {
                        error!("Probe({}) loop panicked: {}", self.probe.name(), e);
                    }
                    e.id()
                }
            };
            self.registry.retain(|_, active| active.task != id);
        }
    }

    /// Keys of the targets with a running loop, sorted.
    pub fn active_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.registry.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn task_id(&self, key: &str) -> Option<Id> {
        self.registry.get(key).map(|active| active.task)
    }

    /// Tasks not yet joined, including signalled ones still winding down
    pub fn pending_tasks(&self) -> usize {
        self.tasks.len()
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// Signal every loop and wait for all of them to exit.
    pub async fn shutdown(&mut self) {
        for (_, active) in self.registry.drain() {
            active.token.cancel();
        }
        while let Some(joined) = self.tasks.join_next().await {
            if let Err(e) = joined {
                if e.is_panic() {
                    error!("Probe({}) loop panicked: {}", self.probe.name(), e);
                }
            }
        }
        debug!("Probe({}) all loops stopped", self.probe.name());
    }
}
