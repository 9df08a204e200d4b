// src/prober.rs
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{load_config, Config};
use crate::error::{ExporterError, ExporterResult};
use crate::metrics::MetricEvent;
use crate::probe::{Probe, ProbeController};
use crate::targets::TargetSource;
use crate::whois::ExpirationLookup;

const COMMAND_BUFFER: usize = 8;

/// Requests served by the prober's run loop, one at a time.
#[derive(Debug)]
pub enum ProberCommand {
    Reload {
        respond: oneshot::Sender<ExporterResult<()>>,
    },
}

/// Cloneable entry point to a running [`Prober`].
#[derive(Debug, Clone)]
pub struct ProberHandle {
    commands: mpsc::Sender<ProberCommand>,
}

impl ProberHandle {
    /// A handle and the queue it feeds
    pub fn channel() -> (Self, mpsc::Receiver<ProberCommand>) {
        let (commands, queue) = mpsc::channel(COMMAND_BUFFER);
        (Self { commands }, queue)
    }

    /// Re-read the configuration and restart every probe with it.
    ///
    /// Resolves once the new run has started, or with the reason the
    /// current run was kept.
    pub async fn reload(&self) -> ExporterResult<()> {
        let (respond, answer) = oneshot::channel();
        self.commands
            .send(ProberCommand::Reload { respond })
            .await
            .map_err(|_| ExporterError::ReloadError("prober is not running".to_string()))?;
        answer
            .await
            .map_err(|_| ExporterError::ReloadError("prober stopped before answering".to_string()))?
    }
}

struct Run {
    token: CancellationToken,
    tasks: JoinSet<()>,
    probes: Vec<String>,
}

/// Owns the probe controllers built from one configuration at a time.
pub struct Prober {
    config_path: PathBuf,
    events: mpsc::Sender<MetricEvent>,
    shutdown: CancellationToken,
    commands: mpsc::Receiver<ProberCommand>,
    lookup: Option<Arc<dyn ExpirationLookup>>,
    settle: Duration,
    run: Option<Run>,
}

impl Prober {
    pub fn new(
        config_path: impl AsRef<Path>,
        events: mpsc::Sender<MetricEvent>,
        shutdown: CancellationToken,
    ) -> (Self, ProberHandle) {
        let (handle, commands) = ProberHandle::channel();
        let prober = Self {
            config_path: config_path.as_ref().to_path_buf(),
            events,
            shutdown,
            commands,
            lookup: None,
            settle: Duration::ZERO,
            run: None,
        };
        (prober, handle)
    }

    /// Use `lookup` for every probe instead of a client per probe
    pub fn with_lookup(mut self, lookup: Arc<dyn ExpirationLookup>) -> Self {
        self.lookup = Some(lookup);
        self
    }

    pub fn running_probes(&self) -> &[String] {
        self.run
            .as_ref()
            .map(|run| run.probes.as_slice())
            .unwrap_or_default()
    }

    fn build(&self, config: &Config) -> ExporterResult<Vec<(Probe, Arc<dyn TargetSource>)>> {
        config
            .probes
            .iter()
            .map(|probe| {
                let lookup = match &self.lookup {
                    Some(lookup) => lookup.clone(),
                    None => probe.lookup(),
                };
                Ok((Probe::new(probe.options()?, lookup), probe.target_source()))
            })
            .collect()
    }

    /// Start one controller per configured probe.
    pub fn start(&mut self, config: &Config) -> ExporterResult<()> {
        if self.run.is_some() {
            return Err(ExporterError::ReloadError("probes are already running".to_string()));
        }
        let probes = self.build(config)?;
        self.launch(probes);
        self.settle = config.server.reload_settle();
        Ok(())
    }

    fn launch(&mut self, probes: Vec<(Probe, Arc<dyn TargetSource>)>) {
        let token = self.shutdown.child_token();
        let mut tasks = JoinSet::new();
        let mut names = Vec::with_capacity(probes.len());

        for (probe, source) in probes {
            names.push(probe.name().to_string());
            let controller = ProbeController::new(probe, source, self.events.clone(), token.clone());
            tasks.spawn(controller.run());
        }

        if names.is_empty() {
            warn!("No probes configured");
        } else {
            info!("Started probes: {}", names.join(", "));
        }
        self.run = Some(Run {
            token,
            tasks,
            probes: names,
        });
    }

    /// Cancel the current run and wait for every probe loop to exit.
    pub async fn stop(&mut self) {
        let Some(mut run) = self.run.take() else {
            return;
        };
        run.token.cancel();
        while let Some(joined) = run.tasks.join_next().await {
            if let Err(e) = joined {
                error!("Probe controller failed: {}", e);
            }
        }
        debug!("Stopped probes: {}", run.probes.join(", "));
    }

    async fn reload(&mut self) -> ExporterResult<()> {
        let config = load_config(&self.config_path).map_err(|e| {
            warn!("Reload rejected, keeping current probes: {}", e);
            e
        })?;
        let probes = self.build(&config)?;

        info!("Reloading configuration from {}", self.config_path.display());
        self.stop().await;

        tokio::select! {
            _ = self.shutdown.cancelled() => {
                return Err(ExporterError::ReloadError("shutting down".to_string()));
            }
            _ = tokio::time::sleep(self.settle) => {}
        }

        self.launch(probes);
        self.settle = config.server.reload_settle();
        info!("Configuration reloaded");
        Ok(())
    }

    /// Serve commands until the shutdown token fires, then stop everything.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                command = self.commands.recv() => match command {
                    Some(ProberCommand::Reload { respond }) => {
                        let result = self.reload().await;
                        if respond.send(result).is_err() {
                            debug!("Reload caller went away before the answer");
                        }
                    }
                    None => {
                        self.shutdown.cancelled().await;
                        break;
                    }
                },
            }
        }

        self.stop().await;
        info!("Prober stopped");
    }
}
