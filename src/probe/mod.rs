// src/probe/mod.rs
mod domain;
mod lifecycle;
mod reconciler;
mod runner;

pub use domain::DomainProbe;
pub use lifecycle::{ControllerState, ProbeController};
pub use reconciler::{ReconcileSummary, Reconciler, DEFAULT_START_GAP};
pub use runner::{probe_once, run_probe};

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::LookupResult;
use crate::metrics::MetricEvent;
use crate::targets::Target;
use crate::whois::ExpirationLookup;

/// Cadence of domain probes. Registrations change on a scale of days.
pub const PROBE_PERIOD: Duration = Duration::from_secs(12 * 60 * 60);

/// Default target refresh cadence when a probe does not override it.
pub const DEFAULT_TARGETS_UPDATE_INTERVAL: Duration = Duration::from_secs(12 * 60 * 60);

/// Upper bound on the refresh cadence while no targets are known yet.
pub const INITIAL_REFRESH_CAP: Duration = Duration::from_secs(1);

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeKind {
    #[default]
    Domain,
}

impl ProbeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeKind::Domain => "domain",
        }
    }

    /// How often each target of this kind is probed
    pub fn period(&self) -> Duration {
        match self {
            ProbeKind::Domain => PROBE_PERIOD,
        }
    }
}

impl fmt::Display for ProbeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProbeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "domain" => Ok(ProbeKind::Domain),
            other => Err(format!("unknown probe type '{}'", other)),
        }
    }
}

/// Extra label attached to every event of a probe.
///
/// `@target.name@` and `@target.domain@` in the value are replaced per target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdditionalLabel {
    pub key: String,
    pub value: String,
}

impl AdditionalLabel {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn value_for(&self, target: &Target) -> String {
        self.value
            .replace("@target.name@", &target.name)
            .replace("@target.domain@", &target.domain)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProbeOptions {
    pub name: String,
    pub kind: ProbeKind,
    pub interval: Duration,
    pub timeout: Duration,
    pub targets_update_override: Option<Duration>,
    pub additional_labels: Vec<AdditionalLabel>,
}

impl ProbeOptions {
    pub fn new(name: impl Into<String>, kind: ProbeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            interval: DEFAULT_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
            targets_update_override: None,
            additional_labels: Vec::new(),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_targets_update_interval(mut self, interval: Duration) -> Self {
        self.targets_update_override = Some(interval);
        self
    }

    pub fn with_label(mut self, label: AdditionalLabel) -> Self {
        self.additional_labels.push(label);
        self
    }

    /// Steady-state refresh cadence, never faster than the probe interval.
    pub fn targets_update_interval(&self) -> Duration {
        self.targets_update_override
            .unwrap_or(DEFAULT_TARGETS_UPDATE_INTERVAL)
            .max(self.interval)
    }

    /// Refresh cadence while the probe has no targets yet
    pub fn initial_refresh_interval(&self) -> Duration {
        self.interval.min(INITIAL_REFRESH_CAP)
    }
}

/// Every probe kind the exporter knows how to run.
pub enum Probe {
    Domain(DomainProbe),
}

impl Probe {
    pub fn new(options: ProbeOptions, lookup: Arc<dyn ExpirationLookup>) -> Self {
        match options.kind {
            ProbeKind::Domain => Probe::Domain(DomainProbe::new(options, lookup)),
        }
    }

    pub fn options(&self) -> &ProbeOptions {
        match self {
            Probe::Domain(probe) => probe.options(),
        }
    }

    pub fn name(&self) -> &str {
        &self.options().name
    }

    pub fn period(&self) -> Duration {
        self.options().kind.period()
    }

    /// Kind-specific labels and metric defaults, recorded before the attempt.
    pub fn annotate(&self, target: &Target, event: &mut MetricEvent) {
        match self {
            Probe::Domain(probe) => probe.annotate(target, event),
        }
    }

    /// One attempt against `target`, recording kind-specific metrics.
    pub async fn run(&self, target: &Target, event: &mut MetricEvent) -> LookupResult<()> {
        match self {
            Probe::Domain(probe) => probe.run(target, event).await,
        }
    }
}

impl fmt::Debug for Probe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Probe")
            .field("kind", &self.options().kind)
            .field("name", &self.name())
            .finish()
    }
}
