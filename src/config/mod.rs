// src/config/mod.rs
mod loader;
mod schema;

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use url::Url;

pub use loader::{load_config, parse_config, DEFAULT_CONFIG_PATH, ENV_PREFIX};
pub use schema::{Config, HostEntry, ProbeConfig, ServerConfig, TargetsConfig};

use crate::error::{ExporterError, ExporterResult};
use crate::probe::{ProbeKind, ProbeOptions};
use crate::targets::{FileTargets, StaticTargets, Target, TargetSource};
use crate::whois::{ExpirationLookup, WhoisClient};

impl Config {
    /// Reject configurations the prober cannot run
    pub fn validate(&self) -> ExporterResult<()> {
        self.server.socket_addr()?;

        let mut names = HashSet::new();
        for probe in &self.probes {
            probe.validate()?;
            if !names.insert(probe.name.as_str()) {
                return Err(ExporterError::ConfigError(format!(
                    "Duplicate probe name '{}'",
                    probe.name
                )));
            }
        }
        Ok(())
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> ExporterResult<SocketAddr> {
        self.listen_address.parse().map_err(|e| {
            ExporterError::ConfigError(format!(
                "Invalid listen_address '{}': {}",
                self.listen_address, e
            ))
        })
    }

    pub fn reload_settle(&self) -> Duration {
        Duration::from_millis(self.reload_settle_ms)
    }

    /// Event channel capacity, at least one slot
    pub fn event_capacity(&self) -> usize {
        self.event_buffer.max(1)
    }
}

impl ProbeConfig {
    fn invalid(&self, message: impl std::fmt::Display) -> ExporterError {
        ExporterError::ConfigError(format!("Probe '{}': {}", self.name, message))
    }

    pub fn validate(&self) -> ExporterResult<()> {
        if self.name.trim().is_empty() {
            return Err(ExporterError::ConfigError("Probe name must not be empty".to_string()));
        }

        self.probe_kind()?;

        if self.interval_secs == 0 {
            return Err(self.invalid("interval_secs must be greater than zero"));
        }
        if self.timeout_secs == 0 || self.timeout_secs > self.interval_secs {
            return Err(self.invalid(format!(
                "timeout_secs must be in 1..={} (interval_secs)",
                self.interval_secs
            )));
        }

        match (&self.targets.hosts, &self.targets.file) {
            (Some(_), None) | (None, Some(_)) => {}
            _ => return Err(self.invalid("targets needs exactly one of 'hosts' or 'file'")),
        }

        let blank_host = self.targets.hosts.iter().flatten().any(|entry| match entry {
            HostEntry::Host(host) => host.trim().is_empty(),
            HostEntry::Named { domain, .. } => domain.trim().is_empty(),
        });
        if blank_host {
            return Err(self.invalid("hosts entries need a non-empty domain"));
        }

        if let Some(endpoint) = &self.whois_endpoint {
            let url = Url::parse(endpoint)
                .map_err(|e| self.invalid(format!("invalid whois_endpoint '{}': {}", endpoint, e)))?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(self.invalid(format!(
                    "whois_endpoint must be http(s), got '{}'",
                    url.scheme()
                )));
            }
        }

        if self.additional_labels.iter().any(|l| l.key.trim().is_empty()) {
            return Err(self.invalid("additional_label keys must not be empty"));
        }

        Ok(())
    }

    pub fn probe_kind(&self) -> ExporterResult<ProbeKind> {
        self.kind.parse().map_err(|e| self.invalid(e))
    }

    pub fn options(&self) -> ExporterResult<ProbeOptions> {
        let mut options = ProbeOptions::new(self.name.clone(), self.probe_kind()?)
            .with_interval(Duration::from_secs(self.interval_secs))
            .with_timeout(Duration::from_secs(self.timeout_secs));
        if let Some(secs) = self.targets_update_interval_secs {
            options = options.with_targets_update_interval(Duration::from_secs(secs));
        }
        options.additional_labels = self.additional_labels.clone();
        Ok(options)
    }

    pub fn target_source(&self) -> Arc<dyn TargetSource> {
        match (&self.targets.hosts, &self.targets.file) {
            (_, Some(path)) => Arc::new(FileTargets::new(path.clone())),
            (hosts, None) => {
                let targets = hosts
                    .iter()
                    .flatten()
                    .map(|entry| match entry {
                        HostEntry::Host(host) => Target::from_host(host.as_str()),
                        HostEntry::Named { name, domain } => Target::new(name.as_str(), domain.as_str()),
                    })
                    .collect();
                Arc::new(StaticTargets::new(targets))
            }
        }
    }

    pub fn lookup(&self) -> Arc<dyn ExpirationLookup> {
        let client = WhoisClient::new(Duration::from_secs(self.timeout_secs));
        match &self.whois_endpoint {
            Some(endpoint) => Arc::new(client.with_endpoint(endpoint.as_str())),
            None => Arc::new(client),
        }
    }
}
