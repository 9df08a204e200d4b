// src/config/schema.rs
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::probe::AdditionalLabel;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default, rename = "probe")]
    pub probes: Vec<ProbeConfig>,
}

/// HTTP control surface and process-wide settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen_address")]
    pub listen_address: String,
    #[serde(default = "default_reload_settle_ms")]
    pub reload_settle_ms: u64,
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_address: default_listen_address(),
            reload_settle_ms: default_reload_settle_ms(),
            event_buffer: default_event_buffer(),
        }
    }
}

/// One `[[probe]]` block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeConfig {
    pub name: String,
    #[serde(rename = "type", default = "default_kind")]
    pub kind: String,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub targets_update_interval_secs: Option<u64>,
    #[serde(default)]
    pub whois_endpoint: Option<String>,
    pub targets: TargetsConfig,
    #[serde(default, rename = "additional_label")]
    pub additional_labels: Vec<AdditionalLabel>,
}

/// Where a probe's targets come from. Exactly one field must be set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetsConfig {
    #[serde(default)]
    pub hosts: Option<Vec<HostEntry>>,
    #[serde(default)]
    pub file: Option<PathBuf>,
}

/// A bare domain or a renamed one
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HostEntry {
    Host(String),
    Named { name: String, domain: String },
}

fn default_listen_address() -> String {
    "0.0.0.0:9313".to_string()
}

fn default_reload_settle_ms() -> u64 {
    1000
}

fn default_event_buffer() -> usize {
    1024
}

fn default_kind() -> String {
    "domain".to_string()
}

fn default_interval_secs() -> u64 {
    60
}

fn default_timeout_secs() -> u64 {
    30
}
