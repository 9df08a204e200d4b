// src/lib.rs
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod probe;
pub mod prober;
pub mod server;
pub mod surfacer;
pub mod targets;
pub mod whois;

// Re-export main types for easier access
pub use config::Config;
pub use error::{ExporterError, ExporterResult, LookupError, LookupResult};
pub use metrics::{MetricEvent, MetricValue};
pub use probe::{Probe, ProbeController, ProbeKind, ProbeOptions, Reconciler};
pub use prober::{Prober, ProberHandle};
pub use targets::{FileTargets, SharedTargets, StaticTargets, Target, TargetSource};
pub use whois::{ExpirationLookup, WhoisClient};
