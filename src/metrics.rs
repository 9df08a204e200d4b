// src/metrics.rs
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const SUCCESS_METRIC: &str = "probe_domain_success";
pub const DURATION_METRIC: &str = "probe_domain_duration_seconds";
pub const EXPIRATION_METRIC: &str = "probe_domain_expiration";

/// A single numeric measurement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Int(i64),
    Float(f64),
}

impl MetricValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            MetricValue::Int(v) => Some(*v),
            MetricValue::Float(_) => None,
        }
    }

    pub fn as_f64(&self) -> f64 {
        match self {
            MetricValue::Int(v) => *v as f64,
            MetricValue::Float(v) => *v,
        }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Int(v) => write!(f, "{}", v),
            MetricValue::Float(v) => write!(f, "{:.3}", v),
        }
    }
}

/// Labeled measurements produced by one probe attempt.
///
/// Labels and metrics keep insertion order; setting an existing name
/// overwrites it in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricEvent {
    pub timestamp: DateTime<Utc>,
    labels: Vec<(String, String)>,
    metrics: Vec<(String, MetricValue)>,
}

impl MetricEvent {
    pub fn new(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            labels: Vec::new(),
            metrics: Vec::new(),
        }
    }

    pub fn add_label(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        let (key, value) = (key.into(), value.into());
        match self.labels.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.labels.push((key, value)),
        }
        self
    }

    pub fn add_metric(&mut self, name: impl Into<String>, value: MetricValue) -> &mut Self {
        let name = name.into();
        match self.metrics.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.metrics.push((name, value)),
        }
        self
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn metric(&self, name: &str) -> Option<MetricValue> {
        self.metrics
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }

    pub fn labels(&self) -> &[(String, String)] {
        &self.labels
    }

    pub fn metrics(&self) -> &[(String, MetricValue)] {
        &self.metrics
    }

    pub fn is_success(&self) -> bool {
        self.metric(SUCCESS_METRIC).and_then(|v| v.as_i64()) == Some(1)
    }

    /// Expiration timestamp, present only on successful attempts.
    pub fn expiration(&self) -> Option<i64> {
        if !self.is_success() {
            return None;
        }
        self.metric(EXPIRATION_METRIC).and_then(|v| v.as_i64())
    }

    pub fn duration_seconds(&self) -> Option<f64> {
        self.metric(DURATION_METRIC).map(|v| v.as_f64())
    }
}

/// `<unix-ts> labels=k=v,... name=value ...`
impl fmt::Display for MetricEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.timestamp.timestamp())?;

        if !self.labels.is_empty() {
            let labels: Vec<String> = self
                .labels
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect();
            write!(f, " labels={}", labels.join(","))?;
        }

        for (name, value) in &self.metrics {
            write!(f, " {}={}", name, value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_text_line() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let mut event = MetricEvent::new(ts);
        event
            .add_label("probe", "registrations")
            .add_label("target", "example.test")
            .add_label("domain", "example.test");
        event
            .add_metric(SUCCESS_METRIC, MetricValue::Int(1))
            .add_metric(EXPIRATION_METRIC, MetricValue::Int(1735776000))
            .add_metric(DURATION_METRIC, MetricValue::Float(0.25));

        assert_eq!(
            event.to_string(),
            "1714521600 labels=probe=registrations,target=example.test,domain=example.test \
             probe_domain_success=1 probe_domain_expiration=1735776000 \
             probe_domain_duration_seconds=0.250"
        );
    }

    #[test]
    fn test_overwrite_keeps_position() {
        let mut event = MetricEvent::new(Utc::now());
        event.add_label("a", "1").add_label("b", "2").add_label("a", "3");
        assert_eq!(
            event.labels(),
            &[("a".to_string(), "3".to_string()), ("b".to_string(), "2".to_string())]
        );
    }

    #[test]
    fn test_expiration_hidden_on_failure() {
        let mut event = MetricEvent::new(Utc::now());
        event
            .add_metric(SUCCESS_METRIC, MetricValue::Int(0))
            .add_metric(EXPIRATION_METRIC, MetricValue::Int(0));

        assert!(!event.is_success());
        assert_eq!(event.expiration(), None);
        assert_eq!(event.metric(EXPIRATION_METRIC), Some(MetricValue::Int(0)));
    }
}
