// src/probe/domain.rs
use std::sync::Arc;

use crate::error::LookupResult;
use crate::metrics::{MetricEvent, MetricValue, EXPIRATION_METRIC};
use crate::targets::Target;
use crate::whois::ExpirationLookup;

use super::ProbeOptions;

/// Reports when each target's registration expires.
pub struct DomainProbe {
    options: ProbeOptions,
    lookup: Arc<dyn ExpirationLookup>,
}

impl DomainProbe {
    pub fn new(options: ProbeOptions, lookup: Arc<dyn ExpirationLookup>) -> Self {
        Self { options, lookup }
    }

    pub fn options(&self) -> &ProbeOptions {
        &self.options
    }

    pub(super) fn annotate(&self, target: &Target, event: &mut MetricEvent) {
        event.add_label("domain", target.domain.as_str());
        event.add_metric(EXPIRATION_METRIC, MetricValue::Int(0));
    }

    pub(super) async fn run(&self, target: &Target, event: &mut MetricEvent) -> LookupResult<()> {
        let expires = self
            .lookup
            .lookup(&target.domain, Some(self.options.timeout))
            .await?;
        event.add_metric(EXPIRATION_METRIC, MetricValue::Int(expires));
        Ok(())
    }
}
