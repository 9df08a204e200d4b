// src/surfacer.rs
use tokio::sync::mpsc;
use tracing::info;

use crate::metrics::MetricEvent;

/// Drain the event stream into the log, one line per event.
///
/// Returns the number of events seen once every sender is gone.
pub async fn log_events(mut events: mpsc::Receiver<MetricEvent>) -> usize {
    let mut seen = 0;
    while let Some(event) = events.recv().await {
        seen += 1;
        info!(
            probe = event.label("probe").unwrap_or_default(),
            target = event.label("target").unwrap_or_default(),
            success = event.is_success(),
            "{}",
            event
        );
    }
    info!("Event stream closed after {} events", seen);
    seen
}
