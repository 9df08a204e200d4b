// src/probe/runner.rs
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::error::LookupError;
use crate::metrics::{MetricEvent, MetricValue, DURATION_METRIC, SUCCESS_METRIC};
use crate::targets::Target;

use super::Probe;

/// Run a single attempt against `target` and build its event.
///
/// The attempt is bounded by the probe timeout even if the lookup ignores
/// its own deadline.
pub async fn probe_once(probe: &Probe, target: &Target) -> MetricEvent {
    let options = probe.options();

    let mut event = MetricEvent::new(Utc::now());
    event
        .add_label("probe", options.name.as_str())
        .add_label("target", target.name.as_str());
    for label in &options.additional_labels {
        event.add_label(label.key.as_str(), label.value_for(target));
    }
    probe.annotate(target, &mut event);

    let started = Instant::now();
    let outcome = match timeout(options.timeout, probe.run(target, &mut event)).await {
        Ok(outcome) => outcome,
        Err(_) => Err(LookupError::Transport {
            domain: target.domain.clone(),
            message: format!("probe timed out after {:?}", options.timeout),
        }),
    };
    let elapsed = started.elapsed();

    match outcome {
        Ok(()) => {
            event.add_metric(SUCCESS_METRIC, MetricValue::Int(1));
            info!(
                probe = %options.name,
                target = %target.name,
                domain = %target.domain,
                expiration = event.expiration().unwrap_or_default(),
                "Probe succeeded"
            );
        }
        Err(LookupError::NotFound { .. }) => {
            event.add_metric(SUCCESS_METRIC, MetricValue::Int(0));
            info!(
                probe = %options.name,
                target = %target.name,
                domain = %target.domain,
                "Probe failed: domain not registered"
            );
        }
        Err(e) => {
            event.add_metric(SUCCESS_METRIC, MetricValue::Int(0));
            error!(
                probe = %options.name,
                target = %target.name,
                domain = %target.domain,
                kind = e.kind(),
                "Probe failed: {}",
                e
            );
        }
    }
    event.add_metric(DURATION_METRIC, MetricValue::Float(elapsed.as_secs_f64()));

    event
}

/// Probe `target` every `period` until `token` is cancelled.
///
/// The first attempt starts immediately. Events are delivered with
/// backpressure; a closed channel drops the event and the loop carries on.
pub async fn run_probe(
    probe: Arc<Probe>,
    target: Target,
    events: mpsc::Sender<MetricEvent>,
    token: CancellationToken,
    period: Duration,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    debug!(probe = %probe.name(), target = %target, "Probe loop started");

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let event = tokio::select! {
            biased;
            _ = token.cancelled() => break,
            event = probe_once(&probe, &target) => event,
        };
        debug!("{}", event);

        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            sent = events.send(event) => {
                if let Err(mpsc::error::SendError(event)) = sent {
                    error!(probe = %probe.name(), target = %target, "Event sink closed, dropping {}", event);
                }
            }
        }
    }

    debug!(probe = %probe.name(), target = %target, "Probe loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::EXPIRATION_METRIC;
    use crate::probe::testing::{HangingLookup, StubLookup};
    use crate::probe::{AdditionalLabel, ProbeKind, ProbeOptions};

    const VALID: &str = r#"{"code":"0","expirationDate":"2025-01-02"}"#;

    fn probe_with(lookup: StubLookup) -> Arc<Probe> {
        let options = ProbeOptions::new("registrations", ProbeKind::Domain)
            .with_label(AdditionalLabel::new("owner", "@target.name@-team"));
        Arc::new(Probe::new(options, Arc::new(lookup)))
    }

    #[tokio::test]
    async fn test_probe_once_success_labels_and_metrics() {
        let probe = probe_with(StubLookup::default().with_body("example.test", VALID));
        let event = probe_once(&probe, &Target::new("corp", "example.test")).await;

        let keys: Vec<&str> = event.labels().iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["probe", "target", "owner", "domain"]);
        assert_eq!(event.label("probe"), Some("registrations"));
        assert_eq!(event.label("target"), Some("corp"));
        assert_eq!(event.label("owner"), Some("corp-team"));
        assert_eq!(event.label("domain"), Some("example.test"));

        assert!(event.is_success());
        assert_eq!(event.expiration(), Some(1735776000));
        assert!(event.duration_seconds().is_some());
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for Captured {
        type Writer = Captured;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[tokio::test]
    async fn test_success_log_carries_expiration() {
        let captured = Captured::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(captured.clone())
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let probe = probe_with(StubLookup::default().with_body("example.test", VALID));
        probe_once(&probe, &Target::from_host("example.test")).await;

        let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        let line = output
            .lines()
            .find(|line| line.contains("Probe succeeded"))
            .unwrap();
        assert!(line.contains("expiration=1735776000"), "{}", line);
    }

    #[tokio::test]
    async fn test_probe_once_failure() {
        let probe = probe_with(StubLookup::default());
        let event = probe_once(&probe, &Target::from_host("gone.test")).await;

        assert!(!event.is_success());
        assert_eq!(event.metric(EXPIRATION_METRIC), Some(MetricValue::Int(0)));
        assert!(event.duration_seconds().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_once_times_out() {
        let options =
            ProbeOptions::new("slow", ProbeKind::Domain).with_timeout(Duration::from_secs(2));
        let probe = Probe::new(options, Arc::new(HangingLookup));

        let event = probe_once(&probe, &Target::from_host("slow.test")).await;
        assert!(!event.is_success());
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_probes_every_period() {
        let lookup = Arc::new(StubLookup::default().with_body("example.test", VALID));
        let probe = Arc::new(Probe::new(
            ProbeOptions::new("p", ProbeKind::Domain),
            lookup.clone(),
        ));
        let (tx, mut rx) = mpsc::channel(8);
        let token = CancellationToken::new();
        let period = Duration::from_secs(60);

        let task = tokio::spawn(run_probe(
            probe,
            Target::from_host("example.test"),
            tx,
            token.clone(),
            period,
        ));

        let first = rx.recv().await.unwrap();
        assert!(first.is_success());

        tokio::time::sleep(period * 2).await;
        let second = rx.recv().await.unwrap();
        let third = rx.recv().await.unwrap();
        assert!(second.is_success() && third.is_success());
        assert_eq!(lookup.calls(), 3);

        token.cancel();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_blocked_send() {
        let probe = probe_with(StubLookup::default().with_body("example.test", VALID));
        let (tx, mut rx) = mpsc::channel(1);
        let token = CancellationToken::new();

        let task = tokio::spawn(run_probe(
            probe,
            Target::from_host("example.test"),
            tx,
            token.clone(),
            Duration::from_secs(1),
        ));

        // Fill the single slot, then let the loop block on the next send.
        tokio::time::sleep(Duration::from_secs(5)).await;
        token.cancel();
        task.await.unwrap();

        assert!(rx.recv().await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_sink_does_not_stop_loop() {
        let lookup = Arc::new(StubLookup::default().with_body("example.test", VALID));
        let probe = Arc::new(Probe::new(
            ProbeOptions::new("p", ProbeKind::Domain),
            lookup.clone(),
        ));
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let token = CancellationToken::new();

        let task = tokio::spawn(run_probe(
            probe,
            Target::from_host("example.test"),
            tx,
            token.clone(),
            Duration::from_secs(10),
        ));

        tokio::time::sleep(Duration::from_secs(25)).await;
        assert_eq!(lookup.calls(), 3);
        assert!(!task.is_finished());

        token.cancel();
        task.await.unwrap();
    }
}
