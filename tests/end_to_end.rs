// tests/end_to_end.rs
use std::io::Write;
use std::time::Duration;

use serde_json::json;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use domain_exporter::config::load_config;
use domain_exporter::{MetricEvent, Prober};

async fn next_event(rx: &mut mpsc::Receiver<MetricEvent>) -> MetricEvent {
    tokio::time::timeout(Duration::from_secs(10), rx.recv())
        .await
        .expect("event within 10s")
        .expect("event stream open")
}

#[tokio::test]
async fn test_example_domain_reports_expiry() {
    let whois = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/whois"))
        .and(body_json(json!({ "domainName": "example.test" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": "0",
            "domainName": "example.test",
            "expirationDate": "2025-01-02"
        })))
        .mount(&whois)
        .await;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[[probe]]
name = "registrations"
timeout_secs = 5
whois_endpoint = "{}/whois"
targets = {{ hosts = ["example.test"] }}

[[probe.additional_label]]
key = "zone"
value = "@target.domain@"
"#,
        whois.uri()
    )
    .unwrap();

    let config = load_config(file.path()).unwrap();
    let (tx, mut rx) = mpsc::channel(16);
    let shutdown = CancellationToken::new();
    let (mut prober, _handle) = Prober::new(file.path(), tx, shutdown.clone());
    prober.start(&config).unwrap();
    let task = tokio::spawn(prober.run());

    let event = next_event(&mut rx).await;
    assert!(event.is_success());
    assert_eq!(event.expiration(), Some(1735776000));
    assert_eq!(event.label("probe"), Some("registrations"));
    assert_eq!(event.label("target"), Some("example.test"));
    assert_eq!(event.label("zone"), Some("example.test"));
    assert_eq!(event.label("domain"), Some("example.test"));
    assert!(event.duration_seconds().unwrap() < 5.0);

    shutdown.cancel();
    task.await.unwrap();
}

#[tokio::test]
async fn test_unreachable_endpoint_reports_failure() {
    let whois = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&whois)
        .await;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        "[[probe]]\nname = \"p\"\ntimeout_secs = 5\nwhois_endpoint = \"{}/whois\"\ntargets = {{ hosts = [\"down.test\"] }}\n",
        whois.uri()
    )
    .unwrap();

    let config = load_config(file.path()).unwrap();
    let (tx, mut rx) = mpsc::channel(16);
    let shutdown = CancellationToken::new();
    let (mut prober, _handle) = Prober::new(file.path(), tx, shutdown.clone());
    prober.start(&config).unwrap();
    let task = tokio::spawn(prober.run());

    let event = next_event(&mut rx).await;
    assert!(!event.is_success());
    assert_eq!(event.expiration(), None);
    assert_eq!(event.label("domain"), Some("down.test"));

    shutdown.cancel();
    task.await.unwrap();
}
