// src/whois/client.rs
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use reqwest::{header, Client};
use tokio::time::timeout;
use tracing::{debug, error};

use super::parser;
use super::request::DomainRequest;
use super::response::DomainResponse;
use crate::error::{LookupError, LookupResult};

/// Public WHOIS aggregation endpoint.
pub const PUBLIC_API: &str = "https://dms.inet.vn/api/public/whois/v1/whois/directly";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared client with the default timeout and endpoint.
pub static DEFAULT_CLIENT: Lazy<WhoisClient> = Lazy::new(WhoisClient::default);

/// Anything that can resolve a domain to its expiration instant.
#[async_trait]
pub trait ExpirationLookup: Send + Sync {
    /// Unix seconds of the registration expiry. `deadline`, when given,
    /// narrows the implementation's own timeout.
    async fn lookup(&self, domain: &str, deadline: Option<Duration>) -> LookupResult<i64>;
}

/// HTTP client for the WHOIS aggregation API.
///
/// Holds no per-call state, so one instance can serve any number of
/// concurrent lookups.
#[derive(Debug, Clone)]
pub struct WhoisClient {
    http: Client,
    endpoint: String,
    timeout: Duration,
}

impl Default for WhoisClient {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl WhoisClient {
    /// Create a new client against the public endpoint
    pub fn new(timeout: Duration) -> Self {
        let http = Client::builder()
            .user_agent(format!("domain_exporter/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|e| {
                error!("Failed to build whois HTTP client, using defaults: {}", e);
                Client::new()
            });

        Self {
            http,
            endpoint: PUBLIC_API.to_string(),
            timeout,
        }
    }

    /// Point the client at another endpoint
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// POST the domain and return the response as labelled text.
    pub async fn fetch(&self, domain: &str, deadline: Option<Duration>) -> LookupResult<String> {
        if domain.trim().is_empty() {
            return Err(LookupError::InvalidDomain {
                domain: domain.to_string(),
            });
        }

        let limit = deadline.map_or(self.timeout, |d| d.min(self.timeout));
        debug!("POST {} for {} (timeout {:?})", self.endpoint, domain, limit);

        let exchange = async {
            let response = self
                .http
                .post(&self.endpoint)
                .header(header::CONTENT_TYPE, "application/json")
                .json(&DomainRequest::new(domain))
                .send()
                .await?;
            let status = response.status();
            let body = response.bytes().await?;
            Ok::<_, reqwest::Error>((status, body))
        };

        let (status, body) = match timeout(limit, exchange).await {
            Err(_) => return Err(transport(domain, format!("request timed out after {:?}", limit))),
            Ok(Err(e)) => return Err(transport(domain, e.to_string())),
            Ok(Ok(exchange)) => exchange,
        };

        if !status.is_success() {
            return Err(transport(domain, format!("unexpected HTTP status {}", status)));
        }

        let response = DomainResponse::from_slice(domain, &body)?;
        if let Some(message) = &response.message {
            debug!("whois message for {}: {}", domain, message);
        }

        response.into_text(domain)
    }
}

#[async_trait]
impl ExpirationLookup for WhoisClient {
    async fn lookup(&self, domain: &str, deadline: Option<Duration>) -> LookupResult<i64> {
        let text = self.fetch(domain, deadline).await?;
        parser::parse(domain, text.as_bytes())
    }
}

fn transport(domain: &str, message: impl Into<String>) -> LookupError {
    LookupError::Transport {
        domain: domain.to_string(),
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer, timeout: Duration) -> WhoisClient {
        WhoisClient::new(timeout).with_endpoint(format!("{}/whois", server.uri()))
    }

    #[test]
    fn test_default_client() {
        assert_eq!(DEFAULT_CLIENT.timeout(), DEFAULT_TIMEOUT);
        assert_eq!(DEFAULT_CLIENT.endpoint(), PUBLIC_API);
    }

    #[tokio::test]
    async fn test_lookup_sends_contract_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/whois"))
            .and(header("content-type", "application/json"))
            .and(body_json(json!({ "domainName": "example.test" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": "0",
                "domainName": "example.test",
                "expirationDate": "2025-01-02"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, DEFAULT_TIMEOUT);
        let expected = DateTime::parse_from_rfc3339("2025-01-02T00:00:00Z").unwrap().timestamp();

        assert_eq!(client.lookup("example.test", None).await, Ok(expected));
    }

    #[tokio::test]
    async fn test_not_found_is_distinct_from_parse_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": "1",
                "domainName": "missing.test",
                "message": "not registered"
            })))
            .mount(&server)
            .await;

        let client = client_for(&server, DEFAULT_TIMEOUT);
        let err = client.lookup("missing.test", None).await.unwrap_err();

        assert_eq!(err, LookupError::NotFound { domain: "missing.test".to_string() });
        assert_eq!(err.kind(), "not_found");
    }

    #[tokio::test]
    async fn test_unknown_date_format() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": "0",
                "domainName": "example.test",
                "expirationDate": "sometime soon"
            })))
            .mount(&server)
            .await;

        let client = client_for(&server, DEFAULT_TIMEOUT);
        assert_eq!(
            client.lookup("example.test", None).await,
            Err(LookupError::UnparseableDate {
                domain: "example.test".to_string(),
                value: "sometime soon".to_string(),
            })
        );
    }

    #[tokio::test]
    async fn test_server_error_is_transport() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = client_for(&server, DEFAULT_TIMEOUT);
        let err = client.lookup("example.test", None).await.unwrap_err();
        assert_eq!(err.kind(), "transport");
    }

    #[tokio::test]
    async fn test_caller_deadline_narrows_client_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "code": "0", "expirationDate": "2025-01-02" }))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let client = client_for(&server, Duration::from_secs(30));
        let started = std::time::Instant::now();
        let err = client
            .lookup("example.test", Some(Duration::from_millis(100)))
            .await
            .unwrap_err();

        assert!(matches!(err, LookupError::Transport { ref message, .. } if message.contains("timed out")));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_client_timeout_applies_without_deadline() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let client = client_for(&server, Duration::from_millis(100));
        let err = client.lookup("example.test", Some(Duration::from_secs(60))).await.unwrap_err();
        assert_eq!(err.kind(), "transport");
    }

    #[tokio::test]
    async fn test_empty_domain_is_not_sent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = client_for(&server, DEFAULT_TIMEOUT);
        let err = client.lookup("  ", None).await.unwrap_err();
        assert_eq!(err, LookupError::InvalidDomain { domain: "  ".to_string() });
        assert_eq!(err.kind(), "invalid_domain");
    }
}
