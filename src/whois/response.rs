// src/whois/response.rs
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{LookupError, LookupResult};

/// Status code the aggregation API uses for unregistered domains.
pub const CODE_NOT_FOUND: &str = "1";

/// Decoded body of the WHOIS aggregation API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainResponse {
    #[serde(deserialize_with = "string_or_number")]
    pub code: String,
    #[serde(default)]
    pub domain_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<String>,
}

impl DomainResponse {
    pub fn from_slice(domain: &str, body: &[u8]) -> LookupResult<Self> {
        serde_json::from_slice(body).map_err(|_| LookupError::UnparseableResponse {
            domain: domain.to_string(),
        })
    }

    pub fn is_not_found(&self) -> bool {
        self.code.trim() == CODE_NOT_FOUND
    }

    /// Rewrite the structured answer as the single labelled line the text
    /// parser understands.
    pub fn into_text(self, domain: &str) -> LookupResult<String> {
        if self.is_not_found() {
            return Err(LookupError::NotFound {
                domain: domain.to_string(),
            });
        }

        Ok(format!(
            "Expiration Date: {}",
            self.expiration_date.unwrap_or_default()
        ))
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Code {
        Text(String),
        Number(i64),
    }

    Ok(match Code::deserialize(deserializer)? {
        Code::Text(text) => text,
        Code::Number(number) => number.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_success_body() {
        let body = br#"{"code":"0","domainName":"example.test","expirationDate":"2025-01-02"}"#;
        let response = DomainResponse::from_slice("example.test", body).unwrap();

        assert!(!response.is_not_found());
        assert_eq!(response.domain_name, "example.test");
        assert_eq!(
            response.into_text("example.test").unwrap(),
            "Expiration Date: 2025-01-02"
        );
    }

    #[test]
    fn test_not_found_code() {
        let body = br#"{"code":"1","domainName":"missing.test","message":"Domain does not exist"}"#;
        let response = DomainResponse::from_slice("missing.test", body).unwrap();

        assert!(response.is_not_found());
        assert_eq!(
            response.into_text("missing.test"),
            Err(LookupError::NotFound {
                domain: "missing.test".to_string()
            })
        );
    }

    #[test]
    fn test_numeric_code_is_accepted() {
        let body = br#"{"code":1,"domainName":"missing.test"}"#;
        let response = DomainResponse::from_slice("missing.test", body).unwrap();
        assert!(response.is_not_found());
    }

    #[test]
    fn test_missing_date_yields_empty_value() {
        let body = br#"{"code":"0","domainName":"example.test"}"#;
        let response = DomainResponse::from_slice("example.test", body).unwrap();
        assert_eq!(response.into_text("example.test").unwrap(), "Expiration Date: ");
    }

    #[test]
    fn test_garbage_body() {
        assert_eq!(
            DomainResponse::from_slice("example.test", b"<html>busy</html>"),
            Err(LookupError::UnparseableResponse {
                domain: "example.test".to_string()
            })
        );
    }
}
