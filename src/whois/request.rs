// src/whois/request.rs
use serde::Serialize;

/// JSON body of a lookup call: `{"domainName": "<domain>"}`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainRequest<'a> {
    pub domain_name: &'a str,
}

impl<'a> DomainRequest<'a> {
    pub fn new(domain_name: &'a str) -> Self {
        Self { domain_name }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_shape() {
        let body = serde_json::to_value(DomainRequest::new("example.test")).unwrap();
        assert_eq!(body, serde_json::json!({ "domainName": "example.test" }));
    }
}
