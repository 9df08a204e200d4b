// src/error.rs
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExporterError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("File error: {path:?} - {message}")]
    FileError {
        path: PathBuf,
        message: String,
    },

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Reload failed: {0}")]
    ReloadError(String),
}

pub type ExporterResult<T> = std::result::Result<T, ExporterError>;

/// Why a single expiration lookup failed.
///
/// None of these stop a probe loop; they turn into a `success=0` event.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("domain {domain} does not exist")]
    NotFound { domain: String },

    #[error("invalid domain name {domain:?}")]
    InvalidDomain { domain: String },

    #[error("whois request for {domain} failed: {message}")]
    Transport { domain: String, message: String },

    #[error("cannot parse domain response for {domain}")]
    UnparseableResponse { domain: String },

    #[error("unparseable date value {value:?} for {domain}")]
    UnparseableDate { domain: String, value: String },
}

impl LookupError {
    /// Short machine-friendly name used as a log field.
    pub fn kind(&self) -> &'static str {
        match self {
            LookupError::NotFound { .. } => "not_found",
            LookupError::InvalidDomain { .. } => "invalid_domain",
            LookupError::Transport { .. } => "transport",
            LookupError::UnparseableResponse { .. } => "unparseable_response",
            LookupError::UnparseableDate { .. } => "unparseable_date",
        }
    }

    pub fn domain(&self) -> &str {
        match self {
            LookupError::NotFound { domain }
            | LookupError::InvalidDomain { domain }
            | LookupError::Transport { domain, .. }
            | LookupError::UnparseableResponse { domain }
            | LookupError::UnparseableDate { domain, .. } => domain,
        }
    }
}

pub type LookupResult<T> = std::result::Result<T, LookupError>;
