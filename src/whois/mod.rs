// src/whois/mod.rs
mod client;
pub mod parser;
mod request;
mod response;

pub use client::{ExpirationLookup, WhoisClient, DEFAULT_CLIENT, DEFAULT_TIMEOUT, PUBLIC_API};
pub use parser::{parse, DateLayout, DATE_LAYOUTS};
pub use request::DomainRequest;
pub use response::{DomainResponse, CODE_NOT_FOUND};
