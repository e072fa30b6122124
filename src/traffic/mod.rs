//! Traffic events as delivered by the intercepting proxy.
//!
//! The proxy owns interception. It hands over one [`TrafficEvent`] per
//! request and one per response, plus a [`MessageAnalyzer`] that knows how
//! to read its raw messages. [`Http1Analyzer`] is a reference analyzer for
//! plain HTTP/1.x bytes.

mod http;

pub use http::Http1Analyzer;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use url::Url;

use crate::error::{GqlScopeError, Result};

/// Shared raw message bytes. Cloning is a reference-count bump.
pub type MessageHandle = Arc<[u8]>;

/// Where a request was sent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HttpService {
    pub host: String,
    pub port: u16,
    /// `http` or `https`.
    pub protocol: String,
}

impl HttpService {
    pub fn new(host: impl Into<String>, port: u16, protocol: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            protocol: protocol.into(),
        }
    }

    pub fn https(host: impl Into<String>) -> Self {
        Self::new(host, 443, "https")
    }

    pub fn http(host: impl Into<String>) -> Self {
        Self::new(host, 80, "http")
    }

    /// `protocol://host[:port]/`. The scheme's default port is left out.
    pub fn base_url(&self) -> Result<Url> {
        let mut url = Url::parse(&format!("{}://{}/", self.protocol, self.host))?;
        url.set_port(Some(self.port)).map_err(|_| {
            GqlScopeError::MalformedMessage(format!("service {} cannot carry a port", self))
        })?;
        Ok(url)
    }
}

impl fmt::Display for HttpService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}", self.protocol, self.host, self.port)
    }
}

/// One intercepted message.
///
/// Response events carry the originating request as well; correlation keys
/// are always derived from the request side.
#[derive(Debug, Clone)]
pub struct TrafficEvent {
    /// Proxy tool that produced the traffic (proxy, repeater, scanner, ...).
    pub tool_flag: u32,
    pub is_request: bool,
    pub service: HttpService,
    pub raw_request: MessageHandle,
    pub raw_response: Option<MessageHandle>,
}

impl TrafficEvent {
    pub fn request(service: HttpService, raw_request: impl Into<MessageHandle>) -> Self {
        Self {
            tool_flag: 0,
            is_request: true,
            service,
            raw_request: raw_request.into(),
            raw_response: None,
        }
    }

    pub fn response(
        service: HttpService,
        raw_request: impl Into<MessageHandle>,
        raw_response: Option<MessageHandle>,
    ) -> Self {
        Self {
            tool_flag: 0,
            is_request: false,
            service,
            raw_request: raw_request.into(),
            raw_response,
        }
    }

    pub fn with_tool_flag(mut self, tool_flag: u32) -> Self {
        self.tool_flag = tool_flag;
        self
    }
}

/// Request metadata read from raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestInfo {
    /// Absolute URL including the query string.
    pub url: String,
    pub method: String,
    /// Index of the first body byte.
    pub body_offset: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseInfo {
    pub status_code: u16,
}

/// Reads request and response metadata out of raw messages.
///
/// Supplied by the transport layer; implementations must be callable from
/// any proxy worker thread.
pub trait MessageAnalyzer: Send + Sync {
    fn analyze_request(&self, service: &HttpService, raw: &[u8]) -> Result<RequestInfo>;

    fn analyze_response(&self, raw: &[u8]) -> Result<ResponseInfo>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_elides_default_port() {
        assert_eq!(
            HttpService::https("api.example.com").base_url().unwrap().as_str(),
            "https://api.example.com/"
        );
        assert_eq!(
            HttpService::new("api.example.com", 80, "https").base_url().unwrap().as_str(),
            "https://api.example.com:80/"
        );
        assert!(HttpService::http("bad host").base_url().is_err());
    }
}
