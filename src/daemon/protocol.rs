//! Daemon protocol: newline-delimited JSON between feeders, CLI and daemon.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::registry::CallSummary;
use crate::traffic::{HttpService, TrafficEvent};

/// Request to the daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "command")]
pub enum Request {
    /// Intercepted traffic pushed by a proxy plugin
    #[serde(rename = "traffic")]
    Traffic { event: WireEvent },

    /// List every row of the log
    #[serde(rename = "rows")]
    Rows,

    /// Full detail of one row, including raw messages
    #[serde(rename = "row")]
    Row { row: usize },

    /// Ingest counters and log size
    #[serde(rename = "stats")]
    Stats,

    /// Clear the log
    #[serde(rename = "clear")]
    Clear,

    /// Check if daemon is alive
    #[serde(rename = "ping")]
    Ping,

    /// Shutdown the daemon
    #[serde(rename = "shutdown")]
    Shutdown,
}

/// Response from the daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum Response {
    /// Successful response with JSON data
    #[serde(rename = "ok")]
    Ok { data: serde_json::Value },

    /// Error response
    #[serde(rename = "error")]
    Error { message: String },

    /// Pong response (daemon is alive)
    #[serde(rename = "pong")]
    Pong,

    /// Shutdown acknowledgment
    #[serde(rename = "goodbye")]
    Goodbye,
}

impl Response {
    pub fn ok<T: Serialize>(data: T) -> Self {
        Response::Ok {
            data: serde_json::to_value(data).unwrap_or(serde_json::Value::Null),
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Response::Error { message: msg.into() }
    }
}

/// A [`TrafficEvent`] on the wire.
///
/// Raw messages are a JSON string when they are valid UTF-8 and
/// `{"base64": "..."}` otherwise, so compressed or binary bodies arrive
/// byte for byte.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireEvent {
    #[serde(default)]
    pub tool_flag: u32,
    pub is_request: bool,
    pub service: HttpService,
    #[serde(with = "raw_bytes")]
    pub request: Vec<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "raw_bytes::option")]
    pub response: Option<Vec<u8>>,
}

impl From<WireEvent> for TrafficEvent {
    fn from(wire: WireEvent) -> Self {
        TrafficEvent {
            tool_flag: wire.tool_flag,
            is_request: wire.is_request,
            service: wire.service,
            raw_request: Arc::from(wire.request),
            raw_response: wire.response.map(Arc::from),
        }
    }
}

mod raw_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{de::Error, Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    #[serde(untagged)]
    enum Body {
        Text(String),
        Base64 { base64: String },
    }

    fn encode(bytes: &[u8]) -> Body {
        match std::str::from_utf8(bytes) {
            Ok(text) => Body::Text(text.to_string()),
            Err(_) => Body::Base64 {
                base64: STANDARD.encode(bytes),
            },
        }
    }

    fn decode(body: Body) -> Result<Vec<u8>, base64::DecodeError> {
        match body {
            Body::Text(text) => Ok(text.into_bytes()),
            Body::Base64 { base64 } => STANDARD.decode(base64),
        }
    }

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        encode(bytes).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        decode(Body::deserialize(d)?).map_err(D::Error::custom)
    }

    pub mod option {
        use super::*;

        pub fn serialize<S: Serializer>(bytes: &Option<Vec<u8>>, s: S) -> Result<S::Ok, S::Error> {
            bytes.as_deref().map(encode).serialize(s)
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<u8>>, D::Error> {
            Option::<Body>::deserialize(d)?
                .map(decode)
                .transpose()
                .map_err(D::Error::custom)
        }
    }
}

/// Payload of a `row` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowDetail {
    pub row: usize,
    #[serde(flatten)]
    pub call: CallSummary,
    pub service: HttpService,
    pub request: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
}
