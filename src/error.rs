//! Error types for gqlscope.
//!
//! Only caller bugs (out-of-range queries) and setup failures surface as
//! errors. Traffic variance (missing operation names, unmatched responses,
//! malformed events) is absorbed by the ingest pipeline.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, GqlScopeError>;

#[derive(Debug, Error)]
pub enum GqlScopeError {
    /// A row index past the end of the log.
    #[error("row {row} out of range (log has {len} rows)")]
    RowOutOfRange { row: usize, len: usize },

    /// A sequence id that was never assigned, or was cleared by a reset.
    #[error("no call with sequence id {0}")]
    UnknownSequence(u64),

    /// Raw HTTP bytes the analyzer could not make sense of.
    #[error("malformed message: {0}")]
    MalformedMessage(String),

    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    #[error("unknown column: {0}")]
    UnknownColumn(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
