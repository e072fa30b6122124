//! # gqlscope
//!
//! Passive GraphQL traffic inspector. Sits behind an intercepting proxy.
//!
//! The proxy delivers requests and responses as separate events, from its
//! own worker threads, in any order. gqlscope keeps the GraphQL ones, pulls
//! out each call's `operationName`, and pairs every request with its
//! response in a live log that a viewer can query.
//!
//! ## Key Features
//!
//! - **Correlation**: responses are matched by `(host, url, method)`
//! - **Live**: observers are told about every new row and every update
//! - **Forgiving**: malformed traffic is logged and skipped, never fatal
//! - **Embeddable**: no UI toolkit; a Unix-socket daemon for everything else
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gqlscope::{CallRegistry, Http1Analyzer, HttpService, IngestPipeline, TrafficEvent, ViewerFacade};
//! use std::sync::Arc;
//!
//! let registry = Arc::new(CallRegistry::new());
//! let pipeline = IngestPipeline::new(Arc::clone(&registry), Arc::new(Http1Analyzer));
//! let viewer = ViewerFacade::new(registry);
//!
//! let raw = b"POST /graphql HTTP/1.1\r\n\r\n{\"operationName\":\"GetUser\"}".to_vec();
//! pipeline.on_traffic_event(&TrafficEvent::request(HttpService::https("api.example.com"), raw));
//! assert_eq!(viewer.row_count(), 1);
//! ```

pub mod config;
pub mod daemon;
pub mod error;
pub mod extract;
pub mod ingest;
pub mod registry;
pub mod traffic;
pub mod viewer;

// Re-exports for convenience
pub use config::Config;
pub use error::{GqlScopeError, Result};

pub use extract::{extract_operation_name, extract_with_mode, ExtractMode};
pub use ingest::{EndpointFilter, IngestOutcome, IngestPipeline, IngestStats};
pub use registry::{
    observe, CallRecord, CallRegistry, CallSummary, CorrelationKey, NewCall, ObserverHandle,
    RegistryEvent, RegistryObserver, ResponseOutcome, SequenceId,
};
pub use traffic::{
    Http1Analyzer, HttpService, MessageAnalyzer, MessageHandle, RequestInfo, ResponseInfo,
    TrafficEvent,
};
pub use viewer::{Column, DisplayValue, ViewerFacade};
