//! Ingest pipeline: traffic events in, registry updates out.
//!
//! Every event is analyzed, filtered down to GraphQL endpoints, and routed to
//! either [`CallRegistry::insert`] or [`CallRegistry::record_response`].
//! Nothing that goes wrong with a single event escapes this module: analyzer
//! errors and panics are logged and counted, and the next event is handled
//! normally.

use serde::{Deserialize, Serialize};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace, warn};
use url::Url;

use crate::config::Config;
use crate::error::Result;
use crate::extract::{extract_with_mode, ExtractMode};
use crate::registry::{CallRegistry, NewCall, ResponseOutcome, SequenceId};
use crate::traffic::{MessageAnalyzer, TrafficEvent};

/// Case-insensitive substring filter on the path and query of a URL.
#[derive(Debug, Clone)]
pub struct EndpointFilter {
    marker: String,
}

impl Default for EndpointFilter {
    fn default() -> Self {
        Self::new("/graphql")
    }
}

impl EndpointFilter {
    pub fn new(marker: &str) -> Self {
        Self {
            marker: marker.to_lowercase(),
        }
    }

    /// True when the path or query of `url` contains the marker.
    ///
    /// The scheme, userinfo and host are skipped so that
    /// `https://graphql.example.com/` is not mistaken for a GraphQL path. A
    /// URL that does not parse as absolute is searched as a whole.
    pub fn matches(&self, url: &str) -> bool {
        match Url::parse(url) {
            Ok(parsed) if parsed.has_host() => {
                let mut target = parsed.path().to_lowercase();
                if let Some(query) = parsed.query() {
                    target.push('?');
                    target.push_str(&query.to_lowercase());
                }
                target.contains(&self.marker)
            }
            _ => url.to_lowercase().contains(&self.marker),
        }
    }
}

/// What happened to one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Not a GraphQL endpoint.
    Ignored,
    Inserted(SequenceId),
    Updated(SequenceId),
    /// Matched a record, but the transport had no response bytes.
    ResponseEmpty(SequenceId),
    /// Response for a request that is not in the log.
    Unmatched,
    /// The event could not be analyzed; it was logged and dropped.
    Rejected,
}

/// Running totals over all events handled by a pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestStats {
    pub seen: u64,
    pub ignored: u64,
    pub inserted: u64,
    pub updated: u64,
    /// Responses that matched a record but carried no bytes.
    pub empty: u64,
    pub unmatched: u64,
    pub rejected: u64,
}

#[derive(Default)]
struct Counters {
    seen: AtomicU64,
    ignored: AtomicU64,
    inserted: AtomicU64,
    updated: AtomicU64,
    empty: AtomicU64,
    unmatched: AtomicU64,
    rejected: AtomicU64,
}

impl Counters {
    fn record(&self, outcome: IngestOutcome) {
        self.seen.fetch_add(1, Ordering::Relaxed);
        let counter = match outcome {
            IngestOutcome::Ignored => &self.ignored,
            IngestOutcome::Inserted(_) => &self.inserted,
            IngestOutcome::Updated(_) => &self.updated,
            IngestOutcome::ResponseEmpty(_) => &self.empty,
            IngestOutcome::Unmatched => &self.unmatched,
            IngestOutcome::Rejected => &self.rejected,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> IngestStats {
        IngestStats {
            seen: self.seen.load(Ordering::Relaxed),
            ignored: self.ignored.load(Ordering::Relaxed),
            inserted: self.inserted.load(Ordering::Relaxed),
            updated: self.updated.load(Ordering::Relaxed),
            empty: self.empty.load(Ordering::Relaxed),
            unmatched: self.unmatched.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
        }
    }
}

/// Routes traffic events into a [`CallRegistry`].
///
/// Safe to call from any number of proxy worker threads at once.
pub struct IngestPipeline {
    registry: Arc<CallRegistry>,
    analyzer: Arc<dyn MessageAnalyzer>,
    filter: EndpointFilter,
    extract_mode: ExtractMode,
    counters: Counters,
}

impl IngestPipeline {
    pub fn new(registry: Arc<CallRegistry>, analyzer: Arc<dyn MessageAnalyzer>) -> Self {
        Self {
            registry,
            analyzer,
            filter: EndpointFilter::default(),
            extract_mode: ExtractMode::default(),
            counters: Counters::default(),
        }
    }

    pub fn with_config(
        registry: Arc<CallRegistry>,
        analyzer: Arc<dyn MessageAnalyzer>,
        config: &Config,
    ) -> Self {
        Self {
            filter: EndpointFilter::new(&config.endpoint_marker),
            extract_mode: config.extract_mode,
            ..Self::new(registry, analyzer)
        }
    }

    pub fn registry(&self) -> &Arc<CallRegistry> {
        &self.registry
    }

    pub fn stats(&self) -> IngestStats {
        self.counters.snapshot()
    }

    /// Handle one traffic event. Never fails and never panics.
    pub fn on_traffic_event(&self, event: &TrafficEvent) -> IngestOutcome {
        let outcome = match panic::catch_unwind(AssertUnwindSafe(|| self.route(event))) {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                warn!(service = %event.service, is_request = event.is_request, error = %e, "dropping malformed event");
                IngestOutcome::Rejected
            }
            Err(_) => {
                warn!(service = %event.service, is_request = event.is_request, "panic while handling event, dropped");
                IngestOutcome::Rejected
            }
        };
        self.counters.record(outcome);
        trace!(?outcome, "event handled");
        outcome
    }

    fn route(&self, event: &TrafficEvent) -> Result<IngestOutcome> {
        let info = self
            .analyzer
            .analyze_request(&event.service, &event.raw_request)?;

        if !self.filter.matches(&info.url) {
            return Ok(IngestOutcome::Ignored);
        }

        let host = event.service.host.as_str();

        if event.is_request {
            let operation_name =
                extract_with_mode(&event.raw_request, info.body_offset, self.extract_mode);
            debug!(%host, method = %info.method, url = %info.url, operation = %operation_name, "graphql request");
            let sequence_id = self.registry.insert(NewCall {
                host: host.to_string(),
                method: info.method,
                url: info.url,
                operation_name,
                service: event.service.clone(),
                tool_flag: event.tool_flag,
                request: Arc::clone(&event.raw_request),
            });
            return Ok(IngestOutcome::Inserted(sequence_id));
        }

        let response = match &event.raw_response {
            Some(raw) if !raw.is_empty() => {
                let status = self.analyzer.analyze_response(raw)?;
                Some((Arc::clone(raw), status.status_code))
            }
            _ => None,
        };

        let outcome = match self
            .registry
            .record_response(host, &info.method, &info.url, response)
        {
            ResponseOutcome::Recorded(seq) => {
                debug!(%seq, url = %info.url, "graphql response matched");
                IngestOutcome::Updated(seq)
            }
            ResponseOutcome::Empty(seq) => IngestOutcome::ResponseEmpty(seq),
            ResponseOutcome::Untracked => {
                debug!(url = %info.url, "response without a tracked request");
                IngestOutcome::Unmatched
            }
        };
        Ok(outcome)
    }
}
