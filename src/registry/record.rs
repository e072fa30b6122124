//! Call records and the ids that order them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::traffic::{HttpService, MessageHandle};

/// Position of a call in the log. Assigned once at insertion, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SequenceId(pub u64);

impl SequenceId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SequenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Everything known about a request when it is first seen.
#[derive(Debug, Clone)]
pub struct NewCall {
    pub host: String,
    pub method: String,
    pub url: String,
    pub operation_name: String,
    pub service: HttpService,
    pub tool_flag: u32,
    pub request: MessageHandle,
}

/// One logical GraphQL call: a request, and its response once seen.
///
/// `response` and `status_code` are always set together.
#[derive(Debug, Clone)]
pub struct CallRecord {
    pub sequence_id: SequenceId,
    pub host: String,
    pub method: String,
    pub url: String,
    /// Empty when the request carried no recognizable name.
    pub operation_name: String,
    pub status_code: Option<u16>,
    pub service: HttpService,
    pub tool_flag: u32,
    pub request: MessageHandle,
    pub response: Option<MessageHandle>,
    pub requested_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
}

impl CallRecord {
    pub(crate) fn open(sequence_id: SequenceId, call: NewCall) -> Self {
        Self {
            sequence_id,
            host: call.host,
            method: call.method,
            url: call.url,
            operation_name: call.operation_name,
            status_code: None,
            service: call.service,
            tool_flag: call.tool_flag,
            request: call.request,
            response: None,
            requested_at: Utc::now(),
            responded_at: None,
        }
    }

    /// True until a response has been matched.
    pub fn is_open(&self) -> bool {
        self.response.is_none()
    }

    pub(crate) fn complete(&mut self, response: MessageHandle, status_code: u16) {
        self.response = Some(response);
        self.status_code = Some(status_code);
        self.responded_at = Some(Utc::now());
    }

    pub fn summary(&self) -> CallSummary {
        CallSummary {
            sequence_id: self.sequence_id,
            host: self.host.clone(),
            method: self.method.clone(),
            url: self.url.clone(),
            operation_name: self.operation_name.clone(),
            status_code: self.status_code,
            tool_flag: self.tool_flag,
            requested_at: self.requested_at,
            responded_at: self.responded_at,
        }
    }
}

/// Serializable view of a record without the raw messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallSummary {
    pub sequence_id: SequenceId,
    pub host: String,
    pub method: String,
    pub url: String,
    pub operation_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    pub tool_flag: u32,
    pub requested_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub responded_at: Option<DateTime<Utc>>,
}
