//! Call registry: the live log of GraphQL calls.
//!
//! Records are appended in arrival order and never removed until
//! [`CallRegistry::reset`]. A correlation index maps each
//! `(host, url, method)` to the most recent record inserted with that key;
//! responses are matched through it.
//!
//! ## Duplicate in-flight requests
//!
//! Inserting a second request with a key that is still awaiting a response
//! repoints the index at the new record. The older record stays in the log
//! but can no longer be matched, so it never receives a response:
//!
//! ```text
//! insert(k) -> #1   index[k] = #1
//! insert(k) -> #2   index[k] = #2
//! response(k)       #2 completed, #1 stays open
//! ```

pub mod events;
pub mod key;
pub mod record;

pub use events::{observe, ObserverHandle, RegistryEvent, RegistryObserver};
pub use key::CorrelationKey;
pub use record::{CallRecord, CallSummary, NewCall, SequenceId};

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{GqlScopeError, Result};
use crate::traffic::MessageHandle;

/// What [`CallRegistry::record_response`] did with a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseOutcome {
    /// No record is indexed under the key.
    Untracked,
    /// A record matched but the response carried no message; nothing changed.
    Empty(SequenceId),
    /// The record now holds the response and status.
    Recorded(SequenceId),
}

struct Inner {
    session_id: Uuid,
    records: Vec<CallRecord>,
    index: HashMap<CorrelationKey, usize>,
    /// Sequence id of `records[0]`.
    base: u64,
    next: u64,
    subscribers: Vec<UnboundedSender<RegistryEvent>>,
}

impl Inner {
    fn notify(&mut self, event: RegistryEvent) {
        self.subscribers.retain(|tx| tx.send(event).is_ok());
    }

    fn position(&self, sequence_id: SequenceId) -> Option<usize> {
        let offset = sequence_id.0.checked_sub(self.base)?;
        let pos = usize::try_from(offset).ok()?;
        (pos < self.records.len()).then_some(pos)
    }
}

/// Thread-safe store of call records, shared as `Arc<CallRegistry>`.
///
/// Every mutation happens in one write-locked step, so readers see a record
/// either request-only or with both response and status.
pub struct CallRegistry {
    inner: RwLock<Inner>,
}

impl Default for CallRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CallRegistry {
    pub fn new() -> Self {
        let session_id = Uuid::new_v4();
        info!(%session_id, "call registry created");
        Self {
            inner: RwLock::new(Inner {
                session_id,
                records: Vec::new(),
                index: HashMap::new(),
                base: 1,
                next: 1,
                subscribers: Vec::new(),
            }),
        }
    }

    // Mutations are single assignments, so a panic elsewhere cannot leave a
    // half-written record behind; keep serving after poisoning.
    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|poisoned| {
            warn!("registry lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|poisoned| {
            warn!("registry lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Append a request-only record and point its key at it.
    pub fn insert(&self, call: NewCall) -> SequenceId {
        let key = CorrelationKey::new(&call.host, &call.url, &call.method);
        let mut inner = self.write();

        let sequence_id = SequenceId(inner.next);
        inner.next += 1;
        let pos = inner.records.len();
        inner.records.push(CallRecord::open(sequence_id, call));

        if let Some(previous) = inner.index.insert(key, pos) {
            if inner.records[previous].is_open() {
                debug!(
                    superseded = %inner.records[previous].sequence_id,
                    by = %sequence_id,
                    "duplicate in-flight request, older call will not be matched"
                );
            }
        }

        inner.notify(RegistryEvent::Inserted(sequence_id));
        sequence_id
    }

    /// Attach a response to the record indexed under `(host, url, method)`.
    ///
    /// `response` is the raw response and its status code; `None` means the
    /// transport saw no response (e.g. the connection was aborted).
    pub fn record_response(
        &self,
        host: &str,
        method: &str,
        url: &str,
        response: Option<(MessageHandle, u16)>,
    ) -> ResponseOutcome {
        let key = CorrelationKey::new(host, url, method);
        let mut inner = self.write();

        let Some(&pos) = inner.index.get(&key) else {
            return ResponseOutcome::Untracked;
        };
        let sequence_id = inner.records[pos].sequence_id;

        match response {
            Some((handle, status_code)) => {
                inner.records[pos].complete(handle, status_code);
                inner.notify(RegistryEvent::Updated(sequence_id));
                ResponseOutcome::Recorded(sequence_id)
            }
            None => ResponseOutcome::Empty(sequence_id),
        }
    }

    /// Ordered copy of every record.
    pub fn snapshot(&self) -> Vec<CallRecord> {
        self.read().records.clone()
    }

    pub fn summaries(&self) -> Vec<CallSummary> {
        self.read().records.iter().map(CallRecord::summary).collect()
    }

    /// Record by sequence id.
    pub fn get(&self, sequence_id: SequenceId) -> Result<CallRecord> {
        let inner = self.read();
        inner
            .position(sequence_id)
            .map(|pos| inner.records[pos].clone())
            .ok_or(GqlScopeError::UnknownSequence(sequence_id.0))
    }

    /// Record by display row (0-based).
    pub fn get_row(&self, row: usize) -> Result<CallRecord> {
        let inner = self.read();
        inner
            .records
            .get(row)
            .cloned()
            .ok_or(GqlScopeError::RowOutOfRange {
                row,
                len: inner.records.len(),
            })
    }

    /// Display row of a sequence id, if it is still in the log.
    pub fn row_of(&self, sequence_id: SequenceId) -> Option<usize> {
        self.read().position(sequence_id)
    }

    pub fn len(&self) -> usize {
        self.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn session_id(&self) -> Uuid {
        self.read().session_id
    }

    /// Clear the log and start a new session.
    ///
    /// Sequence ids keep counting from where they were.
    pub fn reset(&self) {
        let mut inner = self.write();
        let cleared = inner.records.len();
        inner.records.clear();
        inner.index.clear();
        inner.base = inner.next;
        inner.session_id = Uuid::new_v4();
        info!(session_id = %inner.session_id, cleared, "call registry reset");
        inner.notify(RegistryEvent::Reset);
    }

    /// Channel of change events from now on.
    pub fn subscribe(&self) -> UnboundedReceiver<RegistryEvent> {
        let (tx, rx) = unbounded_channel();
        self.write().subscribers.push(tx);
        rx
    }
}
