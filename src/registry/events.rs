//! Change notifications for registry consumers.
//!
//! Subscribers get a channel of [`RegistryEvent`]s. Events are sent while the
//! registry's write lock is held, so inserts arrive in sequence-id order.
//! [`observe`] adapts a channel to callback-style [`RegistryObserver`]s.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, warn};

use super::record::SequenceId;
use super::CallRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryEvent {
    /// A new row was appended.
    Inserted(SequenceId),
    /// A row received its response.
    Updated(SequenceId),
    /// The log was cleared.
    Reset,
}

/// Callbacks for a presentation layer.
///
/// Called from a dedicated dispatcher thread, never while the registry is
/// locked, so implementations may query the registry.
pub trait RegistryObserver: Send + 'static {
    fn on_insert(&mut self, sequence_id: SequenceId);

    fn on_update(&mut self, sequence_id: SequenceId);

    fn on_reset(&mut self) {}
}

/// Keeps an observer's dispatcher thread alive.
///
/// The thread ends once the registry is dropped or the observer panics;
/// [`ObserverHandle::join`] waits for it.
pub struct ObserverHandle {
    thread: JoinHandle<()>,
}

impl ObserverHandle {
    /// Wait for the dispatcher. An observer panic is logged and handed back.
    pub fn join(self) -> thread::Result<()> {
        let result = self.thread.join();
        if result.is_err() {
            warn!("registry observer panicked, its notifications stopped");
        }
        result
    }
}

/// Subscribe `observer` to `registry` and drive it from a background thread.
pub fn observe<O: RegistryObserver>(registry: &Arc<CallRegistry>, observer: O) -> ObserverHandle {
    let receiver = registry.subscribe();
    let thread = thread::spawn(move || dispatch(receiver, observer));
    ObserverHandle { thread }
}

fn dispatch<O: RegistryObserver>(mut receiver: UnboundedReceiver<RegistryEvent>, mut observer: O) {
    while let Some(event) = receiver.blocking_recv() {
        match event {
            RegistryEvent::Inserted(seq) => observer.on_insert(seq),
            RegistryEvent::Updated(seq) => observer.on_update(seq),
            RegistryEvent::Reset => observer.on_reset(),
        }
    }
    debug!("registry closed, observer dispatcher exiting");
}
