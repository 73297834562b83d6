//! Per-operation result notifications.
//!
//! A reconciler holds at most one [`OperationListener`]. It is called once
//! for every processed operation, after the local store has been updated,
//! in the order the operations were replayed within their table.

use crate::error::DocumentError;
use docsync_protocol::{DocumentMetadata, OperationKind};
use parking_lot::{Mutex, RwLock};
use std::sync::mpsc::{self, Receiver, Sender};

/// Outcome of one replayed operation.
pub type OperationResult = Result<DocumentMetadata, DocumentError>;

/// Receives the outcome of each replayed operation.
pub trait OperationListener: Send + Sync {
    /// Called once per processed operation.
    fn on_operation_result(&self, kind: &OperationKind, result: &OperationResult);
}

impl<F> OperationListener for F
where
    F: Fn(&OperationKind, &OperationResult) + Send + Sync,
{
    fn on_operation_result(&self, kind: &OperationKind, result: &OperationResult) {
        self(kind, result);
    }
}

/// One delivered notification.
#[derive(Debug, Clone)]
pub struct OperationEvent {
    /// Kind of the replayed operation.
    pub kind: OperationKind,
    /// Its outcome.
    pub result: OperationResult,
}

impl OperationEvent {
    /// Returns the metadata of a successful operation.
    pub fn metadata(&self) -> Option<&DocumentMetadata> {
        self.result.as_ref().ok()
    }

    /// Returns the error of a failed operation.
    pub fn error(&self) -> Option<&DocumentError> {
        self.result.as_ref().err()
    }
}

/// A listener that keeps every event it receives.
#[derive(Debug, Default)]
pub struct RecordingListener {
    events: Mutex<Vec<OperationEvent>>,
}

impl RecordingListener {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the recorded events in delivery order.
    pub fn events(&self) -> Vec<OperationEvent> {
        self.events.lock().clone()
    }

    /// Returns the number of recorded events.
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Returns true if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes and returns the recorded events.
    pub fn take(&self) -> Vec<OperationEvent> {
        std::mem::take(&mut *self.events.lock())
    }
}

impl OperationListener for RecordingListener {
    fn on_operation_result(&self, kind: &OperationKind, result: &OperationResult) {
        self.events.lock().push(OperationEvent {
            kind: kind.clone(),
            result: result.clone(),
        });
    }
}

/// A listener that fans events out to channel subscribers.
///
/// Subscribers whose receiver was dropped are removed on the next event.
#[derive(Debug, Default)]
pub struct ChannelListener {
    subscribers: RwLock<Vec<Sender<OperationEvent>>>,
}

impl ChannelListener {
    /// Creates a listener with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a receiver for all future events.
    pub fn subscribe(&self) -> Receiver<OperationEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.write().push(tx);
        rx
    }

    /// Returns the number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
}

impl OperationListener for ChannelListener {
    fn on_operation_result(&self, kind: &OperationKind, result: &OperationResult) {
        let event = OperationEvent {
            kind: kind.clone(),
            result: result.clone(),
        };
        self.subscribers
            .write()
            .retain(|tx| tx.send(event.clone()).is_ok());
    }
}
