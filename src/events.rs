//! Observability events emitted while slicing
//!
//! Cursors report noteworthy steps through a synchronous observer passed in
//! at construction. Emission is best-effort and non-blocking: observers must
//! return quickly and never fail.

use chrono::{DateTime, Utc};
use std::sync::Mutex;

/// A noteworthy step taken by a cursor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlicerEvent {
    /// Start/end discovery completed; carries the effective global bounds
    RangeResolved {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    /// An oversized window or key prefix was split
    Recursion,
    /// An empty window was widened to find data
    RangeExpansion,
}

/// Callback interface for slicer events
pub trait SlicerObserver: Send + Sync {
    fn on_event(&self, event: &SlicerEvent);
}

/// Observer that discards all events
#[derive(Debug, Default)]
pub struct NoopObserver;

impl SlicerObserver for NoopObserver {
    fn on_event(&self, _event: &SlicerEvent) {}
}

/// Observer that records every event, in order
///
/// Useful for callers that react to recursion/expansion after the fact, and
/// for asserting on slicer behavior in tests.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<SlicerEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// All events recorded so far
    pub fn events(&self) -> Vec<SlicerEvent> {
        self.events.lock().expect("observer lock poisoned").clone()
    }

    /// Whether any recorded event matches the predicate
    pub fn saw(&self, predicate: impl Fn(&SlicerEvent) -> bool) -> bool {
        self.events
            .lock()
            .expect("observer lock poisoned")
            .iter()
            .any(predicate)
    }
}

impl SlicerObserver for RecordingObserver {
    fn on_event(&self, event: &SlicerEvent) {
        self.events
            .lock()
            .expect("observer lock poisoned")
            .push(event.clone());
    }
}
