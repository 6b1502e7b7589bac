//! Change notifications for presentation layers.
//!
//! Listeners are called synchronously from inside the triggering call,
//! after the store write (and index update) completed, so a listener that
//! reads back from the store sees the new state. No ordering is promised
//! across listeners.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RecorderEvent {
    EntryAdded { id: String },
    EntryDeleted { id: String },
    IndexRebuilt { documents: usize },
}

/// Receives [`RecorderEvent`]s.
///
/// Implemented for any `Fn(&RecorderEvent) + Send + Sync` closure.
pub trait EventListener: Send + Sync {
    fn on_event(&self, event: &RecorderEvent);
}

impl<F> EventListener for F
where
    F: Fn(&RecorderEvent) + Send + Sync,
{
    fn on_event(&self, event: &RecorderEvent) {
        self(event)
    }
}
