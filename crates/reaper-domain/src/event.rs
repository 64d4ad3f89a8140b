//! Watch events - changes observed on the record feed

use crate::Record;

/// Kind of change a watch event reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Record created
    Added,

    /// Record changed
    Modified,

    /// Record removed
    Deleted,
}

/// One observation from the watch feed
///
/// The record is the state at the time of the event; consumers re-fetch
/// before acting, so stale or duplicate events are harmless.
#[derive(Debug, Clone, PartialEq)]
pub struct WatchEvent {
    /// What happened
    pub kind: EventKind,

    /// The record it happened to
    pub record: Record,
}

impl WatchEvent {
    /// Create an event
    pub fn new(kind: EventKind, record: Record) -> Self {
        Self { kind, record }
    }
}
