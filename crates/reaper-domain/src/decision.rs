//! Decision module - the output of one reconcile pass

use crate::format_duration;
use std::fmt;
use std::time::Duration;

/// What a reconcile pass concluded for a record
///
/// Decisions are ephemeral; the next pass recomputes from scratch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Nothing to do: the record is gone or has no TTL
    NoAction,

    /// The record was expired and eligible, and has been removed
    DeleteNow,

    /// Check the record again after this delay
    RequeueAfter(Duration),
}

impl Decision {
    /// Requeue delay, if this decision schedules another pass
    pub fn requeue_after(&self) -> Option<Duration> {
        match self {
            Decision::RequeueAfter(delay) => Some(*delay),
            Decision::NoAction | Decision::DeleteNow => None,
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::NoAction => f.write_str("no-action"),
            Decision::DeleteNow => f.write_str("delete"),
            Decision::RequeueAfter(delay) => write!(f, "requeue-after {}", format_duration(*delay)),
        }
    }
}
