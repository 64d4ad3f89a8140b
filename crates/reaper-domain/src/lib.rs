//! Reaper Domain Layer
//!
//! Core model for TTL-driven garbage collection of scan-report records.
//! Infrastructure (stores, policy sources, the dispatch worker) lives in
//! other crates and talks to this one through the traits in [`traits`].
//!
//! ## Key Concepts
//!
//! - **Record**: a watched, annotated entity identified by kind, namespace and name
//! - **TTL**: a duration annotation after which a record is considered for deletion
//! - **Historical sentinel**: a TTL of exactly zero, deleted unconditionally once observed
//! - **Decision**: the single output of a reconcile pass
//!
//! ## Architecture
//!
//! - Pure logic only; the TTL evaluator never reads the wall clock directly
//! - All time comes through the [`Clock`] trait so tests can pin it
//! - Collaborators (record store, policy lookup) are trait definitions only

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod clock;
pub mod decision;
pub mod duration;
pub mod event;
pub mod kind;
pub mod record;
pub mod traits;
pub mod ttl;

// Re-exports for convenience
pub use clock::{Clock, ManualClock, SystemClock};
pub use decision::Decision;
pub use duration::{format_duration, parse_duration, DurationParseError};
pub use event::{EventKind, WatchEvent};
pub use kind::RecordKind;
pub use record::{Record, RecordKey, RecordUid};
pub use traits::{DeleteOutcome, PolicyLookup, RecordStore};
pub use ttl::{evaluate, TtlStatus};
