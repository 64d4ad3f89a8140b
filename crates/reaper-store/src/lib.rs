//! Reaper Storage Layer
//!
//! In-process implementations of the collaborators the janitor consults:
//!
//! - [`MemoryStore`]: a [`RecordStore`](reaper_domain::RecordStore) holding
//!   records in memory and publishing a watch feed of every change
//! - [`StaticPolicies`]: a [`PolicyLookup`](reaper_domain::PolicyLookup)
//!   whose fingerprints are computed from the policy content itself
//! - [`snapshot`]: JSON documents describing records and policies, used to
//!   seed both of the above
//!
//! # Examples
//!
//! ```
//! use reaper_domain::{Record, RecordKey, RecordKind, RecordStore};
//! use reaper_store::MemoryStore;
//! use std::time::SystemTime;
//!
//! let store = MemoryStore::new();
//! let key = RecordKey::namespaced(RecordKind::VulnerabilityReport, "default", "pod-nginx");
//! store.insert(Record::new(key.clone(), SystemTime::now())).unwrap();
//!
//! assert!(store.get(&key).unwrap().is_some());
//! ```

#![warn(missing_docs)]

mod memory;
mod policies;
pub mod snapshot;

pub use memory::MemoryStore;
pub use policies::{PolicyEntry, StaticPolicies};
pub use snapshot::SnapshotError;

use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Store cannot be reached
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Internal lock was poisoned by a panicking writer
    #[error("Store lock poisoned")]
    Poisoned,
}

/// Errors from the policy lookup
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PolicyError {
    /// Policy source cannot be read
    #[error("Policies unavailable: {0}")]
    Unavailable(String),

    /// Internal lock was poisoned by a panicking writer
    #[error("Policy lock poisoned")]
    Poisoned,
}
