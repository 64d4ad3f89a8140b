//! Trait definitions for external interactions
//!
//! These traits define the boundaries between the reconcile logic and the
//! systems it consults. Implementations live in other crates.

use crate::{Record, RecordKey, RecordUid};

/// Result of a delete request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The record was removed by this call
    Deleted,

    /// Nothing matched: already removed, or replaced by a newer incarnation
    NotFound,
}

/// Read, list and delete access to watched records
///
/// A missing record is `Ok(None)` from `get` and `Ok(DeleteOutcome::NotFound)`
/// from `delete`, never an error. Errors are reserved for failures the caller
/// should retry.
pub trait RecordStore {
    /// Error type for store operations
    type Error;

    /// Fetch the current state of a record
    fn get(&self, key: &RecordKey) -> Result<Option<Record>, Self::Error>;

    /// Current state of every record, used to resync after missed events
    fn list(&self) -> Result<Vec<Record>, Self::Error>;

    /// Delete a record, only if its current incarnation is `uid`
    fn delete(&self, key: &RecordKey, uid: RecordUid) -> Result<DeleteOutcome, Self::Error>;
}

/// Read-only view of the policy set that governs report generation
pub trait PolicyLookup {
    /// Error type for policy operations
    type Error;

    /// Whether any policies apply to resources of `resource_kind`
    fn is_applicable(&self, resource_kind: &str) -> Result<bool, Self::Error>;

    /// Fingerprint of the policies currently active for `resource_kind`
    fn fingerprint(&self, resource_kind: &str) -> Result<String, Self::Error>;
}

impl<T: RecordStore + ?Sized> RecordStore for std::sync::Arc<T> {
    type Error = T::Error;

    fn get(&self, key: &RecordKey) -> Result<Option<Record>, Self::Error> {
        (**self).get(key)
    }

    fn list(&self) -> Result<Vec<Record>, Self::Error> {
        (**self).list()
    }

    fn delete(&self, key: &RecordKey, uid: RecordUid) -> Result<DeleteOutcome, Self::Error> {
        (**self).delete(key, uid)
    }
}

impl<T: PolicyLookup + ?Sized> PolicyLookup for std::sync::Arc<T> {
    type Error = T::Error;

    fn is_applicable(&self, resource_kind: &str) -> Result<bool, Self::Error> {
        (**self).is_applicable(resource_kind)
    }

    fn fingerprint(&self, resource_kind: &str) -> Result<String, Self::Error> {
        (**self).fingerprint(resource_kind)
    }
}
