//! Reaper Fingerprint
//!
//! Stable, short fingerprints of arbitrary serializable values.
//!
//! A fingerprint labels a record with "the policy configuration that produced
//! me" and is later compared against the fingerprint of the live policy set to
//! detect drift. Structurally equal values always fingerprint identically:
//!
//! - pointers (`Box`, `&`) are transparent, only the pointee is written
//! - map entries are sorted by their canonical key bytes, so `HashMap`
//!   iteration order never leaks into the result
//! - type and shape information is written alongside every value, so `5u32`,
//!   `5u64` and `"5"` all differ
//!
//! The canonical bytes feed a 32-bit FNV-1a hash whose decimal form is then
//! re-encoded into a vowel-free alphabet, since fingerprints end up in labels
//! and object names that people read.
//!
//! # Examples
//!
//! ```
//! use reaper_fingerprint::fingerprint;
//! use std::collections::{BTreeMap, HashMap};
//!
//! let mut a = HashMap::new();
//! a.insert("severity", vec!["HIGH", "CRITICAL"]);
//! a.insert("kinds", vec!["Pod"]);
//!
//! let mut b = BTreeMap::new();
//! b.insert("kinds", vec!["Pod"]);
//! b.insert("severity", vec!["HIGH", "CRITICAL"]);
//!
//! assert_eq!(fingerprint(&a), fingerprint(&b));
//! assert!(fingerprint(&a).chars().all(|c| "bcdfghjklmnpqrstvwxz2456789".contains(c)));
//! ```

#![warn(missing_docs)]

mod canonical;
mod encode;
mod fnv;

pub use canonical::{canonical_bytes, MAX_DEPTH};
pub use encode::{encode_checksum, safe_encode, SAFE_ALPHABET};
pub use fnv::Fnv1a32;

use serde::Serialize;

/// Fingerprint a value
///
/// Never fails: values that refuse to serialize, or that nest deeper than
/// [`MAX_DEPTH`], still produce a deterministic fingerprint.
pub fn fingerprint<T: Serialize + ?Sized>(value: &T) -> String {
    encode_checksum(checksum(value))
}

/// Raw 32-bit checksum of a value's canonical bytes
pub fn checksum<T: Serialize + ?Sized>(value: &T) -> u32 {
    let mut hasher = Fnv1a32::new();
    hasher.update(&canonical_bytes(value));
    hasher.sum32()
}
