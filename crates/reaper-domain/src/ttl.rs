//! TTL evaluator
//!
//! Computes whether a record's retention window has elapsed and, if not, how
//! long until it does. The result depends only on its inputs, so repeated
//! reconcile passes against an unchanged clock agree with each other.

use crate::Clock;
use std::time::{Duration, SystemTime};

/// Outcome of evaluating a TTL against the clock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtlStatus {
    /// The TTL has elapsed
    pub expired: bool,

    /// Time left until expiry; always zero once expired
    pub remaining: Duration,
}

/// Evaluate `ttl` for a record created at `created_at`
///
/// `remaining = ttl - (now - created_at)`, and the record is expired when
/// that is not positive. A creation instant in the future counts as age zero.
///
/// # Examples
///
/// ```
/// use reaper_domain::{evaluate, ManualClock};
/// use std::time::{Duration, UNIX_EPOCH};
///
/// let created = UNIX_EPOCH;
/// let clock = ManualClock::new(created + Duration::from_secs(30 * 60));
///
/// let status = evaluate(Duration::from_secs(3600), created, &clock);
/// assert!(!status.expired);
/// assert_eq!(status.remaining, Duration::from_secs(30 * 60));
/// ```
pub fn evaluate<C: Clock + ?Sized>(ttl: Duration, created_at: SystemTime, clock: &C) -> TtlStatus {
    let age = clock
        .now()
        .duration_since(created_at)
        .unwrap_or(Duration::ZERO);

    match ttl.checked_sub(age) {
        Some(remaining) if !remaining.is_zero() => TtlStatus {
            expired: false,
            remaining,
        },
        _ => TtlStatus {
            expired: true,
            remaining: Duration::ZERO,
        },
    }
}
