//! Metrics collection for Janitor operations

use reaper_domain::RecordKind;
use std::collections::BTreeMap;

/// Metrics collected during Janitor operations
///
/// Tracks records deleted per kind and how every other reconcile ended.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JanitorMetrics {
    /// Records deleted per kind
    pub deleted: BTreeMap<RecordKind, usize>,

    /// Expired records that dry-run mode left in place
    pub would_delete: usize,

    /// Passes that scheduled a check at TTL expiry
    pub requeued: usize,

    /// Expired but ineligible records whose check was pushed out by a full TTL
    pub rearmed: usize,

    /// Passes that found nothing to do (record gone or no TTL)
    pub skipped: usize,

    /// Passes that ended in an error
    pub failures: usize,

    /// Total reconcile passes started
    pub reconcile_count: usize,
}

impl JanitorMetrics {
    /// Create new empty metrics
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a deletion
    pub fn record_deletion(&mut self, kind: RecordKind) {
        *self.deleted.entry(kind).or_insert(0) += 1;
    }

    /// Record a deletion suppressed by dry-run mode
    pub fn record_would_delete(&mut self) {
        self.would_delete += 1;
    }

    /// Record a requeue until expiry
    pub fn record_requeue(&mut self) {
        self.requeued += 1;
    }

    /// Record a full-TTL re-arm
    pub fn record_rearm(&mut self) {
        self.rearmed += 1;
    }

    /// Record a pass with nothing to do
    pub fn record_skip(&mut self) {
        self.skipped += 1;
    }

    /// Record a failed pass
    pub fn record_failure(&mut self) {
        self.failures += 1;
    }

    /// Record the start of a pass
    pub fn record_reconcile(&mut self) {
        self.reconcile_count += 1;
    }

    /// Get total records deleted across all kinds
    pub fn total_deleted(&self) -> usize {
        self.deleted.values().sum()
    }

    /// Generate a summary report of metrics
    pub fn summary(&self) -> String {
        let mut lines = vec![
            "Janitor Metrics Summary".to_string(),
            "======================".to_string(),
            format!("Reconciles: {}", self.reconcile_count),
            format!("Requeued: {}", self.requeued),
            format!("Re-armed: {}", self.rearmed),
            format!("Skipped: {}", self.skipped),
            format!("Failures: {}", self.failures),
        ];
        if self.would_delete > 0 {
            lines.push(format!("Would delete (dry run): {}", self.would_delete));
        }
        lines.push(String::new());

        if !self.deleted.is_empty() {
            lines.push("Deletions by kind:".to_string());
            for (kind, count) in &self.deleted {
                lines.push(format!("  {}: {}", kind, count));
            }
            lines.push(format!("  Total: {}", self.total_deleted()));
        }

        lines.join("\n")
    }
}
