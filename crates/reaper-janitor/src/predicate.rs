//! Event filters applied before a key is queued

use crate::{InstallMode, JanitorConfig};
use reaper_domain::{Record, RecordKind, WatchEvent};
use std::collections::BTreeSet;

/// Decides which watch events trigger a reconcile
///
/// Reports must be of a watched kind, not already terminating, and inside
/// the install scope. Secrets must be managed by the operator and live in the
/// operator namespace.
#[derive(Debug, Clone)]
pub struct EventFilter {
    watched: BTreeSet<RecordKind>,
    install_mode: InstallMode,
    target_namespaces: BTreeSet<String>,
    operator_namespace: String,
}

impl EventFilter {
    /// Build the filter from configuration
    pub fn from_config(config: &JanitorConfig) -> Self {
        Self {
            watched: config.watched_kinds().into_iter().collect(),
            install_mode: config.install_mode(),
            target_namespaces: config.target_namespaces.iter().cloned().collect(),
            operator_namespace: config.operator_namespace.clone(),
        }
    }

    /// Whether this event should trigger a reconcile
    pub fn accepts(&self, event: &WatchEvent) -> bool {
        let record = &event.record;
        if !self.watched.contains(&record.key.kind) {
            return false;
        }
        if record.key.kind.is_report() {
            !record.is_terminating() && self.in_install_scope(record)
        } else {
            record.is_managed_by_operator() && self.in_operator_namespace(record)
        }
    }

    /// Namespaced records must be in a target namespace unless all are watched
    pub fn in_install_scope(&self, record: &Record) -> bool {
        match (self.install_mode, record.key.namespace.as_deref()) {
            (InstallMode::AllNamespaces, _) | (_, None) => true,
            (_, Some(namespace)) => self.target_namespaces.contains(namespace),
        }
    }

    fn in_operator_namespace(&self, record: &Record) -> bool {
        record.key.namespace.as_deref() == Some(self.operator_namespace.as_str())
    }
}
