//! Static policy set with content-derived fingerprints

use crate::PolicyError;
use reaper_domain::PolicyLookup;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

/// Policies governing one resource kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyEntry {
    /// Whether the policies apply to this resource kind at all
    #[serde(default = "default_applicable")]
    pub applicable: bool,

    /// Policy content; its fingerprint is what records get stamped with
    #[serde(default)]
    pub content: Value,
}

fn default_applicable() -> bool {
    true
}

impl PolicyEntry {
    /// Applicable policies with the given content
    pub fn applicable(content: Value) -> Self {
        Self {
            applicable: true,
            content,
        }
    }

    /// Fingerprint of the content
    pub fn fingerprint(&self) -> String {
        reaper_fingerprint::fingerprint(&self.content)
    }
}

/// Policy lookup over a mutable, shared table of [`PolicyEntry`]
///
/// Resource kinds without an entry have no applicable policies, and their
/// fingerprint is that of empty content.
#[derive(Debug, Clone, Default)]
pub struct StaticPolicies {
    entries: Arc<RwLock<BTreeMap<String, PolicyEntry>>>,
    unavailable: Arc<AtomicBool>,
}

impl StaticPolicies {
    /// Create an empty policy set
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a policy set from entries
    pub fn with_entries(entries: impl IntoIterator<Item = (String, PolicyEntry)>) -> Self {
        Self {
            entries: Arc::new(RwLock::new(entries.into_iter().collect())),
            unavailable: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Replace the policies for a resource kind
    pub fn set(&self, resource_kind: impl Into<String>, entry: PolicyEntry) -> Result<(), PolicyError> {
        let mut entries = self.entries.write().map_err(|_| PolicyError::Poisoned)?;
        entries.insert(resource_kind.into(), entry);
        Ok(())
    }

    /// Make every lookup fail with [`PolicyError::Unavailable`]
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn entry(&self, resource_kind: &str) -> Result<Option<PolicyEntry>, PolicyError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(PolicyError::Unavailable("policy source marked unavailable".to_string()));
        }
        let entries = self.entries.read().map_err(|_| PolicyError::Poisoned)?;
        Ok(entries.get(resource_kind).cloned())
    }
}

impl PolicyLookup for StaticPolicies {
    type Error = PolicyError;

    fn is_applicable(&self, resource_kind: &str) -> Result<bool, Self::Error> {
        Ok(self
            .entry(resource_kind)?
            .map(|entry| entry.applicable)
            .unwrap_or(false))
    }

    fn fingerprint(&self, resource_kind: &str) -> Result<String, Self::Error> {
        Ok(match self.entry(resource_kind)? {
            Some(entry) => entry.fingerprint(),
            None => reaper_fingerprint::fingerprint(&Value::Null),
        })
    }
}
