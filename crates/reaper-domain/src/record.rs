//! Record module - the watched entity subject to TTL collection

use crate::RecordKind;
use std::collections::BTreeMap;
use std::fmt;
use std::time::SystemTime;

/// Annotation carrying the TTL of a scan report (e.g. `"24h"`)
pub const TTL_REPORT_ANNOTATION: &str = "trivy-operator.aquasecurity.github.io/report-ttl";

/// Annotation carrying the TTL of a scan-job secret
pub const TTL_SECRET_ANNOTATION: &str = "trivy-operator.aquasecurity.github.io/secret-ttl";

/// Label naming the kind of resource whose policies produced the record
pub const LABEL_RESOURCE_KIND: &str = "trivy-operator.resource.kind";

/// Label carrying the policy fingerprint the record was produced under
pub const LABEL_POLICY_CONFIG_HASH: &str = "trivy-operator.plugin.config.hash";

/// Label identifying the component managing a record
pub const LABEL_MANAGED_BY: &str = "app.kubernetes.io/managed-by";

/// Value of [`LABEL_MANAGED_BY`] on records owned by the operator
pub const MANAGED_BY_OPERATOR: &str = "trivy-operator";

/// Unique identifier of one incarnation of a record, based on UUIDv7
///
/// A record deleted and re-created under the same key gets a new uid, which
/// lets deletes carry a precondition on the incarnation that was inspected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordUid(u128);

impl RecordUid {
    /// Generate a new UUIDv7-based uid
    ///
    /// # Examples
    ///
    /// ```
    /// use reaper_domain::RecordUid;
    ///
    /// let uid = RecordUid::new();
    /// assert!(uid.value() > 0);
    /// ```
    pub fn new() -> Self {
        Self(uuid::Uuid::now_v7().as_u128())
    }

    /// Parse a uid from its hyphenated string form
    pub fn from_string(s: &str) -> Result<Self, String> {
        uuid::Uuid::parse_str(s)
            .map(|u| Self(u.as_u128()))
            .map_err(|e| format!("Invalid record uid: {}", e))
    }

    /// Get the raw u128 value
    pub fn value(&self) -> u128 {
        self.0
    }
}

impl Default for RecordUid {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", uuid::Uuid::from_u128(self.0))
    }
}

/// Identity of a record: kind, optional namespace, and name
///
/// Cluster-scoped kinds have no namespace.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordKey {
    /// Kind of the record
    pub kind: RecordKind,

    /// Namespace, `None` for cluster-scoped records
    pub namespace: Option<String>,

    /// Name, unique within kind and namespace
    pub name: String,
}

impl RecordKey {
    /// Key for a namespaced record
    pub fn namespaced(kind: RecordKind, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind,
            namespace: Some(namespace.into()),
            name: name.into(),
        }
    }

    /// Key for a cluster-scoped record
    pub fn cluster(kind: RecordKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            namespace: None,
            name: name.into(),
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}/{}/{}", self.kind, ns, self.name),
            None => write!(f, "{}/{}", self.kind, self.name),
        }
    }
}

/// A watched record
///
/// Records are created and annotated by writers outside the janitor. The
/// janitor only reads them and, when they expire, removes them whole.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Identity
    pub key: RecordKey,

    /// Incarnation identifier
    pub uid: RecordUid,

    /// When this record was created
    pub created_at: SystemTime,

    /// Set once deletion of the record has been requested
    pub deletion_timestamp: Option<SystemTime>,

    /// Free-form annotations (TTL lives here)
    pub annotations: BTreeMap<String, String>,

    /// Labels (resource kind and policy fingerprint live here)
    pub labels: BTreeMap<String, String>,
}

impl Record {
    /// Create a record with no annotations or labels
    pub fn new(key: RecordKey, created_at: SystemTime) -> Self {
        Self {
            key,
            uid: RecordUid::new(),
            created_at,
            deletion_timestamp: None,
            annotations: BTreeMap::new(),
            labels: BTreeMap::new(),
        }
    }

    /// Builder-style annotation setter
    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }

    /// Builder-style label setter
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Raw TTL annotation for this record's kind, if present
    pub fn ttl_annotation(&self) -> Option<&str> {
        self.annotations
            .get(self.key.kind.ttl_annotation())
            .map(String::as_str)
    }

    /// Label naming the resource kind whose policies produced this record
    pub fn resource_kind(&self) -> Option<&str> {
        self.labels.get(LABEL_RESOURCE_KIND).map(String::as_str)
    }

    /// Policy fingerprint stamped on this record at creation
    pub fn policy_config_hash(&self) -> Option<&str> {
        self.labels.get(LABEL_POLICY_CONFIG_HASH).map(String::as_str)
    }

    /// Whether deletion of this record is already underway
    pub fn is_terminating(&self) -> bool {
        self.deletion_timestamp.is_some()
    }

    /// Whether the operator manages this record
    pub fn is_managed_by_operator(&self) -> bool {
        self.labels.get(LABEL_MANAGED_BY).map(String::as_str) == Some(MANAGED_BY_OPERATOR)
    }
}
