//! JSON snapshots of records and policies
//!
//! Records use Kubernetes-style metadata:
//!
//! ```json
//! {
//!   "records": [
//!     {
//!       "kind": "ConfigAuditReport",
//!       "metadata": {
//!         "name": "replicaset-nginx-6d4cf56db6",
//!         "namespace": "default",
//!         "creationTimestamp": "2024-03-01T10:00:00Z",
//!         "annotations": { "trivy-operator.aquasecurity.github.io/report-ttl": "24h" },
//!         "labels": {
//!           "trivy-operator.resource.kind": "ReplicaSet",
//!           "trivy-operator.plugin.config.hash": "659b7b9c46"
//!         }
//!       }
//!     }
//!   ]
//! }
//! ```
//!
//! Policies map a resource kind to a [`PolicyEntry`]:
//!
//! ```json
//! { "policies": { "ReplicaSet": { "applicable": true, "content": { "rules": ["KSV001"] } } } }
//! ```

use crate::{PolicyEntry, StaticPolicies};
use chrono::{DateTime, Utc};
use reaper_domain::{Record, RecordKey, RecordKind, RecordUid};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::SystemTime;
use thiserror::Error;

/// Errors loading a snapshot
#[derive(Error, Debug)]
pub enum SnapshotError {
    /// Failed to read the file
    #[error("Failed to read snapshot: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed JSON
    #[error("Failed to parse snapshot JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Unknown record kind
    #[error("Unknown record kind {0:?}")]
    UnknownKind(String),

    /// Invalid record uid
    #[error("Invalid uid for {name}: {reason}")]
    InvalidUid {
        /// Record name
        name: String,
        /// Parse failure
        reason: String,
    },

    /// Namespace presence does not match the kind's scope
    #[error("Record {0} has the wrong scope for its kind")]
    Scope(String),
}

/// Records section of a snapshot
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordsDocument {
    /// Records
    #[serde(default)]
    pub records: Vec<RecordDocument>,
}

/// One record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordDocument {
    /// Kind name, e.g. `VulnerabilityReport`
    pub kind: String,

    /// Metadata
    pub metadata: Metadata,
}

/// Kubernetes-style object metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    /// Name
    pub name: String,

    /// Namespace; absent for cluster-scoped kinds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Uid; generated when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,

    /// Creation instant
    pub creation_timestamp: DateTime<Utc>,

    /// Set when the record is terminating
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion_timestamp: Option<DateTime<Utc>>,

    /// Annotations
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,

    /// Labels
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl TryFrom<RecordDocument> for Record {
    type Error = SnapshotError;

    fn try_from(doc: RecordDocument) -> Result<Self, Self::Error> {
        let kind = RecordKind::parse(&doc.kind).ok_or_else(|| SnapshotError::UnknownKind(doc.kind.clone()))?;
        let meta = doc.metadata;

        let key = match (kind.is_cluster_scoped(), meta.namespace) {
            (true, None) => RecordKey::cluster(kind, meta.name.clone()),
            (false, Some(ns)) => RecordKey::namespaced(kind, ns, meta.name.clone()),
            _ => return Err(SnapshotError::Scope(format!("{}/{}", kind, meta.name))),
        };
        let uid = match meta.uid {
            Some(uid) => RecordUid::from_string(&uid).map_err(|reason| SnapshotError::InvalidUid {
                name: meta.name.clone(),
                reason,
            })?,
            None => RecordUid::new(),
        };

        Ok(Record {
            key,
            uid,
            created_at: SystemTime::from(meta.creation_timestamp),
            deletion_timestamp: meta.deletion_timestamp.map(SystemTime::from),
            annotations: meta.annotations,
            labels: meta.labels,
        })
    }
}

impl From<&Record> for RecordDocument {
    fn from(record: &Record) -> Self {
        Self {
            kind: record.key.kind.as_str().to_string(),
            metadata: Metadata {
                name: record.key.name.clone(),
                namespace: record.key.namespace.clone(),
                uid: Some(record.uid.to_string()),
                creation_timestamp: DateTime::<Utc>::from(record.created_at),
                deletion_timestamp: record.deletion_timestamp.map(DateTime::<Utc>::from),
                annotations: record.annotations.clone(),
                labels: record.labels.clone(),
            },
        }
    }
}

/// Policies section of a snapshot
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PoliciesDocument {
    /// Policies keyed by resource kind
    #[serde(default)]
    pub policies: BTreeMap<String, PolicyEntry>,
}

/// Parse records from JSON text
pub fn parse_records(json: &str) -> Result<Vec<Record>, SnapshotError> {
    let doc: RecordsDocument = serde_json::from_str(json)?;
    doc.records.into_iter().map(Record::try_from).collect()
}

/// Load records from a JSON file
pub fn load_records<P: AsRef<Path>>(path: P) -> Result<Vec<Record>, SnapshotError> {
    let contents = std::fs::read_to_string(path)?;
    parse_records(&contents)
}

/// Parse policies from JSON text
pub fn parse_policies(json: &str) -> Result<StaticPolicies, SnapshotError> {
    let doc: PoliciesDocument = serde_json::from_str(json)?;
    Ok(StaticPolicies::with_entries(doc.policies))
}

/// Load policies from a JSON file
pub fn load_policies<P: AsRef<Path>>(path: P) -> Result<StaticPolicies, SnapshotError> {
    let contents = std::fs::read_to_string(path)?;
    parse_policies(&contents)
}
