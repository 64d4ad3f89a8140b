//! Record kinds - the fixed set of resource types subject to TTL collection

use std::fmt;

/// Kind of a watched record
///
/// Every kind the janitor knows about is listed here so that the deletion
/// eligibility table can match exhaustively. Adding a kind forces a decision
/// at every `match` on this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RecordKind {
    /// Vulnerabilities found in a workload's container images
    VulnerabilityReport,

    /// Secrets exposed in a workload's container images
    ExposedSecretReport,

    /// Misconfigurations found in a workload manifest
    ConfigAuditReport,

    /// RBAC findings for a role or cluster role
    RbacAssessmentReport,

    /// Findings for core cluster infrastructure components
    InfraAssessmentReport,

    /// Cached software bill of materials for an image (cluster-scoped)
    ClusterSbomReport,

    /// Vulnerabilities for a single image, independent of any workload
    ImageVulnerabilityReport,

    /// Secret created for a scan job
    Secret,
}

impl RecordKind {
    /// All kinds, in declaration order
    pub const ALL: [RecordKind; 8] = [
        RecordKind::VulnerabilityReport,
        RecordKind::ExposedSecretReport,
        RecordKind::ConfigAuditReport,
        RecordKind::RbacAssessmentReport,
        RecordKind::InfraAssessmentReport,
        RecordKind::ClusterSbomReport,
        RecordKind::ImageVulnerabilityReport,
        RecordKind::Secret,
    ];

    /// Get the kind name as it appears on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::VulnerabilityReport => "VulnerabilityReport",
            RecordKind::ExposedSecretReport => "ExposedSecretReport",
            RecordKind::ConfigAuditReport => "ConfigAuditReport",
            RecordKind::RbacAssessmentReport => "RbacAssessmentReport",
            RecordKind::InfraAssessmentReport => "InfraAssessmentReport",
            RecordKind::ClusterSbomReport => "ClusterSbomReport",
            RecordKind::ImageVulnerabilityReport => "ImageVulnerabilityReport",
            RecordKind::Secret => "Secret",
        }
    }

    /// Parse a kind from its wire name
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == s)
    }

    /// Whether records of this kind live outside any namespace
    pub fn is_cluster_scoped(&self) -> bool {
        matches!(self, RecordKind::ClusterSbomReport)
    }

    /// Whether this kind is a scan report (as opposed to a scan-job secret)
    pub fn is_report(&self) -> bool {
        !matches!(self, RecordKind::Secret)
    }

    /// Annotation key holding the TTL for records of this kind
    pub fn ttl_annotation(&self) -> &'static str {
        match self {
            RecordKind::Secret => crate::record::TTL_SECRET_ANNOTATION,
            _ => crate::record::TTL_REPORT_ANNOTATION,
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RecordKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("Invalid record kind: {}", s))
    }
}
