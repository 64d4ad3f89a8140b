//! Configuration for Janitor operations
//!
//! Decides which record kinds are watched, which namespaces are in scope, and
//! how failed reconciles back off.

use reaper_domain::RecordKind;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Configuration loading error
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse config TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Values are inconsistent
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Which namespaces the operator is responsible for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallMode {
    /// Only the namespace the operator runs in
    OwnNamespace,

    /// One namespace other than the operator's
    SingleNamespace,

    /// Several listed namespaces
    MultiNamespace,

    /// Every namespace
    AllNamespaces,
}

/// Configuration for the Janitor service
///
/// # Examples
///
/// ```
/// use reaper_janitor::{InstallMode, JanitorConfig};
/// use reaper_domain::RecordKind;
///
/// let config = JanitorConfig::default();
/// assert_eq!(config.install_mode(), InstallMode::AllNamespaces);
/// assert!(config.watched_kinds().contains(&RecordKind::ConfigAuditReport));
/// assert!(!config.watched_kinds().contains(&RecordKind::ClusterSbomReport));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JanitorConfig {
    /// Vulnerability and image-vulnerability reports are produced
    pub vulnerability_scanner_enabled: bool,

    /// Exposed-secret reports are produced
    pub exposed_secret_scanner_enabled: bool,

    /// Config-audit reports are produced; also gates policy consultation
    pub config_audit_scanner_enabled: bool,

    /// RBAC-assessment reports are produced
    pub rbac_assessment_scanner_enabled: bool,

    /// Infra-assessment reports are produced
    pub infra_assessment_scanner_enabled: bool,

    /// Cluster SBOM reports are cached
    pub cluster_sbom_cache_enabled: bool,

    /// Namespace the operator runs in; scan-job secrets live here
    pub operator_namespace: String,

    /// Namespaces in scope; empty means all
    pub target_namespaces: Vec<String>,

    /// Log what would be deleted without actually deleting
    pub dry_run: bool,

    /// First retry delay after a failed reconcile, in milliseconds
    pub error_backoff_base_ms: u64,

    /// Upper bound on the retry delay, in seconds
    pub error_backoff_max_secs: u64,
}

impl Default for JanitorConfig {
    /// Every scanner except the SBOM cache, all namespaces, 500ms..5m backoff
    fn default() -> Self {
        Self {
            vulnerability_scanner_enabled: true,
            exposed_secret_scanner_enabled: true,
            config_audit_scanner_enabled: true,
            rbac_assessment_scanner_enabled: true,
            infra_assessment_scanner_enabled: true,
            cluster_sbom_cache_enabled: false,
            operator_namespace: "trivy-system".to_string(),
            target_namespaces: Vec::new(),
            dry_run: false,
            error_backoff_base_ms: 500,
            error_backoff_max_secs: 300,
        }
    }
}

impl JanitorConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: JanitorConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the values are usable together
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.operator_namespace.trim().is_empty() {
            return Err(ConfigError::Invalid("operator_namespace must not be empty".to_string()));
        }
        if self.target_namespaces.iter().any(|ns| ns.trim().is_empty()) {
            return Err(ConfigError::Invalid("target_namespaces must not contain empty names".to_string()));
        }
        if self.error_backoff_base_ms == 0 {
            return Err(ConfigError::Invalid("error_backoff_base_ms must be positive".to_string()));
        }
        if Duration::from_millis(self.error_backoff_base_ms) > self.error_backoff_max() {
            return Err(ConfigError::Invalid(
                "error_backoff_base_ms exceeds error_backoff_max_secs".to_string(),
            ));
        }
        Ok(())
    }

    /// Report kinds whose TTL is enforced, given the enabled scanners
    pub fn watched_kinds(&self) -> Vec<RecordKind> {
        let mut kinds = Vec::new();
        if self.rbac_assessment_scanner_enabled {
            kinds.push(RecordKind::RbacAssessmentReport);
        }
        if self.config_audit_scanner_enabled {
            kinds.push(RecordKind::ConfigAuditReport);
        }
        if self.vulnerability_scanner_enabled {
            kinds.push(RecordKind::VulnerabilityReport);
        }
        if self.exposed_secret_scanner_enabled {
            kinds.push(RecordKind::ExposedSecretReport);
        }
        if self.infra_assessment_scanner_enabled {
            kinds.push(RecordKind::InfraAssessmentReport);
        }
        if self.cluster_sbom_cache_enabled {
            kinds.push(RecordKind::ClusterSbomReport);
        }
        if self.vulnerability_scanner_enabled {
            kinds.push(RecordKind::ImageVulnerabilityReport);
        }
        if self.watches_secrets() {
            kinds.push(RecordKind::Secret);
        }
        kinds
    }

    /// Scan-job secrets exist only for image scanners
    pub fn watches_secrets(&self) -> bool {
        self.vulnerability_scanner_enabled || self.exposed_secret_scanner_enabled
    }

    /// Resolve the install mode from the operator and target namespaces
    pub fn install_mode(&self) -> InstallMode {
        match self.target_namespaces.as_slice() {
            [] => InstallMode::AllNamespaces,
            [only] if *only == self.operator_namespace => InstallMode::OwnNamespace,
            [_] => InstallMode::SingleNamespace,
            _ => InstallMode::MultiNamespace,
        }
    }

    /// Upper bound on the retry delay
    pub fn error_backoff_max(&self) -> Duration {
        Duration::from_secs(self.error_backoff_max_secs)
    }

    /// Retry delay after `failures` consecutive failed reconciles of one key
    ///
    /// Doubles from the base on every failure, capped at the maximum.
    pub fn error_backoff(&self, failures: u32) -> Duration {
        let base = Duration::from_millis(self.error_backoff_base_ms);
        let factor = 2u32.saturating_pow(failures.saturating_sub(1));
        base.checked_mul(factor)
            .map_or(self.error_backoff_max(), |delay| delay.min(self.error_backoff_max()))
    }
}
