//! Reaper Janitor
//!
//! TTL enforcement for scan-report records and the scan-job secrets that
//! feed them.
//!
//! # Overview
//!
//! The Janitor is responsible for:
//! - **Expiry**: reading each record's TTL annotation and deciding when it lapses
//! - **Eligibility**: keeping expired policy-governed reports whose policies are unchanged
//! - **Garbage collection**: deleting expired, eligible records (guarded by uid)
//! - **Scheduling**: requeueing each record for the moment it expires
//! - **Metrics collection**: tracking every reconcile outcome
//!
//! # Architecture
//!
//! A watch event or requeue timer triggers one [`Reconciler::reconcile`] pass
//! for a key. The pass re-reads everything it needs, so passes are idempotent
//! and out-of-order events correct themselves.
//!
//! ## Decisions
//!
//! | Situation | Decision |
//! |-----------|----------|
//! | Record gone | `NoAction` |
//! | No TTL annotation | `NoAction` |
//! | TTL not yet elapsed | `RequeueAfter(remaining)` |
//! | Expired and eligible | delete, `DeleteNow` |
//! | Expired, not eligible | `RequeueAfter(ttl)` |
//!
//! Secrets skip the eligibility table: once expired they are always deleted.
//!
//! # Usage
//!
//! ## One-off Pass
//!
//! ```
//! use reaper_domain::{Decision, Record, RecordKey, RecordKind, SystemClock};
//! use reaper_domain::record::TTL_REPORT_ANNOTATION;
//! use reaper_janitor::{Cancellation, JanitorConfig, Reconciler};
//! use reaper_store::{MemoryStore, StaticPolicies};
//! use std::time::SystemTime;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let key = RecordKey::namespaced(RecordKind::VulnerabilityReport, "default", "nginx");
//! let store = MemoryStore::with_records([
//!     Record::new(key.clone(), SystemTime::now()).with_annotation(TTL_REPORT_ANNOTATION, "0s"),
//! ]);
//! let reconciler = Reconciler::new(&JanitorConfig::default(), store.clone(), StaticPolicies::new(), SystemClock);
//!
//! assert_eq!(reconciler.reconcile(&key, &Cancellation::never())?, Decision::DeleteNow);
//! assert!(store.is_empty());
//! println!("{}", reconciler.metrics().summary());
//! # Ok(())
//! # }
//! ```
//!
//! ## Background Worker
//!
//! See [`JanitorWorker::run`].
//!
//! # Configuration
//!
//! The Janitor can be configured via TOML:
//!
//! ```toml
//! vulnerability_scanner_enabled = true
//! exposed_secret_scanner_enabled = true
//! config_audit_scanner_enabled = true
//! rbac_assessment_scanner_enabled = true
//! infra_assessment_scanner_enabled = true
//! cluster_sbom_cache_enabled = false
//! operator_namespace = "trivy-system"
//! target_namespaces = []
//! dry_run = false
//! error_backoff_base_ms = 500
//! error_backoff_max_secs = 300
//! ```

#![warn(missing_docs)]

mod config;
mod eligibility;
mod error;
mod metrics;
mod predicate;
mod reconciler;
mod worker;

pub use config::{ConfigError, InstallMode, JanitorConfig};
pub use eligibility::{DeletionPolicy, Reason, Verdict};
pub use error::JanitorError;
pub use metrics::JanitorMetrics;
pub use predicate::EventFilter;
pub use reconciler::{Cancellation, Reconciler};
pub use worker::JanitorWorker;
