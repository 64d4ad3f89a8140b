//! Per-key reconcile pass
//!
//! Each pass recomputes everything from the current store and clock state:
//! fetch, read the TTL annotation, evaluate expiry, consult eligibility, then
//! delete or requeue. Nothing is carried over between passes, so duplicate or
//! stale triggers are harmless.

use crate::eligibility::DeletionPolicy;
use crate::{JanitorConfig, JanitorError, JanitorMetrics};
use reaper_domain::{
    evaluate, format_duration, parse_duration, Clock, Decision, DeleteOutcome, PolicyLookup, RecordKey,
    RecordKind, RecordStore,
};
use std::fmt::Display;
use std::sync::Mutex;
use tokio::sync::watch;

/// Cooperative cancellation for an in-flight reconcile
///
/// Backed by the worker's shutdown channel; a pass checks it before and after
/// every collaborator call.
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    signal: Option<watch::Receiver<bool>>,
}

impl Cancellation {
    /// A cancellation that never fires
    pub fn never() -> Self {
        Self::default()
    }

    /// Whether shutdown has been requested
    pub fn is_cancelled(&self) -> bool {
        self.signal.as_ref().is_some_and(|rx| *rx.borrow())
    }

    fn check(&self) -> Result<(), JanitorError> {
        if self.is_cancelled() {
            return Err(JanitorError::Cancelled);
        }
        Ok(())
    }
}

impl From<watch::Receiver<bool>> for Cancellation {
    fn from(signal: watch::Receiver<bool>) -> Self {
        Self { signal: Some(signal) }
    }
}

/// Reconciles one record key at a time against its collaborators
///
/// Safe to call concurrently for different keys; the caller ensures at most
/// one pass per key is in flight.
///
/// # Examples
///
/// ```
/// use reaper_domain::{Decision, ManualClock, Record, RecordKey, RecordKind};
/// use reaper_domain::record::TTL_REPORT_ANNOTATION;
/// use reaper_janitor::{Cancellation, JanitorConfig, Reconciler};
/// use reaper_store::{MemoryStore, StaticPolicies};
/// use std::time::{Duration, UNIX_EPOCH};
///
/// let key = RecordKey::namespaced(RecordKind::VulnerabilityReport, "default", "nginx");
/// let store = MemoryStore::with_records([
///     Record::new(key.clone(), UNIX_EPOCH).with_annotation(TTL_REPORT_ANNOTATION, "1h"),
/// ]);
/// let clock = ManualClock::new(UNIX_EPOCH + Duration::from_secs(1800));
/// let reconciler = Reconciler::new(&JanitorConfig::default(), store, StaticPolicies::new(), clock);
///
/// let decision = reconciler.reconcile(&key, &Cancellation::never()).unwrap();
/// assert_eq!(decision, Decision::RequeueAfter(Duration::from_secs(1800)));
/// ```
pub struct Reconciler<S, P, C> {
    store: S,
    policies: P,
    clock: C,
    eligibility: DeletionPolicy,
    dry_run: bool,
    metrics: Mutex<JanitorMetrics>,
}

impl<S, P, C> Reconciler<S, P, C>
where
    S: RecordStore,
    S::Error: Display,
    P: PolicyLookup,
    P::Error: Display,
    C: Clock,
{
    /// Create a reconciler
    pub fn new(config: &JanitorConfig, store: S, policies: P, clock: C) -> Self {
        Self {
            store,
            policies,
            clock,
            eligibility: DeletionPolicy::new(config.config_audit_scanner_enabled),
            dry_run: config.dry_run,
            metrics: Mutex::new(JanitorMetrics::new()),
        }
    }

    /// Snapshot of the metrics collected so far
    pub fn metrics(&self) -> JanitorMetrics {
        self.with_metrics(|m| m.clone())
    }

    /// Run one reconcile pass for `key`
    ///
    /// Returns what should happen next for the key. Store failures and
    /// malformed TTLs are errors for the caller to retry; a missing record is
    /// `NoAction`.
    pub fn reconcile(&self, key: &RecordKey, cancel: &Cancellation) -> Result<Decision, JanitorError> {
        let span = tracing::debug_span!(
            "reconcile",
            kind = %key.kind,
            namespace = key.namespace.as_deref().unwrap_or(""),
            name = %key.name
        );
        let _enter = span.enter();

        self.with_metrics(JanitorMetrics::record_reconcile);
        let result = self.reconcile_inner(key, cancel);
        if let Err(e) = &result {
            if !matches!(e, JanitorError::Cancelled) {
                self.with_metrics(JanitorMetrics::record_failure);
            }
        }
        result
    }

    fn reconcile_inner(&self, key: &RecordKey, cancel: &Cancellation) -> Result<Decision, JanitorError> {
        cancel.check()?;
        let fetched = self
            .store
            .get(key)
            .map_err(|e| JanitorError::Store(format!("getting {} from cache: {}", key, e)))?;
        cancel.check()?;

        let Some(record) = fetched else {
            tracing::debug!("Ignoring cached record that must have been deleted");
            self.with_metrics(JanitorMetrics::record_skip);
            return Ok(Decision::NoAction);
        };

        let Some(raw_ttl) = record.ttl_annotation() else {
            tracing::debug!("Ignoring record without TTL set");
            self.with_metrics(JanitorMetrics::record_skip);
            return Ok(Decision::NoAction);
        };
        let ttl = parse_duration(raw_ttl).map_err(|source| JanitorError::InvalidTtl {
            annotation: key.kind.ttl_annotation(),
            value: raw_ttl.to_string(),
            source,
        })?;

        let status = evaluate(ttl, record.created_at, &self.clock);
        tracing::debug!(
            expired = status.expired,
            ttl = %format_duration(ttl),
            remaining = %format_duration(status.remaining),
            "TTL check result"
        );

        if !status.expired {
            self.with_metrics(JanitorMetrics::record_requeue);
            return Ok(Decision::RequeueAfter(status.remaining));
        }

        let eligible = match key.kind {
            RecordKind::Secret => true,
            _ => {
                let verdict = self.eligibility.evaluate_until(&record, ttl, &self.policies, cancel);
                tracing::debug!(eligible = verdict.eligible, reason = ?verdict.reason, "Eligibility");
                verdict.eligible
            }
        };
        cancel.check()?;

        if !eligible {
            tracing::debug!(
                requeue_after = %format_duration(ttl),
                "TTL expired but not applicable for deletion, requeueing with full TTL"
            );
            self.with_metrics(JanitorMetrics::record_rearm);
            return Ok(Decision::RequeueAfter(ttl));
        }

        if self.dry_run {
            tracing::info!(uid = %record.uid, "DRY RUN: would delete record with expired TTL");
            self.with_metrics(JanitorMetrics::record_would_delete);
            return Ok(Decision::NoAction);
        }

        tracing::debug!("Removing record with expired TTL");
        match self.store.delete(key, record.uid) {
            Ok(DeleteOutcome::Deleted) => {
                tracing::info!("Deleted record with expired TTL");
                self.with_metrics(|m| m.record_deletion(key.kind));
            }
            Ok(DeleteOutcome::NotFound) => {
                tracing::debug!("Record already gone");
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to delete record");
                return Err(JanitorError::Store(format!("deleting {}: {}", key, e)));
            }
        }
        Ok(Decision::DeleteNow)
    }

    pub(crate) fn store(&self) -> &S {
        &self.store
    }

    fn with_metrics<R>(&self, f: impl FnOnce(&mut JanitorMetrics) -> R) -> R {
        let mut metrics = self.metrics.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut metrics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reaper_domain::record::{
        LABEL_POLICY_CONFIG_HASH, LABEL_RESOURCE_KIND, TTL_REPORT_ANNOTATION, TTL_SECRET_ANNOTATION,
    };
    use reaper_domain::{ManualClock, Record};
    use reaper_store::{MemoryStore, PolicyEntry, StaticPolicies};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    const NOW_SECS: u64 = 10 * 24 * 3600;

    fn now() -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(NOW_SECS)
    }

    fn ago(secs: u64) -> SystemTime {
        now() - Duration::from_secs(secs)
    }

    struct Fixture {
        store: MemoryStore,
        policies: StaticPolicies,
        clock: Arc<ManualClock>,
        reconciler: Reconciler<MemoryStore, StaticPolicies, Arc<ManualClock>>,
    }

    fn fixture(config: JanitorConfig) -> Fixture {
        let store = MemoryStore::new();
        let policies = StaticPolicies::with_entries([(
            "ReplicaSet".to_string(),
            PolicyEntry::applicable(json!({"rules": ["KSV001", "KSV003"]})),
        )]);
        let clock = Arc::new(ManualClock::new(now()));
        let reconciler = Reconciler::new(&config, store.clone(), policies.clone(), Arc::clone(&clock));
        Fixture {
            store,
            policies,
            clock,
            reconciler,
        }
    }

    fn report(kind: RecordKind, ttl: &str, created_at: SystemTime) -> Record {
        Record::new(RecordKey::namespaced(kind, "default", "replicaset-nginx"), created_at)
            .with_annotation(TTL_REPORT_ANNOTATION, ttl)
    }

    fn audit(ttl: &str, created_at: SystemTime, hash: &str) -> Record {
        report(RecordKind::ConfigAuditReport, ttl, created_at)
            .with_label(LABEL_RESOURCE_KIND, "ReplicaSet")
            .with_label(LABEL_POLICY_CONFIG_HASH, hash)
    }

    fn run(f: &Fixture, key: &RecordKey) -> Result<Decision, JanitorError> {
        f.reconciler.reconcile(key, &Cancellation::never())
    }

    #[test]
    fn test_unexpired_report_requeues_for_remaining() {
        let f = fixture(JanitorConfig::default());
        let r = report(RecordKind::VulnerabilityReport, "1h", ago(1800));
        f.store.insert(r.clone()).unwrap();

        assert_eq!(run(&f, &r.key).unwrap(), Decision::RequeueAfter(Duration::from_secs(1800)));
        assert_eq!(f.store.len(), 1);
        assert_eq!(f.reconciler.metrics().requeued, 1);
    }

    #[test]
    fn test_historical_report_deleted() {
        for kind in [RecordKind::VulnerabilityReport, RecordKind::ConfigAuditReport] {
            let f = fixture(JanitorConfig::default());
            let r = report(kind, "0s", ago(1));
            f.store.insert(r.clone()).unwrap();

            assert_eq!(run(&f, &r.key).unwrap(), Decision::DeleteNow);
            assert!(f.store.is_empty());
            assert_eq!(f.reconciler.metrics().deleted[&kind], 1);
        }
    }

    #[test]
    fn test_current_policies_rearm_full_ttl() {
        let f = fixture(JanitorConfig::default());
        let current = f.policies.fingerprint_of("ReplicaSet");
        let r = audit("1h", ago(7200), &current);
        f.store.insert(r.clone()).unwrap();

        assert_eq!(run(&f, &r.key).unwrap(), Decision::RequeueAfter(Duration::from_secs(3600)));
        assert_eq!(f.store.len(), 1);
        assert_eq!(f.reconciler.metrics().rearmed, 1);
    }

    #[test]
    fn test_stale_policies_delete() {
        let f = fixture(JanitorConfig::default());
        let r = audit("1h", ago(7200), "stale");
        f.store.insert(r.clone()).unwrap();

        assert_eq!(run(&f, &r.key).unwrap(), Decision::DeleteNow);
        assert!(f.store.is_empty());
    }

    #[test]
    fn test_policy_change_makes_record_eligible() {
        let f = fixture(JanitorConfig::default());
        let current = f.policies.fingerprint_of("ReplicaSet");
        let r = audit("1h", ago(7200), &current);
        f.store.insert(r.clone()).unwrap();
        assert!(matches!(run(&f, &r.key).unwrap(), Decision::RequeueAfter(_)));

        f.policies
            .set("ReplicaSet", PolicyEntry::applicable(json!({"rules": ["KSV001"]})))
            .unwrap();
        assert_eq!(run(&f, &r.key).unwrap(), Decision::DeleteNow);
    }

    #[test]
    fn test_missing_ttl_is_no_action() {
        let f = fixture(JanitorConfig::default());
        let r = Record::new(
            RecordKey::namespaced(RecordKind::VulnerabilityReport, "default", "nginx"),
            ago(365 * 24 * 3600),
        );
        f.store.insert(r.clone()).unwrap();

        assert_eq!(run(&f, &r.key).unwrap(), Decision::NoAction);
        assert_eq!(f.store.get(&r.key).unwrap(), Some(r));
    }

    #[test]
    fn test_missing_record_is_no_action() {
        let f = fixture(JanitorConfig::default());
        let key = RecordKey::namespaced(RecordKind::VulnerabilityReport, "default", "gone");

        assert_eq!(run(&f, &key).unwrap(), Decision::NoAction);
        assert_eq!(f.reconciler.metrics().skipped, 1);
        assert_eq!(f.reconciler.metrics().failures, 0);
    }

    #[test]
    fn test_invalid_ttl_is_error() {
        let f = fixture(JanitorConfig::default());
        let r = report(RecordKind::VulnerabilityReport, "soon", ago(0));
        f.store.insert(r.clone()).unwrap();

        match run(&f, &r.key) {
            Err(JanitorError::InvalidTtl { annotation, value, .. }) => {
                assert_eq!(annotation, TTL_REPORT_ANNOTATION);
                assert_eq!(value, "soon");
            }
            other => panic!("expected InvalidTtl, got {other:?}"),
        }
        assert_eq!(f.store.len(), 1);
        assert_eq!(f.reconciler.metrics().failures, 1);
    }

    #[test]
    fn test_store_failure_surfaces() {
        let f = fixture(JanitorConfig::default());
        let r = report(RecordKind::VulnerabilityReport, "0s", ago(1));
        f.store.insert(r.clone()).unwrap();
        f.store.set_unavailable(true);

        assert!(matches!(run(&f, &r.key), Err(JanitorError::Store(_))));
        f.store.set_unavailable(false);
        assert_eq!(f.store.len(), 1);
    }

    #[test]
    fn test_policy_outage_keeps_record() {
        let f = fixture(JanitorConfig::default());
        let r = audit("1h", ago(7200), "stale");
        f.store.insert(r.clone()).unwrap();
        f.policies.set_unavailable(true);

        assert_eq!(run(&f, &r.key).unwrap(), Decision::RequeueAfter(Duration::from_secs(3600)));
        assert_eq!(f.store.len(), 1);
    }

    #[test]
    fn test_disabled_config_audit_keeps_record() {
        let f = fixture(JanitorConfig {
            config_audit_scanner_enabled: false,
            ..Default::default()
        });
        let r = audit("1h", ago(7200), "stale");
        f.store.insert(r.clone()).unwrap();

        assert_eq!(run(&f, &r.key).unwrap(), Decision::RequeueAfter(Duration::from_secs(3600)));
    }

    #[test]
    fn test_secret_deleted_unconditionally_once_expired() {
        let f = fixture(JanitorConfig::default());
        let key = RecordKey::namespaced(RecordKind::Secret, "trivy-system", "scan-vulnerabilityreport-abc");
        let secret = Record::new(key.clone(), ago(0)).with_annotation(TTL_SECRET_ANNOTATION, "10m");
        f.store.insert(secret).unwrap();

        assert_eq!(run(&f, &key).unwrap(), Decision::RequeueAfter(Duration::from_secs(600)));

        f.clock.advance(Duration::from_secs(600));
        assert_eq!(run(&f, &key).unwrap(), Decision::DeleteNow);
        assert!(f.store.is_empty());
    }

    #[test]
    fn test_secret_ignores_report_annotation() {
        let f = fixture(JanitorConfig::default());
        let key = RecordKey::namespaced(RecordKind::Secret, "trivy-system", "s");
        f.store
            .insert(Record::new(key.clone(), ago(3600)).with_annotation(TTL_REPORT_ANNOTATION, "0s"))
            .unwrap();

        assert_eq!(run(&f, &key).unwrap(), Decision::NoAction);
    }

    #[test]
    fn test_dry_run_leaves_record() {
        let f = fixture(JanitorConfig {
            dry_run: true,
            ..Default::default()
        });
        let r = report(RecordKind::ExposedSecretReport, "1h", ago(7200));
        f.store.insert(r.clone()).unwrap();

        assert_eq!(run(&f, &r.key).unwrap(), Decision::NoAction);
        assert_eq!(f.store.len(), 1);
        assert_eq!(f.reconciler.metrics().would_delete, 1);
        assert_eq!(f.reconciler.metrics().total_deleted(), 0);
    }

    #[test]
    fn test_recreated_record_not_deleted_by_stale_pass() {
        let f = fixture(JanitorConfig::default());
        let old = report(RecordKind::VulnerabilityReport, "0s", ago(10));
        f.store.insert(old.clone()).unwrap();
        assert_eq!(run(&f, &old.key).unwrap(), Decision::DeleteNow);

        // Same key, new incarnation
        let fresh = report(RecordKind::VulnerabilityReport, "1h", ago(0));
        f.store.insert(fresh.clone()).unwrap();
        assert_eq!(run(&f, &fresh.key).unwrap(), Decision::RequeueAfter(Duration::from_secs(3600)));
        assert_eq!(f.store.get(&fresh.key).unwrap(), Some(fresh));
    }

    #[test]
    fn test_repeat_passes_agree() {
        let f = fixture(JanitorConfig::default());
        let current = f.policies.fingerprint_of("ReplicaSet");
        let records = [
            report(RecordKind::VulnerabilityReport, "1h", ago(1800)),
            audit("1h", ago(7200), &current),
            Record::new(
                RecordKey::namespaced(RecordKind::InfraAssessmentReport, "default", "no-ttl"),
                ago(0),
            ),
        ];
        for r in &records {
            f.store.insert(r.clone()).unwrap();
            let first = run(&f, &r.key).unwrap();
            let second = run(&f, &r.key).unwrap();
            assert_eq!(first, second, "{}", r.key);
        }

        // A deleted record settles on NoAction
        let key = RecordKey::namespaced(RecordKind::VulnerabilityReport, "default", "gone");
        assert_eq!(run(&f, &key).unwrap(), run(&f, &key).unwrap());
    }

    #[test]
    fn test_cancelled_pass_does_not_delete() {
        let f = fixture(JanitorConfig::default());
        let r = report(RecordKind::VulnerabilityReport, "0s", ago(1));
        f.store.insert(r.clone()).unwrap();

        let (tx, rx) = watch::channel(false);
        let cancel = Cancellation::from(rx);
        assert!(!cancel.is_cancelled());
        tx.send(true).unwrap();

        assert!(matches!(f.reconciler.reconcile(&r.key, &cancel), Err(JanitorError::Cancelled)));
        assert_eq!(f.store.len(), 1);
        assert_eq!(f.reconciler.metrics().failures, 0);
    }

    /// Policy source that requests shutdown while answering applicability
    struct ShutdownMidPass {
        shutdown: watch::Sender<bool>,
        fingerprint_calls: std::sync::atomic::AtomicUsize,
    }

    impl PolicyLookup for ShutdownMidPass {
        type Error = &'static str;

        fn is_applicable(&self, _: &str) -> Result<bool, Self::Error> {
            self.shutdown.send_replace(true);
            Ok(true)
        }

        fn fingerprint(&self, _: &str) -> Result<String, Self::Error> {
            self.fingerprint_calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok("changed".to_string())
        }
    }

    #[test]
    fn test_shutdown_during_pass_stops_before_next_lookup() {
        let store = MemoryStore::new();
        let r = audit("1h", ago(7200), "stale");
        store.insert(r.clone()).unwrap();

        let (tx, rx) = watch::channel(false);
        let policies = Arc::new(ShutdownMidPass {
            shutdown: tx,
            fingerprint_calls: std::sync::atomic::AtomicUsize::new(0),
        });
        let reconciler = Reconciler::new(
            &JanitorConfig::default(),
            store.clone(),
            Arc::clone(&policies),
            ManualClock::new(now()),
        );

        let result = reconciler.reconcile(&r.key, &Cancellation::from(rx));
        assert!(matches!(result, Err(JanitorError::Cancelled)));
        assert_eq!(policies.fingerprint_calls.load(std::sync::atomic::Ordering::SeqCst), 0);
        assert_eq!(store.len(), 1);
        assert_eq!(reconciler.metrics().failures, 0);
    }

    trait FingerprintOf {
        fn fingerprint_of(&self, resource_kind: &str) -> String;
    }

    impl FingerprintOf for StaticPolicies {
        fn fingerprint_of(&self, resource_kind: &str) -> String {
            PolicyLookup::fingerprint(self, resource_kind).unwrap()
        }
    }
}
