//! Deletion eligibility for expired records
//!
//! An expired record is only removed when nothing still vouches for it. The
//! rules are checked in order and the first match decides:
//!
//! 1. Kinds whose lifecycle is governed by TTL alone are always eligible
//! 2. A zero TTL marks a historical record, always eligible
//! 3. With config auditing disabled, policy state cannot be consulted: keep
//! 4. Without both the resource-kind and policy-hash labels: keep
//! 5. Eligible iff policies still apply and their fingerprint has moved on
//!
//! Any failure consulting the policy source keeps the record, as does a
//! shutdown observed between policy lookups.

use crate::Cancellation;
use reaper_domain::{PolicyLookup, Record, RecordKind};
use std::fmt::Display;
use std::time::Duration;

/// Which rule of the table decided
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
    /// Kind is never policy-governed
    TtlOnlyKind,
    /// TTL of zero
    Historical,
    /// Config-audit scanning is disabled
    ConfigAuditDisabled,
    /// Resource-kind or policy-hash label is missing
    MissingLabels,
    /// The policy source failed
    PolicyLookupFailed,
    /// No policies apply to the resource kind any more
    PoliciesNotApplicable,
    /// Stored fingerprint matches the current one
    PoliciesUnchanged,
    /// Stored fingerprint is stale
    PoliciesChanged,
    /// Shutdown was requested before the policy lookups finished
    Cancelled,
}

/// Outcome of the eligibility table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    /// Whether the record may be deleted
    pub eligible: bool,
    /// Rule that decided
    pub reason: Reason,
}

impl Verdict {
    fn eligible(reason: Reason) -> Self {
        Self { eligible: true, reason }
    }

    fn keep(reason: Reason) -> Self {
        Self { eligible: false, reason }
    }
}

/// Deletion eligibility table for expired records
#[derive(Debug, Clone, Copy)]
pub struct DeletionPolicy {
    config_audit_enabled: bool,
}

impl DeletionPolicy {
    /// Create the policy; `config_audit_enabled` gates rule 3
    pub fn new(config_audit_enabled: bool) -> Self {
        Self { config_audit_enabled }
    }

    /// Whether an expired record may be deleted
    pub fn is_eligible<P>(&self, record: &Record, ttl: Duration, policies: &P) -> bool
    where
        P: PolicyLookup + ?Sized,
        P::Error: Display,
    {
        self.evaluate(record, ttl, policies).eligible
    }

    /// Run the table and report which rule decided
    pub fn evaluate<P>(&self, record: &Record, ttl: Duration, policies: &P) -> Verdict
    where
        P: PolicyLookup + ?Sized,
        P::Error: Display,
    {
        self.evaluate_until(record, ttl, policies, &Cancellation::never())
    }

    /// Run the table, stopping before any policy lookup once `cancel` fires
    ///
    /// A cancelled run keeps the record with [`Reason::Cancelled`].
    pub fn evaluate_until<P>(&self, record: &Record, ttl: Duration, policies: &P, cancel: &Cancellation) -> Verdict
    where
        P: PolicyLookup + ?Sized,
        P::Error: Display,
    {
        match record.key.kind {
            RecordKind::VulnerabilityReport
            | RecordKind::ExposedSecretReport
            | RecordKind::ClusterSbomReport
            | RecordKind::ImageVulnerabilityReport
            | RecordKind::Secret => return Verdict::eligible(Reason::TtlOnlyKind),
            RecordKind::ConfigAuditReport
            | RecordKind::RbacAssessmentReport
            | RecordKind::InfraAssessmentReport => {}
        }

        if ttl.is_zero() {
            return Verdict::eligible(Reason::Historical);
        }
        if !self.config_audit_enabled {
            return Verdict::keep(Reason::ConfigAuditDisabled);
        }
        let (Some(resource_kind), Some(stored_hash)) = (record.resource_kind(), record.policy_config_hash())
        else {
            return Verdict::keep(Reason::MissingLabels);
        };

        if cancel.is_cancelled() {
            return Verdict::keep(Reason::Cancelled);
        }
        let applicable = match policies.is_applicable(resource_kind) {
            Ok(applicable) => applicable,
            Err(e) => {
                tracing::warn!(resource_kind, error = %e, "Policy applicability lookup failed, keeping record");
                return Verdict::keep(Reason::PolicyLookupFailed);
            }
        };
        if !applicable {
            return Verdict::keep(Reason::PoliciesNotApplicable);
        }
        if cancel.is_cancelled() {
            return Verdict::keep(Reason::Cancelled);
        }

        match policies.fingerprint(resource_kind) {
            Ok(current) if current != stored_hash => Verdict::eligible(Reason::PoliciesChanged),
            Ok(_) => Verdict::keep(Reason::PoliciesUnchanged),
            Err(e) => {
                tracing::warn!(resource_kind, error = %e, "Policy fingerprint lookup failed, keeping record");
                Verdict::keep(Reason::PolicyLookupFailed)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use reaper_domain::record::{LABEL_POLICY_CONFIG_HASH, LABEL_RESOURCE_KIND};
    use reaper_domain::RecordKey;
    use std::cell::Cell;
    use std::time::UNIX_EPOCH;

    const HOUR: Duration = Duration::from_secs(3600);

    /// Fixed policy answers, counting lookups
    struct FakePolicies {
        applicable: Result<bool, &'static str>,
        fingerprint: Result<&'static str, &'static str>,
        calls: Cell<usize>,
    }

    impl FakePolicies {
        fn new(applicable: Result<bool, &'static str>, fingerprint: Result<&'static str, &'static str>) -> Self {
            Self {
                applicable,
                fingerprint,
                calls: Cell::new(0),
            }
        }
    }

    impl PolicyLookup for FakePolicies {
        type Error = &'static str;

        fn is_applicable(&self, _: &str) -> Result<bool, Self::Error> {
            self.calls.set(self.calls.get() + 1);
            self.applicable
        }

        fn fingerprint(&self, _: &str) -> Result<String, Self::Error> {
            self.calls.set(self.calls.get() + 1);
            self.fingerprint.map(str::to_string)
        }
    }

    fn labelled(kind: RecordKind) -> Record {
        Record::new(RecordKey::namespaced(kind, "default", "r"), UNIX_EPOCH)
            .with_label(LABEL_RESOURCE_KIND, "ReplicaSet")
            .with_label(LABEL_POLICY_CONFIG_HASH, "abc")
    }

    #[test]
    fn test_ttl_only_kinds_skip_policy_lookup() {
        let policies = FakePolicies::new(Err("down"), Err("down"));
        let policy = DeletionPolicy::new(false);
        for kind in [
            RecordKind::VulnerabilityReport,
            RecordKind::ExposedSecretReport,
            RecordKind::ClusterSbomReport,
            RecordKind::ImageVulnerabilityReport,
            RecordKind::Secret,
        ] {
            let verdict = policy.evaluate(&Record::new(RecordKey::cluster(kind, "r"), UNIX_EPOCH), HOUR, &policies);
            assert_eq!(verdict, Verdict::eligible(Reason::TtlOnlyKind), "{kind}");
        }
        assert_eq!(policies.calls.get(), 0);
    }

    #[test]
    fn test_historical_overrides_disabled_audit() {
        let policies = FakePolicies::new(Ok(true), Ok("abc"));
        let record = Record::new(
            RecordKey::namespaced(RecordKind::ConfigAuditReport, "default", "r"),
            UNIX_EPOCH,
        );
        let verdict = DeletionPolicy::new(false).evaluate(&record, Duration::ZERO, &policies);
        assert_eq!(verdict, Verdict::eligible(Reason::Historical));
    }

    #[test]
    fn test_disabled_audit_keeps_record() {
        let policies = FakePolicies::new(Ok(true), Ok("changed"));
        let verdict = DeletionPolicy::new(false).evaluate(&labelled(RecordKind::RbacAssessmentReport), HOUR, &policies);
        assert_eq!(verdict, Verdict::keep(Reason::ConfigAuditDisabled));
        assert_eq!(policies.calls.get(), 0);
    }

    #[test]
    fn test_missing_labels_keep_record() {
        let policies = FakePolicies::new(Ok(true), Ok("changed"));
        let policy = DeletionPolicy::new(true);
        let key = RecordKey::namespaced(RecordKind::ConfigAuditReport, "default", "r");

        let bare = Record::new(key.clone(), UNIX_EPOCH);
        let kind_only = Record::new(key.clone(), UNIX_EPOCH).with_label(LABEL_RESOURCE_KIND, "Pod");
        let hash_only = Record::new(key, UNIX_EPOCH).with_label(LABEL_POLICY_CONFIG_HASH, "abc");

        for record in [bare, kind_only, hash_only] {
            assert_eq!(policy.evaluate(&record, HOUR, &policies), Verdict::keep(Reason::MissingLabels));
        }
    }

    #[test]
    fn test_policy_comparison() {
        let policy = DeletionPolicy::new(true);
        let record = labelled(RecordKind::InfraAssessmentReport);

        let unchanged = FakePolicies::new(Ok(true), Ok("abc"));
        assert_eq!(policy.evaluate(&record, HOUR, &unchanged), Verdict::keep(Reason::PoliciesUnchanged));

        let changed = FakePolicies::new(Ok(true), Ok("xyz"));
        assert_eq!(policy.evaluate(&record, HOUR, &changed), Verdict::eligible(Reason::PoliciesChanged));

        let gone = FakePolicies::new(Ok(false), Ok("xyz"));
        assert_eq!(policy.evaluate(&record, HOUR, &gone), Verdict::keep(Reason::PoliciesNotApplicable));
    }

    #[test]
    fn test_lookup_errors_fail_closed() {
        let policy = DeletionPolicy::new(true);
        let record = labelled(RecordKind::ConfigAuditReport);

        let applicability_down = FakePolicies::new(Err("down"), Ok("xyz"));
        assert!(!policy.is_eligible(&record, HOUR, &applicability_down));

        let fingerprint_down = FakePolicies::new(Ok(true), Err("down"));
        assert_eq!(
            policy.evaluate(&record, HOUR, &fingerprint_down),
            Verdict::keep(Reason::PolicyLookupFailed)
        );
    }

    /// Requests shutdown from inside the applicability lookup
    struct ShutdownDuringLookup {
        shutdown: tokio::sync::watch::Sender<bool>,
        fingerprint_calls: Cell<usize>,
    }

    impl PolicyLookup for ShutdownDuringLookup {
        type Error = &'static str;

        fn is_applicable(&self, _: &str) -> Result<bool, Self::Error> {
            self.shutdown.send_replace(true);
            Ok(true)
        }

        fn fingerprint(&self, _: &str) -> Result<String, Self::Error> {
            self.fingerprint_calls.set(self.fingerprint_calls.get() + 1);
            Ok("xyz".to_string())
        }
    }

    #[test]
    fn test_shutdown_between_lookups_skips_fingerprint() {
        let (tx, rx) = tokio::sync::watch::channel(false);
        let policies = ShutdownDuringLookup {
            shutdown: tx,
            fingerprint_calls: Cell::new(0),
        };
        let cancel = Cancellation::from(rx);

        let verdict = DeletionPolicy::new(true).evaluate_until(
            &labelled(RecordKind::ConfigAuditReport),
            HOUR,
            &policies,
            &cancel,
        );
        assert_eq!(verdict, Verdict::keep(Reason::Cancelled));
        assert_eq!(policies.fingerprint_calls.get(), 0);
    }

    #[test]
    fn test_cancelled_before_lookup_consults_nothing() {
        let (tx, rx) = tokio::sync::watch::channel(true);
        let policies = FakePolicies::new(Ok(true), Ok("xyz"));
        let verdict = DeletionPolicy::new(true).evaluate_until(
            &labelled(RecordKind::RbacAssessmentReport),
            HOUR,
            &policies,
            &Cancellation::from(rx),
        );
        assert_eq!(verdict, Verdict::keep(Reason::Cancelled));
        assert_eq!(policies.calls.get(), 0);
        drop(tx);
    }

    fn any_kind() -> impl Strategy<Value = RecordKind> {
        proptest::sample::select(RecordKind::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn prop_earlier_rules_ignore_later_inputs(
            kind in any_kind(),
            zero_ttl in any::<bool>(),
            audit in any::<bool>(),
            applicable in any::<bool>(),
            lookup_fails in any::<bool>(),
        ) {
            let ttl = if zero_ttl { Duration::ZERO } else { HOUR };
            let record = labelled(kind);
            let policy = DeletionPolicy::new(audit);

            let healthy = FakePolicies::new(Ok(applicable), Ok("xyz"));
            let broken = FakePolicies::new(Err("down"), Err("down"));
            let first = policy.evaluate(&record, ttl, &healthy);
            let second = policy.evaluate(&record, ttl, if lookup_fails { &broken } else { &healthy });

            // Rules 1-3 never look at policy state
            if matches!(first.reason, Reason::TtlOnlyKind | Reason::Historical | Reason::ConfigAuditDisabled) {
                prop_assert_eq!(first, second);
                prop_assert_eq!(healthy.calls.get(), 0);
            }
            if first.reason == Reason::TtlOnlyKind {
                prop_assert!(first.eligible);
            }
        }
    }
}
