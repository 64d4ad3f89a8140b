//! Check command implementation.

use crate::cli::CheckArgs;
use crate::commands::load_policies;
use crate::error::{CliError, Result};
use crate::output::Formatter;
use chrono::DateTime;
use reaper_domain::{Decision, EventKind, ManualClock, Record, RecordKey, WatchEvent};
use reaper_janitor::{Cancellation, EventFilter, JanitorConfig, Reconciler};
use reaper_store::{snapshot, MemoryStore, StaticPolicies};
use std::time::SystemTime;

/// Decision reached for one record.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckOutcome {
    /// Record the decision is for
    pub key: RecordKey,
    /// Decision, or the error that stopped the pass
    pub decision: std::result::Result<Decision, String>,
}

/// Execute the check command.
pub fn execute_check(args: CheckArgs, formatter: &Formatter) -> Result<()> {
    let config = match &args.config {
        Some(path) => JanitorConfig::from_file(path)?,
        None => JanitorConfig::default(),
    };
    let now = match args.now.as_deref() {
        Some(raw) => parse_instant(raw)?,
        None => SystemTime::now(),
    };
    let records = snapshot::load_records(&args.records)?;
    let policies = load_policies(args.policies.as_deref())?;

    let outcomes = check_records(&config, records, policies, now);
    println!("{}", formatter.format_outcomes(&outcomes)?);
    Ok(())
}

/// Run one reconcile pass per in-scope record against a throwaway copy.
///
/// Deletions only happen in the copy, so the reported decisions are the ones
/// a live run would reach, even when `dry_run` is configured.
pub fn check_records(
    config: &JanitorConfig,
    records: Vec<Record>,
    policies: StaticPolicies,
    now: SystemTime,
) -> Vec<CheckOutcome> {
    let filter = EventFilter::from_config(config);
    let (in_scope, skipped): (Vec<Record>, Vec<Record>) = records
        .into_iter()
        .partition(|record| filter.accepts(&WatchEvent::new(EventKind::Added, record.clone())));
    if !skipped.is_empty() {
        tracing::info!(skipped = skipped.len(), "Records outside the janitor's scope were skipped");
    }

    let live = JanitorConfig {
        dry_run: false,
        ..config.clone()
    };
    let store = MemoryStore::with_records(in_scope.iter().cloned());
    let reconciler = Reconciler::new(&live, store, policies, ManualClock::new(now));

    in_scope
        .into_iter()
        .map(|record| CheckOutcome {
            decision: reconciler
                .reconcile(&record.key, &Cancellation::never())
                .map_err(|e| e.to_string()),
            key: record.key,
        })
        .collect()
}

/// Parse an RFC 3339 instant.
fn parse_instant(raw: &str) -> Result<SystemTime> {
    DateTime::parse_from_rfc3339(raw)
        .map(SystemTime::from)
        .map_err(|e| CliError::InvalidInput(format!("Invalid --now '{}': {}", raw, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use reaper_domain::record::{TTL_REPORT_ANNOTATION, TTL_SECRET_ANNOTATION};
    use reaper_domain::RecordKind;
    use std::time::{Duration, UNIX_EPOCH};

    fn report(name: &str, namespace: &str, ttl: &str, created_secs: u64) -> Record {
        Record::new(
            RecordKey::namespaced(RecordKind::VulnerabilityReport, namespace, name),
            UNIX_EPOCH + Duration::from_secs(created_secs),
        )
        .with_annotation(TTL_REPORT_ANNOTATION, ttl)
    }

    #[test]
    fn test_check_records() {
        let records = vec![
            report("expired", "default", "1h", 0),
            report("fresh", "default", "1h", 3600),
            report("broken", "default", "tomorrow", 0),
        ];
        let now = UNIX_EPOCH + Duration::from_secs(5400);

        let outcomes = check_records(&JanitorConfig::default(), records, StaticPolicies::new(), now);
        let decisions: Vec<_> = outcomes.iter().map(|o| o.decision.clone()).collect();

        assert_eq!(decisions[0], Ok(Decision::DeleteNow));
        assert_eq!(decisions[1], Ok(Decision::RequeueAfter(Duration::from_secs(1800))));
        assert!(decisions[2].as_ref().unwrap_err().contains("tomorrow"));
    }

    #[test]
    fn test_check_reports_deletes_under_dry_run() {
        let config = JanitorConfig {
            dry_run: true,
            ..Default::default()
        };
        let outcomes = check_records(
            &config,
            vec![report("expired", "default", "0s", 0)],
            StaticPolicies::new(),
            UNIX_EPOCH + Duration::from_secs(1),
        );
        assert_eq!(outcomes[0].decision, Ok(Decision::DeleteNow));
    }

    #[test]
    fn test_check_skips_out_of_scope_records() {
        let config = JanitorConfig {
            target_namespaces: vec!["prod".to_string()],
            ..Default::default()
        };
        let unmanaged_secret = Record::new(
            RecordKey::namespaced(RecordKind::Secret, "trivy-system", "scan-job"),
            UNIX_EPOCH,
        )
        .with_annotation(TTL_SECRET_ANNOTATION, "0s");
        let records = vec![
            report("in-scope", "prod", "0s", 0),
            report("elsewhere", "default", "0s", 0),
            unmanaged_secret,
        ];

        let outcomes = check_records(&config, records, StaticPolicies::new(), UNIX_EPOCH);
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].key.name, "in-scope");
    }

    #[test]
    fn test_parse_instant() {
        assert_eq!(
            parse_instant("1970-01-01T01:00:00Z").unwrap(),
            UNIX_EPOCH + Duration::from_secs(3600)
        );
        assert!(matches!(parse_instant("yesterday"), Err(CliError::InvalidInput(_))));
    }
}
