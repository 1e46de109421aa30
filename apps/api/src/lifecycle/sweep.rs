//! Periodic archival sweep over the active partition.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::lifecycle::policy::ArchivalRule;
use crate::lifecycle::store::{LifecycleError, LifecycleStore};

#[derive(Debug, Clone, Serialize)]
pub struct SweepReport {
    pub evaluated: usize,
    pub eligible: usize,
    pub archived: usize,
    /// Eligible candidates keyed by the rule their reason came from.
    pub by_rule: BTreeMap<String, usize>,
    pub started_at: DateTime<Utc>,
}

/// Evaluates every active candidate and archives the eligible ones.
pub async fn run_archival_sweep(lifecycle: &LifecycleStore) -> Result<SweepReport, LifecycleError> {
    let started_at = lifecycle.now();
    let candidates = lifecycle
        .active_candidates()
        .await
        .map_err(|source| LifecycleError::Store {
            committed: 0,
            source,
        })?;

    let mut by_rule = BTreeMap::new();
    let mut eligible = Vec::new();
    for candidate in &candidates {
        let verdict = lifecycle.policy().evaluate(candidate, started_at);
        if let Some(rule) = verdict.rule {
            *by_rule.entry(rule_key(rule).to_string()).or_insert(0) += 1;
            eligible.push(candidate.id.clone());
        }
    }

    let archived = if eligible.is_empty() {
        0
    } else {
        lifecycle.archive(&eligible).await?
    };

    info!(
        "Archival sweep: {} evaluated, {} eligible, {} archived",
        candidates.len(),
        eligible.len(),
        archived
    );
    Ok(SweepReport {
        evaluated: candidates.len(),
        eligible: eligible.len(),
        archived,
        by_rule,
        started_at,
    })
}

/// Runs the sweep every `period` until `shutdown` fires. A zero period disables it.
pub fn spawn_periodic_sweep(
    lifecycle: Arc<LifecycleStore>,
    period: Duration,
    shutdown: CancellationToken,
) -> Option<JoinHandle<()>> {
    if period.is_zero() {
        info!("Periodic archival sweep disabled");
        return None;
    }

    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately; skip it so startup isn't a sweep.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = run_archival_sweep(&lifecycle).await {
                        error!("Archival sweep failed: {e}");
                    }
                }
            }
        }
        info!("Periodic archival sweep stopped");
    }))
}

fn rule_key(rule: ArchivalRule) -> &'static str {
    match rule {
        ArchivalRule::RejectedHold => "rejected_hold",
        ArchivalRule::Inactivity => "inactivity",
        ArchivalRule::StagnantStage => "stagnant_stage",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::events::EventPublisher;
    use crate::lifecycle::policy::{ArchivalPolicyEngine, FixedClock};
    use crate::models::candidate::{Candidate, CandidateStatus};
    use crate::store::memory::InMemoryRecordStore;
    use crate::store::RecordStore;
    use chrono::{Duration as ChronoDuration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 1, 9, 0, 0).unwrap()
    }

    fn candidate(id: &str, status: CandidateStatus, idle_days: i64) -> Candidate {
        Candidate {
            id: id.to_string(),
            legacy_id: None,
            name: id.to_string(),
            email: None,
            skills: vec![],
            status,
            last_activity: Some(now() - ChronoDuration::days(idle_days)),
            applied_date: None,
            rejected_date: None,
            stage_date: None,
            referrer_id: None,
        }
    }

    fn lifecycle(store: Arc<InMemoryRecordStore>) -> Arc<LifecycleStore> {
        Arc::new(LifecycleStore::new(
            store,
            ArchivalPolicyEngine::default(),
            Arc::new(FixedClock(now())),
            EventPublisher::disabled(),
            450,
            Duration::from_secs(1),
        ))
    }

    fn seeded() -> Arc<InMemoryRecordStore> {
        let store = Arc::new(InMemoryRecordStore::new());
        store.insert_candidate(candidate("fresh", CandidateStatus::Interview, 3));
        store.insert_candidate(candidate("rejected", CandidateStatus::Rejected, 45));
        store.insert_candidate(candidate("idle", CandidateStatus::Hired, 120));
        store
    }

    #[tokio::test]
    async fn test_sweep_archives_only_eligible() {
        let store = seeded();
        let report = run_archival_sweep(&lifecycle(store.clone())).await.unwrap();

        assert_eq!(report.evaluated, 3);
        assert_eq!(report.eligible, 2);
        assert_eq!(report.archived, 2);
        assert_eq!(report.by_rule.get("rejected_hold"), Some(&1));
        assert_eq!(report.by_rule.get("inactivity"), Some(&1));
        assert!(store.get_candidate("fresh").await.unwrap().is_some());

        let record = store.get_archived("idle").await.unwrap().unwrap();
        assert_eq!(record.archival_reason, "Inactive for > 90 days");
    }

    #[tokio::test]
    async fn test_second_sweep_is_a_no_op() {
        let store = seeded();
        let lifecycle = lifecycle(store.clone());
        run_archival_sweep(&lifecycle).await.unwrap();

        let report = run_archival_sweep(&lifecycle).await.unwrap();
        assert_eq!(report.evaluated, 1);
        assert_eq!(report.archived, 0);
    }

    #[tokio::test]
    async fn test_zero_period_disables_periodic_sweep() {
        let handle = spawn_periodic_sweep(
            lifecycle(seeded()),
            Duration::ZERO,
            CancellationToken::new(),
        );
        assert!(handle.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_sweep_runs_and_stops_on_shutdown() {
        let store = seeded();
        let shutdown = CancellationToken::new();
        let handle = spawn_periodic_sweep(
            lifecycle(store.clone()),
            Duration::from_secs(60),
            shutdown.clone(),
        )
        .unwrap();

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(store.archived_count(), 2);

        shutdown.cancel();
        handle.await.unwrap();
    }
}
