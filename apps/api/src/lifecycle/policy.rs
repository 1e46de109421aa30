//! Archival Policy — decides whether an active candidate should be archived.
//!
//! Three rules, any one sufficient:
//! - Rejected-hold: rejected and untouched for longer than `rejected_hold_days`
//! - Inactivity: no activity for longer than `inactivity_days`
//! - Stagnant-stage: stuck in an open stage for longer than `stagnant_stage_days`
//!
//! When several rules fire, the reported reason follows that same fixed order.
//! A rule whose reference date is missing does not fire.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::models::candidate::{Candidate, CandidateStatus};

/// Source of "now" for policy evaluation.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Always returns the same instant.
#[cfg(test)]
pub struct FixedClock(pub DateTime<Utc>);

#[cfg(test)]
impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchivalThresholds {
    pub inactivity_days: i64,
    pub rejected_hold_days: i64,
    pub stagnant_stage_days: i64,
}

impl Default for ArchivalThresholds {
    fn default() -> Self {
        Self {
            inactivity_days: 90,
            rejected_hold_days: 30,
            stagnant_stage_days: 60,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchivalRule {
    RejectedHold,
    Inactivity,
    StagnantStage,
}

/// Reported reason priority when more than one rule fires.
pub const RULE_PRIORITY: [ArchivalRule; 3] = [
    ArchivalRule::RejectedHold,
    ArchivalRule::Inactivity,
    ArchivalRule::StagnantStage,
];

pub const NOT_ELIGIBLE_REASON: &str = "Not eligible for archival";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchivalVerdict {
    pub eligible: bool,
    pub reason: String,
    /// The rule the reason was taken from.
    pub rule: Option<ArchivalRule>,
    /// Every rule that fired, in priority order.
    pub matched_rules: Vec<ArchivalRule>,
}

#[derive(Debug, Clone, Default)]
pub struct ArchivalPolicyEngine {
    thresholds: ArchivalThresholds,
}

impl ArchivalPolicyEngine {
    pub fn new(thresholds: ArchivalThresholds) -> Self {
        Self { thresholds }
    }

    pub fn evaluate(&self, candidate: &Candidate, now: DateTime<Utc>) -> ArchivalVerdict {
        let matched_rules: Vec<ArchivalRule> = RULE_PRIORITY
            .into_iter()
            .filter(|rule| self.rule_fires(*rule, candidate, now))
            .collect();

        match matched_rules.first().copied() {
            Some(rule) => ArchivalVerdict {
                eligible: true,
                reason: self.reason_for(rule),
                rule: Some(rule),
                matched_rules,
            },
            None => ArchivalVerdict {
                eligible: false,
                reason: NOT_ELIGIBLE_REASON.to_string(),
                rule: None,
                matched_rules,
            },
        }
    }

    pub fn reason_for(&self, rule: ArchivalRule) -> String {
        let t = &self.thresholds;
        match rule {
            ArchivalRule::RejectedHold => format!("Rejected for > {} days", t.rejected_hold_days),
            ArchivalRule::Inactivity => format!("Inactive for > {} days", t.inactivity_days),
            ArchivalRule::StagnantStage => {
                format!("No stage progress for > {} days", t.stagnant_stage_days)
            }
        }
    }

    fn rule_fires(&self, rule: ArchivalRule, c: &Candidate, now: DateTime<Utc>) -> bool {
        let t = &self.thresholds;
        match rule {
            ArchivalRule::RejectedHold => {
                c.status == CandidateStatus::Rejected
                    && older_than(c.rejected_date.or(c.last_activity), now, t.rejected_hold_days)
            }
            ArchivalRule::Inactivity => {
                older_than(c.last_activity.or(c.applied_date), now, t.inactivity_days)
            }
            ArchivalRule::StagnantStage => {
                c.status.is_open_stage()
                    && older_than(c.stage_date.or(c.last_activity), now, t.stagnant_stage_days)
            }
        }
    }
}

/// Strictly more than `days` between `since` and `now`. A threshold chrono cannot
/// represent never fires.
fn older_than(since: Option<DateTime<Utc>>, now: DateTime<Utc>, days: i64) -> bool {
    match (since, Duration::try_days(days)) {
        (Some(since), Some(limit)) => now - since > limit,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 1, 12, 0, 0).unwrap()
    }

    fn days_ago(days: i64) -> Option<DateTime<Utc>> {
        Some(now() - Duration::days(days))
    }

    fn candidate(status: CandidateStatus) -> Candidate {
        Candidate {
            id: "c1".to_string(),
            legacy_id: None,
            name: "Barbara".to_string(),
            email: None,
            skills: vec![],
            status,
            last_activity: days_ago(1),
            applied_date: None,
            rejected_date: None,
            stage_date: None,
            referrer_id: None,
        }
    }

    fn engine() -> ArchivalPolicyEngine {
        ArchivalPolicyEngine::default()
    }

    #[test]
    fn test_rejected_forty_days_ago_is_eligible() {
        let mut c = candidate(CandidateStatus::Rejected);
        c.rejected_date = days_ago(40);

        let verdict = engine().evaluate(&c, now());
        assert!(verdict.eligible);
        assert_eq!(verdict.reason, "Rejected for > 30 days");
        assert_eq!(verdict.rule, Some(ArchivalRule::RejectedHold));
    }

    #[test]
    fn test_rejected_hold_falls_back_to_last_activity() {
        let mut c = candidate(CandidateStatus::Rejected);
        c.last_activity = days_ago(31);
        assert!(engine().evaluate(&c, now()).eligible);
    }

    #[test]
    fn test_exactly_at_threshold_is_not_eligible() {
        let mut c = candidate(CandidateStatus::Rejected);
        c.rejected_date = days_ago(30);
        let verdict = engine().evaluate(&c, now());
        assert!(!verdict.eligible);
        assert_eq!(verdict.reason, NOT_ELIGIBLE_REASON);
    }

    #[test]
    fn test_inactivity_uses_applied_date_when_activity_missing() {
        let mut c = candidate(CandidateStatus::Hired);
        c.last_activity = None;
        c.applied_date = days_ago(91);

        let verdict = engine().evaluate(&c, now());
        assert!(verdict.eligible);
        assert_eq!(verdict.reason, "Inactive for > 90 days");
    }

    #[test]
    fn test_hired_candidate_is_not_stagnant() {
        let mut c = candidate(CandidateStatus::Hired);
        c.stage_date = days_ago(200);
        assert!(!engine().evaluate(&c, now()).eligible);
    }

    #[test]
    fn test_stagnant_open_stage() {
        let mut c = candidate(CandidateStatus::Interview);
        c.stage_date = days_ago(61);

        let verdict = engine().evaluate(&c, now());
        assert!(verdict.eligible);
        assert_eq!(verdict.reason, "No stage progress for > 60 days");
        assert_eq!(verdict.matched_rules, vec![ArchivalRule::StagnantStage]);
    }

    #[test]
    fn test_priority_rejected_beats_inactivity() {
        let mut c = candidate(CandidateStatus::Rejected);
        c.last_activity = days_ago(120);

        let verdict = engine().evaluate(&c, now());
        assert_eq!(verdict.rule, Some(ArchivalRule::RejectedHold));
        assert_eq!(
            verdict.matched_rules,
            vec![ArchivalRule::RejectedHold, ArchivalRule::Inactivity]
        );
    }

    #[test]
    fn test_priority_inactivity_beats_stagnant() {
        let mut c = candidate(CandidateStatus::Applied);
        c.last_activity = days_ago(100);

        let verdict = engine().evaluate(&c, now());
        assert_eq!(verdict.reason, "Inactive for > 90 days");
        assert_eq!(
            verdict.matched_rules,
            vec![ArchivalRule::Inactivity, ArchivalRule::StagnantStage]
        );
    }

    #[test]
    fn test_no_dates_at_all_never_fires() {
        let mut c = candidate(CandidateStatus::Rejected);
        c.last_activity = None;
        assert!(!engine().evaluate(&c, now()).eligible);
    }

    #[test]
    fn test_custom_thresholds_shape_reason() {
        let engine = ArchivalPolicyEngine::new(ArchivalThresholds {
            inactivity_days: 10,
            rejected_hold_days: 5,
            stagnant_stage_days: 7,
        });
        let mut c = candidate(CandidateStatus::Offer);
        c.last_activity = days_ago(11);
        assert_eq!(engine.evaluate(&c, now()).reason, "Inactive for > 10 days");
    }

    #[test]
    fn test_unrepresentable_threshold_never_fires() {
        let engine = ArchivalPolicyEngine::new(ArchivalThresholds {
            inactivity_days: i64::MAX,
            rejected_hold_days: i64::MAX,
            stagnant_stage_days: i64::MAX,
        });
        let mut c = candidate(CandidateStatus::Rejected);
        c.last_activity = days_ago(5000);
        assert!(!engine.evaluate(&c, now()).eligible);
    }

    #[test]
    fn test_fixed_clock_is_stable() {
        let clock = FixedClock(now());
        assert_eq!(clock.now(), clock.now());
    }
}
