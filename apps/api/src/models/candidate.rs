use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Position of a candidate in the hiring pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CandidateStatus {
    Applied,
    Screening,
    Interview,
    Offer,
    Hired,
    Rejected,
    Archived,
}

impl CandidateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CandidateStatus::Applied => "Applied",
            CandidateStatus::Screening => "Screening",
            CandidateStatus::Interview => "Interview",
            CandidateStatus::Offer => "Offer",
            CandidateStatus::Hired => "Hired",
            CandidateStatus::Rejected => "Rejected",
            CandidateStatus::Archived => "Archived",
        }
    }

    /// Stages where a candidate is still waiting on the pipeline to move.
    pub fn is_open_stage(&self) -> bool {
        matches!(
            self,
            CandidateStatus::Applied
                | CandidateStatus::Screening
                | CandidateStatus::Interview
                | CandidateStatus::Offer
        )
    }
}

impl fmt::Display for CandidateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown candidate status '{0}'")]
pub struct UnknownStatus(pub String);

impl FromStr for CandidateStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Applied" => Ok(CandidateStatus::Applied),
            "Screening" => Ok(CandidateStatus::Screening),
            "Interview" => Ok(CandidateStatus::Interview),
            "Offer" => Ok(CandidateStatus::Offer),
            "Hired" => Ok(CandidateStatus::Hired),
            "Rejected" => Ok(CandidateStatus::Rejected),
            "Archived" => Ok(CandidateStatus::Archived),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// An active candidate record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: String,
    /// Identifier carried over from the previous applicant tracker, if any.
    #[serde(default)]
    pub legacy_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    pub status: CandidateStatus,
    #[serde(default)]
    pub last_activity: Option<DateTime<Utc>>,
    #[serde(default)]
    pub applied_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub rejected_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub stage_date: Option<DateTime<Utc>>,
    /// Who referred this candidate; receives lifecycle notifications.
    #[serde(default)]
    pub referrer_id: Option<String>,
}

/// A candidate snapshot held in the archive partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchivedRecord {
    /// Snapshot with `status == Archived`.
    pub candidate: Candidate,
    pub original_status: CandidateStatus,
    pub archived_date: DateTime<Utc>,
    pub archival_reason: String,
}

impl ArchivedRecord {
    pub fn id(&self) -> &str {
        &self.candidate.id
    }

    /// Builds the archive snapshot for `candidate`, remembering its current status.
    pub fn from_active(candidate: Candidate, reason: String, archived_at: DateTime<Utc>) -> Self {
        let original_status = candidate.status;
        let mut snapshot = candidate;
        snapshot.status = CandidateStatus::Archived;
        Self {
            candidate: snapshot,
            original_status,
            archived_date: archived_at,
            archival_reason: reason,
        }
    }

    /// Reverses `from_active`: the status goes back to what it was before archival,
    /// archival-only fields are dropped and activity is stamped with `restored_at`.
    pub fn into_active(self, restored_at: DateTime<Utc>) -> Candidate {
        let mut candidate = self.candidate;
        candidate.status = self.original_status;
        candidate.last_activity = Some(restored_at);
        candidate
    }
}

/// Fields a candidate can be looked up by, besides its primary id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateField {
    LegacyId,
    Email,
    Status,
}

impl CandidateField {
    pub fn column(&self) -> &'static str {
        match self {
            CandidateField::LegacyId => "legacy_id",
            CandidateField::Email => "email",
            CandidateField::Status => "status",
        }
    }

    pub fn value_of<'a>(&self, candidate: &'a Candidate) -> Option<&'a str> {
        match self {
            CandidateField::LegacyId => candidate.legacy_id.as_deref(),
            CandidateField::Email => candidate.email.as_deref(),
            CandidateField::Status => Some(candidate.status.as_str()),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Database rows
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, FromRow)]
pub struct CandidateRow {
    pub id: String,
    pub legacy_id: Option<String>,
    pub name: String,
    pub email: Option<String>,
    pub skills: Vec<String>,
    pub status: String,
    pub last_activity: Option<DateTime<Utc>>,
    pub applied_date: Option<DateTime<Utc>>,
    pub rejected_date: Option<DateTime<Utc>>,
    pub stage_date: Option<DateTime<Utc>>,
    pub referrer_id: Option<String>,
}

impl TryFrom<CandidateRow> for Candidate {
    type Error = UnknownStatus;

    fn try_from(row: CandidateRow) -> Result<Self, Self::Error> {
        Ok(Candidate {
            id: row.id,
            legacy_id: row.legacy_id,
            name: row.name,
            email: row.email,
            skills: row.skills,
            status: row.status.parse()?,
            last_activity: row.last_activity,
            applied_date: row.applied_date,
            rejected_date: row.rejected_date,
            stage_date: row.stage_date,
            referrer_id: row.referrer_id,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct ArchivedCandidateRow {
    #[sqlx(flatten)]
    pub candidate: CandidateRow,
    pub original_status: String,
    pub archived_date: DateTime<Utc>,
    pub archival_reason: String,
}

impl TryFrom<ArchivedCandidateRow> for ArchivedRecord {
    type Error = UnknownStatus;

    fn try_from(row: ArchivedCandidateRow) -> Result<Self, Self::Error> {
        Ok(ArchivedRecord {
            candidate: row.candidate.try_into()?,
            original_status: row.original_status.parse()?,
            archived_date: row.archived_date,
            archival_reason: row.archival_reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn candidate(status: CandidateStatus) -> Candidate {
        Candidate {
            id: "cand-1".to_string(),
            legacy_id: Some("L-77".to_string()),
            name: "Ada".to_string(),
            email: None,
            skills: vec!["Rust".to_string()],
            status,
            last_activity: Some(Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()),
            applied_date: None,
            rejected_date: None,
            stage_date: None,
            referrer_id: None,
        }
    }

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [
            CandidateStatus::Applied,
            CandidateStatus::Screening,
            CandidateStatus::Interview,
            CandidateStatus::Offer,
            CandidateStatus::Hired,
            CandidateStatus::Rejected,
            CandidateStatus::Archived,
        ] {
            assert_eq!(status.as_str().parse::<CandidateStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_unknown_status_is_rejected() {
        assert!("Withdrawn".parse::<CandidateStatus>().is_err());
    }

    #[test]
    fn test_archive_snapshot_keeps_original_status() {
        let now = Utc.with_ymd_and_hms(2026, 5, 1, 0, 0, 0).unwrap();
        let record =
            ArchivedRecord::from_active(candidate(CandidateStatus::Interview), "x".into(), now);
        assert_eq!(record.candidate.status, CandidateStatus::Archived);
        assert_eq!(record.original_status, CandidateStatus::Interview);
        assert_eq!(record.archived_date, now);
    }

    #[test]
    fn test_into_active_restores_everything_but_activity() {
        let original = candidate(CandidateStatus::Rejected);
        let archived_at = Utc.with_ymd_and_hms(2026, 5, 1, 0, 0, 0).unwrap();
        let restored_at = Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap();

        let restored = ArchivedRecord::from_active(original.clone(), "r".into(), archived_at)
            .into_active(restored_at);

        assert_eq!(restored.last_activity, Some(restored_at));
        let mut expected = original;
        expected.last_activity = Some(restored_at);
        assert_eq!(restored, expected);
    }

    #[test]
    fn test_field_lookup_values() {
        let c = candidate(CandidateStatus::Offer);
        assert_eq!(CandidateField::LegacyId.value_of(&c), Some("L-77"));
        assert_eq!(CandidateField::Email.value_of(&c), None);
        assert_eq!(CandidateField::Status.value_of(&c), Some("Offer"));
    }
}
