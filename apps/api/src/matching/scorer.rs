//! Match Scorer — scores one candidate against one job.
//!
//! Primary path: the semantic `ScoringOracle`, bounded by a timeout.
//! Fallback path: a deterministic skill-overlap heuristic, used whenever the oracle
//! is not configured, errors, times out, or returns a payload that fails validation.
//! `score` never fails; callers always get a usable `MatchResult`.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::matching::oracle::{OracleRequest, ScoringOracle};
use crate::models::candidate::Candidate;
use crate::models::job::Job;
use crate::models::matching::{MatchBreakdown, MatchResult, ScoreSource};

/// Weight of the skill score in the fallback overall score.
const FALLBACK_SKILL_WEIGHT: f64 = 0.8;
/// Floor added to every fallback score. Skill overlap is the only signal the
/// heuristic has, so the remaining 20 points are granted flat.
const FALLBACK_BASELINE: f64 = 20.0;
/// Value given to breakdown dimensions the fallback cannot compute.
const NEUTRAL_DIMENSION_SCORE: u32 = 50;
/// Fallback scores strictly above this are "Strong Match".
const STRONG_MATCH_THRESHOLD: u32 = 80;

pub const BAND_STRONG: &str = "Strong Match";
pub const BAND_POTENTIAL: &str = "Potential Match";
pub const BAND_INSUFFICIENT: &str = "Insufficient Data";

pub struct MatchScorer {
    oracle: Option<Arc<dyn ScoringOracle>>,
    oracle_timeout: Duration,
}

impl MatchScorer {
    pub fn new(oracle: Arc<dyn ScoringOracle>, oracle_timeout: Duration) -> Self {
        Self {
            oracle: Some(oracle),
            oracle_timeout,
        }
    }

    /// Scorer with no oracle; every result comes from the heuristic.
    pub fn heuristic_only() -> Self {
        Self {
            oracle: None,
            oracle_timeout: Duration::ZERO,
        }
    }

    pub fn backend(&self) -> &'static str {
        self.oracle.as_ref().map(|o| o.name()).unwrap_or("heuristic")
    }

    pub async fn score(&self, candidate: &Candidate, job: &Job) -> MatchResult {
        if let Some(oracle) = &self.oracle {
            let request = OracleRequest::new(candidate, job);
            let outcome = tokio::time::timeout(self.oracle_timeout, oracle.assess(&request)).await;
            match outcome {
                Ok(Ok(payload)) => match validate_oracle_payload(payload) {
                    Ok(validated) => {
                        debug!(
                            "Oracle scored candidate {} for job {}: {}",
                            candidate.id, job.id, validated.overall_score
                        );
                        return validated.into_result(&candidate.id, &job.id, Utc::now());
                    }
                    Err(e) => warn!(
                        "Oracle payload for candidate {} / job {} rejected ({e}); using fallback",
                        candidate.id, job.id
                    ),
                },
                Ok(Err(e)) => warn!(
                    "Oracle failed for candidate {} / job {} ({e}); using fallback",
                    candidate.id, job.id
                ),
                Err(_) => warn!(
                    "Oracle timed out after {}ms for candidate {} / job {}; using fallback",
                    self.oracle_timeout.as_millis(),
                    candidate.id,
                    job.id
                ),
            }
        }

        fallback_score(candidate, job, Utc::now())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Oracle payload validation
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Error, PartialEq)]
pub enum PayloadError {
    #[error("missing or mistyped field: {0}")]
    Shape(String),

    #[error("{field} out of range: {value}")]
    OutOfRange { field: &'static str, value: f64 },
}

fn neutral_dimension() -> f64 {
    NEUTRAL_DIMENSION_SCORE as f64
}

#[derive(Debug, Deserialize)]
struct OracleBreakdown {
    skills: f64,
    #[serde(default = "neutral_dimension")]
    experience: f64,
    #[serde(default = "neutral_dimension")]
    location: f64,
    #[serde(default = "neutral_dimension")]
    education: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OraclePayload {
    overall_score: f64,
    breakdown: OracleBreakdown,
    matched_skills: Vec<String>,
    missing_skills: Vec<String>,
    recommendation: String,
    reasoning: String,
}

#[derive(Debug)]
pub struct ValidatedPayload {
    overall_score: u32,
    breakdown: MatchBreakdown,
    matched_skills: Vec<String>,
    missing_skills: Vec<String>,
    recommendation: String,
    reasoning: String,
}

impl ValidatedPayload {
    fn into_result(self, candidate_id: &str, job_id: &str, now: DateTime<Utc>) -> MatchResult {
        MatchResult {
            candidate_id: candidate_id.to_string(),
            job_id: job_id.to_string(),
            overall_score: self.overall_score,
            breakdown: self.breakdown,
            matched_skills: self.matched_skills,
            missing_skills: self.missing_skills,
            recommendation: self.recommendation,
            reasoning: self.reasoning,
            source: ScoreSource::Oracle,
            created_at: now,
        }
    }
}

/// Checks the oracle response carries every required key with in-range scores.
pub fn validate_oracle_payload(payload: Value) -> Result<ValidatedPayload, PayloadError> {
    let raw: OraclePayload =
        serde_json::from_value(payload).map_err(|e| PayloadError::Shape(e.to_string()))?;

    Ok(ValidatedPayload {
        overall_score: percentage("overallScore", raw.overall_score)?,
        breakdown: MatchBreakdown {
            skills: percentage("breakdown.skills", raw.breakdown.skills)?,
            experience: percentage("breakdown.experience", raw.breakdown.experience)?,
            location: percentage("breakdown.location", raw.breakdown.location)?,
            education: percentage("breakdown.education", raw.breakdown.education)?,
        },
        matched_skills: raw.matched_skills,
        missing_skills: raw.missing_skills,
        recommendation: raw.recommendation,
        reasoning: raw.reasoning,
    })
}

fn percentage(field: &'static str, value: f64) -> Result<u32, PayloadError> {
    if !value.is_finite() || !(0.0..=100.0).contains(&value) {
        return Err(PayloadError::OutOfRange { field, value });
    }
    Ok(value.round() as u32)
}

// ────────────────────────────────────────────────────────────────────────────
// Deterministic fallback
// ────────────────────────────────────────────────────────────────────────────

/// Splits `required` into (matched, missing). A required skill matches when any
/// candidate skill contains it, ignoring case. Order follows `required`.
pub fn partition_skills(
    candidate_skills: &[String],
    required: &[String],
) -> (Vec<String>, Vec<String>) {
    let haystack: Vec<String> = candidate_skills
        .iter()
        .map(|s| s.trim().to_lowercase())
        .collect();

    required.iter().cloned().partition(|skill| {
        let needle = skill.trim().to_lowercase();
        haystack.iter().any(|have| have.contains(&needle))
    })
}

/// Heuristic score used when the oracle cannot be. Pure apart from `now`.
pub fn fallback_score(candidate: &Candidate, job: &Job, now: DateTime<Utc>) -> MatchResult {
    let (matched_skills, missing_skills) =
        partition_skills(&candidate.skills, &job.required_skills);

    let required = job.required_skills.len();
    let skill_score = if required == 0 {
        100.0
    } else {
        matched_skills.len() as f64 / required as f64 * 100.0
    };
    let overall_score =
        ((skill_score * FALLBACK_SKILL_WEIGHT + FALLBACK_BASELINE).round() as u32).min(100);

    let recommendation = if overall_score > STRONG_MATCH_THRESHOLD {
        BAND_STRONG
    } else {
        BAND_POTENTIAL
    };
    let reasoning = format!(
        "Matched {} of {} required skills.",
        matched_skills.len(),
        required
    );

    MatchResult {
        candidate_id: candidate.id.clone(),
        job_id: job.id.clone(),
        overall_score,
        breakdown: MatchBreakdown {
            skills: skill_score.round() as u32,
            experience: NEUTRAL_DIMENSION_SCORE,
            location: NEUTRAL_DIMENSION_SCORE,
            education: NEUTRAL_DIMENSION_SCORE,
        },
        matched_skills,
        missing_skills,
        recommendation: recommendation.to_string(),
        reasoning,
        source: ScoreSource::Fallback,
        created_at: now,
    }
}

/// Zero-score result for a candidate whose profile could not be loaded.
/// Keeps ranking total over its input instead of dropping the id silently.
pub fn insufficient_profile(candidate_id: &str, job: &Job, now: DateTime<Utc>) -> MatchResult {
    MatchResult {
        candidate_id: candidate_id.to_string(),
        job_id: job.id.clone(),
        overall_score: 0,
        breakdown: MatchBreakdown {
            skills: 0,
            experience: 0,
            location: 0,
            education: 0,
        },
        matched_skills: vec![],
        missing_skills: job.required_skills.clone(),
        recommendation: BAND_INSUFFICIENT.to_string(),
        reasoning: "Insufficient profile data to score this candidate.".to_string(),
        source: ScoreSource::Insufficient,
        created_at: now,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::LlmError;
    use crate::matching::oracle::OracleError;
    use crate::models::candidate::CandidateStatus;
    use crate::models::job::JobStatus;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashSet;

    fn candidate(skills: &[&str]) -> Candidate {
        Candidate {
            id: "c1".to_string(),
            legacy_id: None,
            name: "Linus".to_string(),
            email: None,
            skills: skills.iter().map(|s| s.to_string()).collect(),
            status: CandidateStatus::Applied,
            last_activity: None,
            applied_date: None,
            rejected_date: None,
            stage_date: None,
            referrer_id: None,
        }
    }

    fn job(required: &[&str]) -> Job {
        Job {
            id: "j1".to_string(),
            title: "Full-stack Engineer".to_string(),
            required_skills: required.iter().map(|s| s.to_string()).collect(),
            status: JobStatus::Open,
        }
    }

    fn good_payload() -> Value {
        json!({
            "overallScore": 88,
            "breakdown": {"skills": 90, "experience": 85, "location": 100, "education": 70},
            "matchedSkills": ["React", "Node"],
            "missingSkills": ["AWS"],
            "recommendation": "Good Match",
            "reasoning": "Solid frontend experience."
        })
    }

    enum Behaviour {
        Respond(Value),
        Fail,
        Hang,
    }

    struct StubOracle(Behaviour);

    #[async_trait]
    impl ScoringOracle for StubOracle {
        async fn assess(&self, _request: &OracleRequest) -> Result<Value, OracleError> {
            match &self.0 {
                Behaviour::Respond(v) => Ok(v.clone()),
                Behaviour::Fail => Err(OracleError::Transport(LlmError::EmptyContent)),
                Behaviour::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Err(OracleError::Transport(LlmError::EmptyContent))
                }
            }
        }

        fn name(&self) -> &'static str {
            "stub"
        }
    }

    fn scorer(behaviour: Behaviour) -> MatchScorer {
        MatchScorer::new(Arc::new(StubOracle(behaviour)), Duration::from_millis(50))
    }

    #[test]
    fn test_fallback_partial_match_scenario() {
        let result = fallback_score(
            &candidate(&["React", "Node"]),
            &job(&["React", "Node", "AWS"]),
            Utc::now(),
        );
        assert_eq!(result.matched_skills, vec!["React", "Node"]);
        assert_eq!(result.missing_skills, vec!["AWS"]);
        assert_eq!(result.breakdown.skills, 67);
        assert_eq!(result.overall_score, 73);
        assert_eq!(result.recommendation, BAND_POTENTIAL);
        assert_eq!(result.reasoning, "Matched 2 of 3 required skills.");
        assert_eq!(result.source, ScoreSource::Fallback);
    }

    #[test]
    fn test_fallback_no_required_skills_is_full_skill_score() {
        let no_skills: &[&str] = &[];
        for skills in [no_skills, &["Haskell"]] {
            let result = fallback_score(&candidate(skills), &job(&[]), Utc::now());
            assert_eq!(result.breakdown.skills, 100);
            assert_eq!(result.overall_score, 100);
            assert_eq!(result.recommendation, BAND_STRONG);
            assert!(result.matched_skills.is_empty());
            assert!(result.missing_skills.is_empty());
        }
    }

    #[test]
    fn test_fallback_match_is_case_insensitive_substring() {
        let (matched, missing) = partition_skills(
            &["ReactJS".to_string(), "postgresql".to_string()],
            &["react".to_string(), "PostgreSQL".to_string(), "Go".to_string()],
        );
        assert_eq!(matched, vec!["react", "PostgreSQL"]);
        assert_eq!(missing, vec!["Go"]);
    }

    #[test]
    fn test_fallback_skill_counts_once_even_with_many_hits() {
        let result = fallback_score(
            &candidate(&["Rust", "Rust async", "rustls"]),
            &job(&["Rust", "Kafka"]),
            Utc::now(),
        );
        assert_eq!(result.matched_skills, vec!["Rust"]);
        assert_eq!(result.breakdown.skills, 50);
        assert_eq!(result.overall_score, 60);
    }

    #[test]
    fn test_fallback_empty_candidate_skills() {
        let result = fallback_score(&candidate(&[]), &job(&["SQL"]), Utc::now());
        assert_eq!(result.overall_score, 20);
        assert_eq!(result.missing_skills, vec!["SQL"]);
    }

    #[test]
    fn test_fallback_sets_cover_requirements_and_are_disjoint() {
        let cases: &[(&[&str], &[&str])] = &[
            (&["React", "Node"], &["React", "Node", "AWS"]),
            (&[], &["A", "B"]),
            (&["aws lambda", "Terraform"], &["AWS", "terraform", "GCP", "K8s"]),
            (&["x"], &[]),
        ];
        for (have, need) in cases {
            let j = job(need);
            let result = fallback_score(&candidate(have), &j, Utc::now());
            let matched: HashSet<_> = result.matched_skills.iter().collect();
            let missing: HashSet<_> = result.missing_skills.iter().collect();
            let required: HashSet<_> = j.required_skills.iter().collect();
            assert!(matched.is_disjoint(&missing));
            assert_eq!(&matched | &missing, required);
            assert!(result.overall_score <= 100);
        }
    }

    #[test]
    fn test_strong_band_requires_score_above_80() {
        // 3 of 4 → 75 → 80 overall, which is not strictly above the threshold.
        let result = fallback_score(
            &candidate(&["a", "b", "c"]),
            &job(&["a", "b", "c", "d"]),
            Utc::now(),
        );
        assert_eq!(result.overall_score, 80);
        assert_eq!(result.recommendation, BAND_POTENTIAL);
    }

    #[test]
    fn test_insufficient_profile_is_zero_and_lists_all_missing() {
        let result = insufficient_profile("ghost", &job(&["Rust", "SQL"]), Utc::now());
        assert_eq!(result.overall_score, 0);
        assert_eq!(result.missing_skills, vec!["Rust", "SQL"]);
        assert!(result.reasoning.to_lowercase().contains("insufficient profile data"));
        assert_eq!(result.source, ScoreSource::Insufficient);
    }

    #[test]
    fn test_validate_accepts_well_formed_payload() {
        let validated = validate_oracle_payload(good_payload()).unwrap();
        let result = validated.into_result("c1", "j1", Utc::now());
        assert_eq!(result.overall_score, 88);
        assert_eq!(result.breakdown.location, 100);
        assert_eq!(result.recommendation, "Good Match");
        assert_eq!(result.source, ScoreSource::Oracle);
    }

    #[test]
    fn test_validate_rejects_missing_key() {
        let mut payload = good_payload();
        payload.as_object_mut().unwrap().remove("missingSkills");
        assert!(matches!(
            validate_oracle_payload(payload),
            Err(PayloadError::Shape(_))
        ));
    }

    #[test]
    fn test_validate_rejects_out_of_range_score() {
        let mut payload = good_payload();
        payload["overallScore"] = json!(140);
        assert_eq!(
            validate_oracle_payload(payload).unwrap_err(),
            PayloadError::OutOfRange {
                field: "overallScore",
                value: 140.0
            }
        );
    }

    #[test]
    fn test_validate_defaults_optional_dimensions() {
        let mut payload = good_payload();
        payload["breakdown"] = json!({"skills": 40});
        let validated = validate_oracle_payload(payload).unwrap();
        assert_eq!(validated.breakdown.experience, NEUTRAL_DIMENSION_SCORE);
    }

    #[tokio::test]
    async fn test_score_uses_oracle_when_valid() {
        let result = scorer(Behaviour::Respond(good_payload()))
            .score(&candidate(&["React"]), &job(&["React", "Node", "AWS"]))
            .await;
        assert_eq!(result.source, ScoreSource::Oracle);
        assert_eq!(result.overall_score, 88);
    }

    #[tokio::test]
    async fn test_score_falls_back_on_oracle_error() {
        let result = scorer(Behaviour::Fail)
            .score(&candidate(&["React", "Node"]), &job(&["React", "Node", "AWS"]))
            .await;
        assert_eq!(result.source, ScoreSource::Fallback);
        assert_eq!(result.overall_score, 73);
    }

    #[tokio::test]
    async fn test_score_falls_back_on_malformed_payload() {
        let result = scorer(Behaviour::Respond(json!({"score": "great"})))
            .score(&candidate(&["React"]), &job(&["React"]))
            .await;
        assert_eq!(result.source, ScoreSource::Fallback);
        assert_eq!(result.overall_score, 100);
    }

    #[tokio::test(start_paused = true)]
    async fn test_score_falls_back_on_oracle_timeout() {
        let result = scorer(Behaviour::Hang)
            .score(&candidate(&[]), &job(&["Go"]))
            .await;
        assert_eq!(result.source, ScoreSource::Fallback);
        assert_eq!(result.overall_score, 20);
    }

    #[tokio::test]
    async fn test_heuristic_only_never_calls_oracle() {
        let scorer = MatchScorer::heuristic_only();
        assert_eq!(scorer.backend(), "heuristic");
        let result = scorer.score(&candidate(&["Go"]), &job(&["Go"])).await;
        assert_eq!(result.source, ScoreSource::Fallback);
    }
}
