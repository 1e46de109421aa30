use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-dimension scores, each 0 – 100.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchBreakdown {
    pub skills: u32,
    pub experience: u32,
    pub location: u32,
    pub education: u32,
}

/// Which path produced a `MatchResult`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreSource {
    Oracle,
    Fallback,
    Insufficient,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub candidate_id: String,
    pub job_id: String,
    pub overall_score: u32, // 0 – 100
    pub breakdown: MatchBreakdown,
    pub matched_skills: Vec<String>,
    pub missing_skills: Vec<String>,
    pub recommendation: String,
    pub reasoning: String,
    pub source: ScoreSource,
    pub created_at: DateTime<Utc>,
}
