//! Scoring Oracle — the external semantic scorer `MatchScorer` delegates to.
//!
//! The oracle returns a loosely-typed JSON payload. Validation happens in the
//! scorer, which treats anything non-conforming exactly like a transport failure.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::llm_client::{LlmClient, LlmError};
use crate::matching::prompts::{MATCH_SCORE_PROMPT_TEMPLATE, MATCH_SCORE_SYSTEM};
use crate::models::candidate::Candidate;
use crate::models::job::Job;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateProfile {
    pub id: String,
    pub name: String,
    pub skills: Vec<String>,
    pub status: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRequirements {
    pub id: String,
    pub title: String,
    pub required_skills: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OracleRequest {
    pub candidate_profile: CandidateProfile,
    pub job_requirements: JobRequirements,
}

impl OracleRequest {
    pub fn new(candidate: &Candidate, job: &Job) -> Self {
        Self {
            candidate_profile: CandidateProfile {
                id: candidate.id.clone(),
                name: candidate.name.clone(),
                skills: candidate.skills.clone(),
                status: candidate.status.to_string(),
            },
            job_requirements: JobRequirements {
                id: job.id.clone(),
                title: job.title.clone(),
                required_skills: job.required_skills.clone(),
            },
        }
    }
}

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("oracle transport failed: {0}")]
    Transport(#[from] LlmError),

    #[error("oracle request could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Pluggable semantic scorer. Returns the raw response payload.
#[async_trait]
pub trait ScoringOracle: Send + Sync {
    async fn assess(&self, request: &OracleRequest) -> Result<Value, OracleError>;

    fn name(&self) -> &'static str;
}

/// Oracle backed by the Anthropic Messages API.
pub struct LlmScoringOracle {
    llm: LlmClient,
}

impl LlmScoringOracle {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl ScoringOracle for LlmScoringOracle {
    async fn assess(&self, request: &OracleRequest) -> Result<Value, OracleError> {
        let request_json = serde_json::to_string_pretty(request)?;
        let prompt = MATCH_SCORE_PROMPT_TEMPLATE.replace("{request_json}", &request_json);
        Ok(self
            .llm
            .complete_json::<Value>(&prompt, MATCH_SCORE_SYSTEM)
            .await?)
    }

    fn name(&self) -> &'static str {
        "llm"
    }
}
