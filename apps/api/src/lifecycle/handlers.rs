//! Axum route handlers for the Lifecycle API.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::lifecycle::policy::ArchivalVerdict;
use crate::lifecycle::sweep::{run_archival_sweep, SweepReport};
use crate::models::candidate::{
    ArchivedRecord, Candidate, CandidateField, CandidateStatus, UnknownStatus,
};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CandidateIdsRequest {
    pub candidate_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ArchiveResponse {
    pub requested: usize,
    pub archived_count: usize,
}

#[derive(Debug, Serialize)]
pub struct RestoreResponse {
    pub requested: usize,
    pub restored_count: usize,
}

#[derive(Debug, Serialize)]
pub struct EligibilityResponse {
    pub candidate_id: String,
    #[serde(flatten)]
    pub verdict: ArchivalVerdict,
}

#[derive(Debug, Default, Deserialize)]
pub struct CandidateQuery {
    pub legacy_id: Option<String>,
    pub email: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CandidateSearchResponse {
    pub active: Vec<Candidate>,
    pub archived: Vec<ArchivedRecord>,
}

/// GET /api/v1/lifecycle/candidates?legacy_id=|email=|status=
///
/// Exactly one filter. Searches the active and archived partitions.
pub async fn handle_find_candidates(
    State(state): State<AppState>,
    Query(query): Query<CandidateQuery>,
) -> Result<Json<CandidateSearchResponse>, AppError> {
    let (field, value) = match (query.legacy_id, query.email, query.status) {
        (Some(legacy_id), None, None) => (CandidateField::LegacyId, legacy_id),
        (None, Some(email), None) => (CandidateField::Email, email),
        (None, None, Some(raw)) => {
            let status: CandidateStatus = raw
                .parse()
                .map_err(|e: UnknownStatus| AppError::Validation(e.to_string()))?;
            (CandidateField::Status, status.as_str().to_string())
        }
        _ => {
            return Err(AppError::Validation(
                "Provide exactly one of legacy_id, email or status".to_string(),
            ))
        }
    };

    let (active, archived) = state.lifecycle.find(field, &value).await?;
    Ok(Json(CandidateSearchResponse { active, archived }))
}

/// GET /api/v1/lifecycle/candidates/:id/eligibility
pub async fn handle_eligibility(
    State(state): State<AppState>,
    Path(candidate_id): Path<String>,
) -> Result<Json<EligibilityResponse>, AppError> {
    let verdict = state
        .lifecycle
        .evaluate(&candidate_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Active candidate {candidate_id} not found")))?;

    Ok(Json(EligibilityResponse {
        candidate_id,
        verdict,
    }))
}

/// POST /api/v1/lifecycle/archive
///
/// Ids not in the active partition are skipped, so `archived_count` may be lower
/// than `requested`.
pub async fn handle_archive(
    State(state): State<AppState>,
    Json(request): Json<CandidateIdsRequest>,
) -> Result<Json<ArchiveResponse>, AppError> {
    let archived_count = state.lifecycle.archive(&request.candidate_ids).await?;
    Ok(Json(ArchiveResponse {
        requested: request.candidate_ids.len(),
        archived_count,
    }))
}

/// POST /api/v1/lifecycle/restore
pub async fn handle_restore(
    State(state): State<AppState>,
    Json(request): Json<CandidateIdsRequest>,
) -> Result<Json<RestoreResponse>, AppError> {
    let restored_count = state.lifecycle.restore(&request.candidate_ids).await?;
    Ok(Json(RestoreResponse {
        requested: request.candidate_ids.len(),
        restored_count,
    }))
}

/// POST /api/v1/lifecycle/sweep
///
/// Runs one archival sweep immediately, outside the periodic schedule.
pub async fn handle_sweep(State(state): State<AppState>) -> Result<Json<SweepReport>, AppError> {
    Ok(Json(run_archival_sweep(&state.lifecycle).await?))
}
