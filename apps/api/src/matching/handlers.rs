//! Axum route handlers for the Matching API.

use std::future::Future;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::matching::ranker::{load_candidate, RankOptions};
use crate::matching::scorer::insufficient_profile;
use crate::models::matching::MatchResult;
use crate::state::AppState;
use crate::store::StoreError;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ScoreRequest {
    pub candidate_id: String,
    pub job_id: String,
}

#[derive(Debug, Deserialize)]
pub struct RankCandidatesRequest {
    pub candidate_ids: Vec<String>,
    pub top_n: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RankJobsRequest {
    /// Omitted: every open job is ranked.
    pub job_ids: Option<Vec<String>>,
    pub top_n: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct RankResponse {
    pub results: Vec<MatchResult>,
    pub scorer: &'static str,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/matching/score
///
/// Scores one candidate against one job. An unknown candidate yields an
/// "Insufficient Data" result rather than an error.
pub async fn handle_score(
    State(state): State<AppState>,
    Json(request): Json<ScoreRequest>,
) -> Result<Json<MatchResult>, AppError> {
    let timeout = state.config.store_timeout;
    let job = bounded(timeout, state.store.get_job(&request.job_id))
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Job {} not found", request.job_id)))?;

    let candidate = bounded(
        timeout,
        load_candidate(state.store.as_ref(), &request.candidate_id),
    )
    .await?;
    let result = match candidate {
        Some(candidate) => state.scorer.score(&candidate, &job).await,
        None => insufficient_profile(&request.candidate_id, &job, Utc::now()),
    };
    Ok(Json(result))
}

/// POST /api/v1/matching/jobs/:job_id/candidates
pub async fn handle_rank_candidates(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
    Json(request): Json<RankCandidatesRequest>,
) -> Result<Json<RankResponse>, AppError> {
    let options = rank_options(&state, request.top_n)?;
    let results = state
        .ranker
        .rank_candidates_for_job(&job_id, &request.candidate_ids, options)
        .await?;

    Ok(Json(RankResponse {
        results,
        scorer: state.scorer.backend(),
    }))
}

/// POST /api/v1/matching/candidates/:candidate_id/jobs
pub async fn handle_rank_jobs(
    State(state): State<AppState>,
    Path(candidate_id): Path<String>,
    Json(request): Json<RankJobsRequest>,
) -> Result<Json<RankResponse>, AppError> {
    let options = rank_options(&state, request.top_n)?;
    let results = state
        .ranker
        .rank_jobs_for_candidate(&candidate_id, request.job_ids.as_deref(), options)
        .await?;

    Ok(Json(RankResponse {
        results,
        scorer: state.scorer.backend(),
    }))
}

async fn bounded<T>(
    timeout: Duration,
    fut: impl Future<Output = Result<T, StoreError>>,
) -> Result<T, StoreError> {
    tokio::time::timeout(timeout, fut)
        .await
        .map_err(|_| StoreError::Timeout)?
}

fn rank_options(state: &AppState, top_n: Option<usize>) -> Result<RankOptions, AppError> {
    match top_n.unwrap_or(state.config.default_top_n) {
        0 => Err(AppError::Validation("top_n must be at least 1".to_string())),
        n => Ok(RankOptions::top(n)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;

    use crate::config::Config;
    use crate::lifecycle::events::EventPublisher;
    use crate::lifecycle::policy::{ArchivalPolicyEngine, SystemClock};
    use crate::lifecycle::store::LifecycleStore;
    use crate::matching::ranker::MatchRanker;
    use crate::matching::scorer::MatchScorer;
    use crate::models::candidate::{ArchivedRecord, Candidate, CandidateField};
    use crate::models::job::Job;
    use crate::store::{RecordStore, WriteBatch};

    /// Never answers.
    struct StalledStore;

    #[async_trait]
    impl RecordStore for StalledStore {
        async fn get_candidate(&self, _id: &str) -> Result<Option<Candidate>, StoreError> {
            std::future::pending().await
        }

        async fn get_archived(&self, _id: &str) -> Result<Option<ArchivedRecord>, StoreError> {
            std::future::pending().await
        }

        async fn find_candidates(
            &self,
            _field: CandidateField,
            _value: &str,
        ) -> Result<Vec<Candidate>, StoreError> {
            std::future::pending().await
        }

        async fn find_archived(
            &self,
            _field: CandidateField,
            _value: &str,
        ) -> Result<Vec<ArchivedRecord>, StoreError> {
            std::future::pending().await
        }

        async fn list_candidates(&self) -> Result<Vec<Candidate>, StoreError> {
            std::future::pending().await
        }

        async fn get_job(&self, _id: &str) -> Result<Option<Job>, StoreError> {
            std::future::pending().await
        }

        async fn list_jobs(&self) -> Result<Vec<Job>, StoreError> {
            std::future::pending().await
        }

        async fn commit(&self, _batch: WriteBatch) -> Result<(), StoreError> {
            std::future::pending().await
        }

        fn backend(&self) -> &'static str {
            "stalled"
        }
    }

    fn stalled_state() -> AppState {
        let store: Arc<dyn RecordStore> = Arc::new(StalledStore);
        let config = Config::default();
        let scorer = Arc::new(MatchScorer::heuristic_only());
        let ranker = Arc::new(MatchRanker::new(
            store.clone(),
            scorer.clone(),
            config.rank_concurrency,
            config.store_timeout,
            config.store_timeout * 2,
        ));
        let lifecycle = Arc::new(LifecycleStore::new(
            store.clone(),
            ArchivalPolicyEngine::default(),
            Arc::new(SystemClock),
            EventPublisher::disabled(),
            config.max_batch_size,
            config.store_timeout,
        ));
        AppState {
            store,
            scorer,
            ranker,
            lifecycle,
            config,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_score_times_out_on_stalled_store() {
        let outcome = handle_score(
            State(stalled_state()),
            Json(ScoreRequest {
                candidate_id: "c1".to_string(),
                job_id: "j1".to_string(),
            }),
        )
        .await;
        assert!(matches!(outcome, Err(AppError::Store(StoreError::Timeout))));
    }
}
