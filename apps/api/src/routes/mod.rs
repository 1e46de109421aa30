pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::lifecycle::handlers as lifecycle;
use crate::matching::handlers as matching;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Matching API
        .route("/api/v1/matching/score", post(matching::handle_score))
        .route(
            "/api/v1/matching/jobs/:job_id/candidates",
            post(matching::handle_rank_candidates),
        )
        .route(
            "/api/v1/matching/candidates/:candidate_id/jobs",
            post(matching::handle_rank_jobs),
        )
        // Lifecycle API
        .route(
            "/api/v1/lifecycle/candidates",
            get(lifecycle::handle_find_candidates),
        )
        .route(
            "/api/v1/lifecycle/candidates/:id/eligibility",
            get(lifecycle::handle_eligibility),
        )
        .route("/api/v1/lifecycle/archive", post(lifecycle::handle_archive))
        .route("/api/v1/lifecycle/restore", post(lifecycle::handle_restore))
        .route("/api/v1/lifecycle/sweep", post(lifecycle::handle_sweep))
        .with_state(state)
}
