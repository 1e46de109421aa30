use std::sync::Arc;

use crate::config::Config;
use crate::lifecycle::store::LifecycleStore;
use crate::matching::ranker::MatchRanker;
use crate::matching::scorer::MatchScorer;
use crate::store::RecordStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Pluggable record store. Postgres when `DATABASE_URL` is set, in-memory otherwise.
    pub store: Arc<dyn RecordStore>,
    pub scorer: Arc<MatchScorer>,
    pub ranker: Arc<MatchRanker>,
    pub lifecycle: Arc<LifecycleStore>,
    pub config: Config,
}
