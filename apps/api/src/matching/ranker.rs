//! Match Ranker — scores a job against many candidates (or a candidate against many
//! jobs), sorts, and keeps the top N.
//!
//! Scoring runs on tokio tasks capped by a semaphore so the oracle never sees more
//! than `concurrency` calls at once. Order is fixed after collection, so completion
//! order does not matter. A failing item (store error, panic, timeout) is logged and
//! left out; the batch itself only fails if the anchor record cannot be read.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::matching::scorer::{insufficient_profile, MatchScorer};
use crate::models::candidate::{Candidate, CandidateField};
use crate::models::job::Job;
use crate::models::matching::MatchResult;
use crate::store::{RecordStore, StoreError};

pub const DEFAULT_TOP_N: usize = 10;

/// Why one item dropped out of a ranking batch.
#[derive(Debug, Error)]
pub enum ScoringFailure {
    #[error("store lookup failed: {0}")]
    Store(#[from] StoreError),

    #[error("job {0} is unknown or closed")]
    JobUnavailable(String),

    #[error("scoring exceeded {0:?}")]
    TimedOut(Duration),

    #[error("scoring task panicked")]
    Panicked,

    #[error("worker pool shut down")]
    PoolClosed,
}

/// Per-call knobs for a ranking batch.
#[derive(Debug, Clone)]
pub struct RankOptions {
    pub top_n: usize,
    /// Stop waiting after this long and return what has completed.
    pub deadline: Option<Duration>,
    pub cancel: CancellationToken,
}

impl Default for RankOptions {
    fn default() -> Self {
        Self {
            top_n: DEFAULT_TOP_N,
            deadline: None,
            cancel: CancellationToken::new(),
        }
    }
}

impl RankOptions {
    pub fn top(top_n: usize) -> Self {
        Self {
            top_n,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankAxis {
    /// Ranking candidates for one job; ties break on candidate id.
    Candidates,
    /// Ranking jobs for one candidate; ties break on job id.
    Jobs,
}

type ScoreFuture = Pin<Box<dyn Future<Output = Result<MatchResult, ScoringFailure>> + Send>>;

/// Aborts the wrapped task when dropped, so abandoned work does not keep
/// calling the oracle after its batch has moved on.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

pub struct MatchRanker {
    store: Arc<dyn RecordStore>,
    scorer: Arc<MatchScorer>,
    concurrency: usize,
    store_timeout: Duration,
    item_timeout: Duration,
}

impl MatchRanker {
    pub fn new(
        store: Arc<dyn RecordStore>,
        scorer: Arc<MatchScorer>,
        concurrency: usize,
        store_timeout: Duration,
        item_timeout: Duration,
    ) -> Self {
        Self {
            store,
            scorer,
            concurrency: concurrency.max(1),
            store_timeout,
            item_timeout,
        }
    }

    pub async fn rank_candidates_for_job(
        &self,
        job_id: &str,
        candidate_ids: &[String],
        options: RankOptions,
    ) -> Result<Vec<MatchResult>, StoreError> {
        let Some(job) = self.with_timeout(self.store.get_job(job_id)).await? else {
            warn!("Ranking requested for unknown job {job_id}; returning no results");
            return Ok(vec![]);
        };
        let job = Arc::new(job);

        let tasks = dedup(candidate_ids)
            .into_iter()
            .map(|candidate_id| {
                let store = Arc::clone(&self.store);
                let scorer = Arc::clone(&self.scorer);
                let job = Arc::clone(&job);
                let store_timeout = self.store_timeout;
                let label = candidate_id.clone();
                let fut: ScoreFuture = Box::pin(async move {
                    let candidate = tokio::time::timeout(
                        store_timeout,
                        load_candidate(store.as_ref(), &candidate_id),
                    )
                    .await
                    .map_err(|_| StoreError::Timeout)??;
                    Ok(match candidate {
                        Some(candidate) => scorer.score(&candidate, &job).await,
                        None => insufficient_profile(&candidate_id, &job, Utc::now()),
                    })
                });
                (label, fut)
            })
            .collect();

        let mut results = self.collect(tasks, &options).await;
        order_results(&mut results, RankAxis::Candidates);
        keep_first_per_id(&mut results, RankAxis::Candidates);
        results.truncate(options.top_n);
        info!(
            "Ranked {} candidates for job {} (returning top {})",
            candidate_ids.len(),
            job_id,
            results.len()
        );
        Ok(results)
    }

    /// Ranks jobs for one candidate. With `job_ids == None`, every open job is ranked.
    pub async fn rank_jobs_for_candidate(
        &self,
        candidate_id: &str,
        job_ids: Option<&[String]>,
        options: RankOptions,
    ) -> Result<Vec<MatchResult>, StoreError> {
        let candidate = self
            .with_timeout(load_candidate(self.store.as_ref(), candidate_id))
            .await?
            .map(Arc::new);
        if candidate.is_none() {
            warn!("Candidate {candidate_id} not found; jobs will be scored as insufficient");
        }

        let jobs: Vec<JobSource> = match job_ids {
            Some(ids) => dedup(ids).into_iter().map(JobSource::Lookup).collect(),
            None => self
                .with_timeout(self.store.list_jobs())
                .await?
                .into_iter()
                .filter(Job::is_open)
                .map(JobSource::Loaded)
                .collect(),
        };

        let tasks = jobs
            .into_iter()
            .map(|source| {
                let store = Arc::clone(&self.store);
                let scorer = Arc::clone(&self.scorer);
                let candidate = candidate.clone();
                let candidate_id = candidate_id.to_string();
                let store_timeout = self.store_timeout;
                let label = source.id().to_string();
                let fut: ScoreFuture = Box::pin(async move {
                    let job = match source {
                        JobSource::Loaded(job) => job,
                        JobSource::Lookup(id) => {
                            let found = tokio::time::timeout(store_timeout, store.get_job(&id))
                                .await
                                .map_err(|_| StoreError::Timeout)??;
                            found
                                .filter(Job::is_open)
                                .ok_or(ScoringFailure::JobUnavailable(id))?
                        }
                    };
                    Ok(match candidate {
                        Some(candidate) => scorer.score(&candidate, &job).await,
                        None => insufficient_profile(&candidate_id, &job, Utc::now()),
                    })
                });
                (label, fut)
            })
            .collect();

        let mut results = self.collect(tasks, &options).await;
        order_results(&mut results, RankAxis::Jobs);
        keep_first_per_id(&mut results, RankAxis::Jobs);
        results.truncate(options.top_n);
        info!(
            "Ranked jobs for candidate {} (returning top {})",
            candidate_id,
            results.len()
        );
        Ok(results)
    }

    async fn with_timeout<T>(
        &self,
        fut: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        tokio::time::timeout(self.store_timeout, fut)
            .await
            .map_err(|_| StoreError::Timeout)?
    }

    /// Runs every task on the bounded pool and gathers the successes.
    ///
    /// Cancellation or the deadline stops the wait; tasks that already finished
    /// are still collected, the rest are aborted.
    async fn collect(
        &self,
        tasks: Vec<(String, ScoreFuture)>,
        options: &RankOptions,
    ) -> Vec<MatchResult> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let item_timeout = self.item_timeout;
        let mut set = JoinSet::new();

        for (label, fut) in tasks {
            let semaphore = Arc::clone(&semaphore);
            set.spawn(async move {
                let outcome = match semaphore.acquire_owned().await {
                    Ok(_permit) => {
                        // Scoring runs in its own task so a panic surfaces as a JoinError
                        // we can attribute to this item.
                        let mut worker = AbortOnDrop(tokio::spawn(fut));
                        match tokio::time::timeout(item_timeout, &mut worker.0).await {
                            Ok(Ok(result)) => result,
                            Ok(Err(_)) => Err(ScoringFailure::Panicked),
                            Err(_) => Err(ScoringFailure::TimedOut(item_timeout)),
                        }
                    }
                    Err(_) => Err(ScoringFailure::PoolClosed),
                };
                (label, outcome)
            });
        }

        let deadline = options.deadline.map(|d| Instant::now() + d);
        let expired = async move {
            match deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(expired);

        let mut results = Vec::new();
        loop {
            tokio::select! {
                biased;
                _ = options.cancel.cancelled() => {
                    warn!("Ranking cancelled with {} tasks outstanding", set.len());
                    break;
                }
                _ = &mut expired => {
                    warn!("Ranking deadline reached with {} tasks outstanding", set.len());
                    break;
                }
                next = set.join_next() => match next {
                    Some(joined) => absorb(joined, &mut results),
                    None => return results,
                },
            }
        }

        // Keep whatever finished before the stop; the rest come back as cancelled.
        set.abort_all();
        while let Some(joined) = set.join_next().await {
            absorb(joined, &mut results);
        }
        results
    }
}

enum JobSource {
    Loaded(Job),
    Lookup(String),
}

impl JobSource {
    fn id(&self) -> &str {
        match self {
            JobSource::Loaded(job) => &job.id,
            JobSource::Lookup(id) => id,
        }
    }
}

fn absorb(
    joined: Result<(String, Result<MatchResult, ScoringFailure>), tokio::task::JoinError>,
    results: &mut Vec<MatchResult>,
) {
    match joined {
        Ok((_, Ok(result))) => results.push(result),
        Ok((label, Err(failure))) => warn!("Excluding {label} from ranking: {failure}"),
        Err(e) if e.is_cancelled() => {}
        Err(e) => error!("Ranking worker failed: {e}"),
    }
}

/// Looks a candidate up by id, then by legacy id for records imported from the
/// previous tracker.
pub async fn load_candidate(
    store: &dyn RecordStore,
    id: &str,
) -> Result<Option<Candidate>, StoreError> {
    if let Some(candidate) = store.get_candidate(id).await? {
        return Ok(Some(candidate));
    }
    Ok(store
        .find_candidates(CandidateField::LegacyId, id)
        .await?
        .into_iter()
        .next())
}

fn dedup(ids: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.iter()
        .filter(|id| seen.insert(id.as_str()))
        .cloned()
        .collect()
}

/// Descending by score; ties broken by the id along `axis`, ascending.
pub fn order_results(results: &mut [MatchResult], axis: RankAxis) {
    results.sort_by(|a, b| {
        b.overall_score
            .cmp(&a.overall_score)
            .then_with(|| tie_break(a, b, axis))
    });
}

/// Drops later results for an id already seen along `axis`. A primary id and a
/// legacy alias in the same request resolve to one record.
fn keep_first_per_id(results: &mut Vec<MatchResult>, axis: RankAxis) {
    let mut seen = HashSet::new();
    results.retain(|r| {
        let id = match axis {
            RankAxis::Candidates => &r.candidate_id,
            RankAxis::Jobs => &r.job_id,
        };
        seen.insert(id.clone())
    });
}

fn tie_break(a: &MatchResult, b: &MatchResult, axis: RankAxis) -> Ordering {
    match axis {
        RankAxis::Candidates => a
            .candidate_id
            .cmp(&b.candidate_id)
            .then_with(|| a.job_id.cmp(&b.job_id)),
        RankAxis::Jobs => a
            .job_id
            .cmp(&b.job_id)
            .then_with(|| a.candidate_id.cmp(&b.candidate_id)),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
