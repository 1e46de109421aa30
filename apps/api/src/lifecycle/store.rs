//! Lifecycle Store — reversible moves between the active and archived partitions.
//!
//! Each moved id costs two writes (put into the target partition, delete from the
//! source). Requests are split into chunks of `max_batch_size / 2` ids; each chunk
//! is one atomic `WriteBatch`. Atomicity holds per chunk: if chunk N fails, chunks
//! before it stay committed and the error reports how many records already moved.
//! Retrying is safe because moved ids are no longer in the source partition.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::lifecycle::events::{EventPublisher, LifecycleEvent, LifecycleTransition};
use crate::lifecycle::policy::{ArchivalPolicyEngine, ArchivalVerdict, Clock};
use crate::matching::ranker::load_candidate;
use crate::models::candidate::{ArchivedRecord, Candidate, CandidateField};
use crate::store::{RecordStore, StoreError, StoreOp, WriteBatch};

/// Writes per moved record: one put, one delete.
const OPS_PER_MOVE: usize = 2;

/// Reason recorded when a candidate is archived on demand without any rule firing.
pub const MANUAL_ARCHIVE_REASON: &str = "Archived on request";

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("store failure after {committed} records were moved: {source}")]
    Store {
        committed: usize,
        #[source]
        source: StoreError,
    },

    #[error("max batch size {0} cannot fit a single move")]
    BatchSizeTooSmall(usize),
}

impl LifecycleError {
    fn at(committed: usize) -> impl FnOnce(StoreError) -> LifecycleError {
        move |source| LifecycleError::Store { committed, source }
    }
}

pub struct LifecycleStore {
    store: Arc<dyn RecordStore>,
    policy: ArchivalPolicyEngine,
    clock: Arc<dyn Clock>,
    events: EventPublisher,
    max_batch_size: usize,
    store_timeout: Duration,
}

impl LifecycleStore {
    pub fn new(
        store: Arc<dyn RecordStore>,
        policy: ArchivalPolicyEngine,
        clock: Arc<dyn Clock>,
        events: EventPublisher,
        max_batch_size: usize,
        store_timeout: Duration,
    ) -> Self {
        Self {
            store,
            policy,
            clock,
            events,
            max_batch_size,
            store_timeout,
        }
    }

    pub fn policy(&self) -> &ArchivalPolicyEngine {
        &self.policy
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Every candidate currently in the active partition.
    pub async fn active_candidates(&self) -> Result<Vec<Candidate>, StoreError> {
        self.timed(self.store.list_candidates()).await
    }

    /// Records matching `field == value` in each partition.
    pub async fn find(
        &self,
        field: CandidateField,
        value: &str,
    ) -> Result<(Vec<Candidate>, Vec<ArchivedRecord>), StoreError> {
        let active = self
            .timed(self.store.find_candidates(field, value))
            .await?;
        let archived = self.timed(self.store.find_archived(field, value)).await?;
        Ok((active, archived))
    }

    /// Runs the archival rules against one active candidate. `None` if not active.
    pub async fn evaluate(&self, candidate_id: &str) -> Result<Option<ArchivalVerdict>, StoreError> {
        let candidate = self
            .timed(load_candidate(self.store.as_ref(), candidate_id))
            .await?;
        let now = self.clock.now();
        Ok(candidate.map(|c| self.policy.evaluate(&c, now)))
    }

    /// Moves active candidates into the archive. Returns how many moved.
    pub async fn archive(&self, candidate_ids: &[String]) -> Result<usize, LifecycleError> {
        let now = self.clock.now();
        let mut moved = 0;
        for chunk in unique(candidate_ids).chunks(self.ids_per_chunk()?) {
            let events = self
                .archive_chunk(chunk, now)
                .await
                .map_err(LifecycleError::at(moved))?;
            moved += events.len();
            events.into_iter().for_each(|e| self.events.publish(e));
        }
        info!(
            "Archived {} of {} requested candidates",
            moved,
            candidate_ids.len()
        );
        Ok(moved)
    }

    /// Moves archived candidates back to the active partition with their
    /// pre-archival status. Returns how many moved.
    pub async fn restore(&self, candidate_ids: &[String]) -> Result<usize, LifecycleError> {
        let now = self.clock.now();
        let mut moved = 0;
        for chunk in unique(candidate_ids).chunks(self.ids_per_chunk()?) {
            let events = self
                .restore_chunk(chunk, now)
                .await
                .map_err(LifecycleError::at(moved))?;
            moved += events.len();
            events.into_iter().for_each(|e| self.events.publish(e));
        }
        info!(
            "Restored {} of {} requested candidates",
            moved,
            candidate_ids.len()
        );
        Ok(moved)
    }

    async fn archive_chunk(
        &self,
        ids: &[String],
        now: DateTime<Utc>,
    ) -> Result<Vec<LifecycleEvent>, StoreError> {
        let mut batch = WriteBatch::new();
        let mut events = Vec::new();
        let mut staged = HashSet::new();

        for id in ids {
            let Some(candidate) = self
                .timed(load_candidate(self.store.as_ref(), id))
                .await?
            else {
                warn!("Skipping archive of {id}: not in the active partition");
                continue;
            };
            // A primary id and a legacy alias may name the same record.
            if !staged.insert(candidate.id.clone()) {
                continue;
            }

            let verdict = self.policy.evaluate(&candidate, now);
            let reason = if verdict.eligible {
                verdict.reason
            } else {
                MANUAL_ARCHIVE_REASON.to_string()
            };
            let record = ArchivedRecord::from_active(candidate, reason, now);

            events.push(LifecycleEvent {
                event_id: Uuid::new_v4(),
                transition: LifecycleTransition::Archived,
                candidate_id: record.id().to_string(),
                status: record.candidate.status,
                referrer_id: record.candidate.referrer_id.clone(),
                reason: Some(record.archival_reason.clone()),
                occurred_at: now,
            });
            batch.push(StoreOp::DeleteActive(record.id().to_string()));
            batch.push(StoreOp::PutArchived(record));
        }

        self.commit(batch).await?;
        Ok(events)
    }

    async fn restore_chunk(
        &self,
        ids: &[String],
        now: DateTime<Utc>,
    ) -> Result<Vec<LifecycleEvent>, StoreError> {
        let mut batch = WriteBatch::new();
        let mut events = Vec::new();
        let mut staged = HashSet::new();

        for id in ids {
            let Some(record) = self.load_archived(id).await? else {
                warn!("Skipping restore of {id}: not in the archive partition");
                continue;
            };
            if !staged.insert(record.id().to_string()) {
                continue;
            }

            let candidate = record.into_active(now);
            events.push(LifecycleEvent {
                event_id: Uuid::new_v4(),
                transition: LifecycleTransition::Restored,
                candidate_id: candidate.id.clone(),
                status: candidate.status,
                referrer_id: candidate.referrer_id.clone(),
                reason: None,
                occurred_at: now,
            });
            batch.push(StoreOp::DeleteArchived(candidate.id.clone()));
            batch.push(StoreOp::PutActive(candidate));
        }

        self.commit(batch).await?;
        Ok(events)
    }

    async fn load_archived(&self, id: &str) -> Result<Option<ArchivedRecord>, StoreError> {
        if let Some(record) = self.timed(self.store.get_archived(id)).await? {
            return Ok(Some(record));
        }
        Ok(self
            .timed(self.store.find_archived(CandidateField::LegacyId, id))
            .await?
            .into_iter()
            .next())
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        if batch.is_empty() {
            return Ok(());
        }
        let size = batch.len();
        self.timed(self.store.commit(batch)).await.map_err(|e| {
            error!(
                "Atomic batch of {} operations on {} store failed: {e}",
                size,
                self.store.backend()
            );
            e
        })
    }

    fn ids_per_chunk(&self) -> Result<usize, LifecycleError> {
        match self.max_batch_size / OPS_PER_MOVE {
            0 => Err(LifecycleError::BatchSizeTooSmall(self.max_batch_size)),
            n => Ok(n),
        }
    }

    async fn timed<T>(
        &self,
        fut: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        tokio::time::timeout(self.store_timeout, fut)
            .await
            .map_err(|_| StoreError::Timeout)?
    }
}

fn unique(ids: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.iter()
        .filter(|id| seen.insert(id.as_str()))
        .cloned()
        .collect()
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
