use std::collections::BTreeMap;
#[cfg(test)]
use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{RecordStore, StoreError, StoreOp, WriteBatch};
use crate::models::candidate::{ArchivedRecord, Candidate, CandidateField};
use crate::models::job::Job;

#[derive(Default)]
struct Partitions {
    active: BTreeMap<String, Candidate>,
    archived: BTreeMap<String, ArchivedRecord>,
    jobs: BTreeMap<String, Job>,
}

/// Process-local store. Used when no `DATABASE_URL` is configured and in tests.
///
/// All partitions sit behind one mutex, so a batch is applied under a single
/// lock acquisition and readers never observe half of it.
#[derive(Default)]
pub struct InMemoryRecordStore {
    inner: Mutex<Partitions>,
    batch_limit: Option<usize>,
    #[cfg(test)]
    failing_reads: Mutex<HashSet<String>>,
    #[cfg(test)]
    failing_commits: Mutex<Vec<bool>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects batches with more than `limit` operations, mimicking hosted stores.
    pub fn with_batch_limit(limit: usize) -> Self {
        Self {
            batch_limit: Some(limit),
            ..Self::default()
        }
    }

    pub fn insert_candidate(&self, candidate: Candidate) {
        self.lock().active.insert(candidate.id.clone(), candidate);
    }

    pub fn insert_job(&self, job: Job) {
        self.lock().jobs.insert(job.id.clone(), job);
    }

    pub fn active_count(&self) -> usize {
        self.lock().active.len()
    }

    pub fn archived_count(&self) -> usize {
        self.lock().archived.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Partitions> {
        // A poisoned lock only means another thread panicked mid-read; the maps are
        // never left half-written because batches are staged before being applied.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    #[cfg(test)]
    pub fn fail_reads_for(&self, id: &str) {
        self.failing_reads.lock().unwrap().insert(id.to_string());
    }

    /// Scripts the outcome of upcoming commits: `true` fails, `false` succeeds.
    #[cfg(test)]
    pub fn script_commits(&self, outcomes: Vec<bool>) {
        *self.failing_commits.lock().unwrap() = outcomes;
    }

    #[cfg(test)]
    fn check_read(&self, id: &str) -> Result<(), StoreError> {
        if self.failing_reads.lock().unwrap().contains(id) {
            return Err(StoreError::Unavailable(format!("read of {id} failed")));
        }
        Ok(())
    }

    #[cfg(not(test))]
    fn check_read(&self, _id: &str) -> Result<(), StoreError> {
        Ok(())
    }

    #[cfg(test)]
    fn check_commit(&self) -> Result<(), StoreError> {
        let mut script = self.failing_commits.lock().unwrap();
        if script.is_empty() {
            return Ok(());
        }
        if script.remove(0) {
            return Err(StoreError::Conflict("scripted commit failure".to_string()));
        }
        Ok(())
    }

    #[cfg(not(test))]
    fn check_commit(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn get_candidate(&self, id: &str) -> Result<Option<Candidate>, StoreError> {
        self.check_read(id)?;
        Ok(self.lock().active.get(id).cloned())
    }

    async fn get_archived(&self, id: &str) -> Result<Option<ArchivedRecord>, StoreError> {
        self.check_read(id)?;
        Ok(self.lock().archived.get(id).cloned())
    }

    async fn find_candidates(
        &self,
        field: CandidateField,
        value: &str,
    ) -> Result<Vec<Candidate>, StoreError> {
        Ok(self
            .lock()
            .active
            .values()
            .filter(|c| field.value_of(c) == Some(value))
            .cloned()
            .collect())
    }

    async fn find_archived(
        &self,
        field: CandidateField,
        value: &str,
    ) -> Result<Vec<ArchivedRecord>, StoreError> {
        Ok(self
            .lock()
            .archived
            .values()
            .filter(|r| field.value_of(&r.candidate) == Some(value))
            .cloned()
            .collect())
    }

    async fn list_candidates(&self) -> Result<Vec<Candidate>, StoreError> {
        Ok(self.lock().active.values().cloned().collect())
    }

    async fn get_job(&self, id: &str) -> Result<Option<Job>, StoreError> {
        self.check_read(id)?;
        Ok(self.lock().jobs.get(id).cloned())
    }

    async fn list_jobs(&self) -> Result<Vec<Job>, StoreError> {
        Ok(self.lock().jobs.values().cloned().collect())
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        if let Some(limit) = self.batch_limit {
            if batch.len() > limit {
                return Err(StoreError::BatchTooLarge {
                    size: batch.len(),
                    limit,
                });
            }
        }
        self.check_commit()?;

        let mut partitions = self.lock();
        for op in batch.into_ops() {
            match op {
                StoreOp::PutActive(candidate) => {
                    partitions.active.insert(candidate.id.clone(), candidate);
                }
                StoreOp::DeleteActive(id) => {
                    partitions.active.remove(&id);
                }
                StoreOp::PutArchived(record) => {
                    partitions
                        .archived
                        .insert(record.candidate.id.clone(), record);
                }
                StoreOp::DeleteArchived(id) => {
                    partitions.archived.remove(&id);
                }
            }
        }
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
