//! Record Store — the persistence seam for candidates, archived records and jobs.
//!
//! Components receive an `Arc<dyn RecordStore>`; nothing holds process-wide state.
//! Two backends ship: `PgRecordStore` (sqlx/PostgreSQL) and `InMemoryRecordStore`.
//!
//! Writes go through `commit`, which applies a `WriteBatch` atomically: every op
//! lands or none does. Backends may refuse batches above their own op limit.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::candidate::{ArchivedRecord, Candidate, CandidateField, UnknownStatus};
use crate::models::job::Job;

pub mod memory;
pub mod postgres;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("write conflict: {0}")]
    Conflict(String),

    #[error("batch of {size} operations exceeds the store limit of {limit}")]
    BatchTooLarge { size: usize, limit: usize },

    #[error("store call timed out")]
    Timeout,

    #[error("corrupt record: {0}")]
    Corrupt(#[from] UnknownStatus),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// A single write inside an atomic batch.
#[derive(Debug, Clone)]
pub enum StoreOp {
    PutActive(Candidate),
    DeleteActive(String),
    PutArchived(ArchivedRecord),
    DeleteArchived(String),
}

/// Ordered list of writes committed as one unit.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    ops: Vec<StoreOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, op: StoreOp) {
        self.ops.push(op);
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn ops(&self) -> &[StoreOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<StoreOp> {
        self.ops
    }
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn get_candidate(&self, id: &str) -> Result<Option<Candidate>, StoreError>;

    async fn get_archived(&self, id: &str) -> Result<Option<ArchivedRecord>, StoreError>;

    async fn find_candidates(
        &self,
        field: CandidateField,
        value: &str,
    ) -> Result<Vec<Candidate>, StoreError>;

    async fn find_archived(
        &self,
        field: CandidateField,
        value: &str,
    ) -> Result<Vec<ArchivedRecord>, StoreError>;

    async fn list_candidates(&self) -> Result<Vec<Candidate>, StoreError>;

    async fn get_job(&self, id: &str) -> Result<Option<Job>, StoreError>;

    async fn list_jobs(&self) -> Result<Vec<Job>, StoreError>;

    /// Applies every op in `batch` atomically.
    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError>;

    /// Short backend label for logs.
    fn backend(&self) -> &'static str;
}
