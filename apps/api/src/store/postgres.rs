use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::debug;

use super::{RecordStore, StoreError, StoreOp, WriteBatch};
use crate::models::candidate::{
    ArchivedCandidateRow, ArchivedRecord, Candidate, CandidateField, CandidateRow,
};
use crate::models::job::{Job, JobRow};

const CANDIDATE_COLUMNS: &str = "id, legacy_id, name, email, skills, status, last_activity, \
     applied_date, rejected_date, stage_date, referrer_id";

const ARCHIVED_COLUMNS: &str = "id, legacy_id, name, email, skills, status, last_activity, \
     applied_date, rejected_date, stage_date, referrer_id, \
     original_status, archived_date, archival_reason";

/// PostgreSQL-backed store. Each `WriteBatch` runs in one transaction.
///
/// Upserts are last-writer-wins: two concurrent batches touching the same id
/// both commit, the later one's rows survive.
#[derive(Clone)]
pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn get_candidate(&self, id: &str) -> Result<Option<Candidate>, StoreError> {
        let row = sqlx::query_as::<_, CandidateRow>(&format!(
            "SELECT {CANDIDATE_COLUMNS} FROM candidates WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Candidate::try_from).transpose()?)
    }

    async fn get_archived(&self, id: &str) -> Result<Option<ArchivedRecord>, StoreError> {
        let row = sqlx::query_as::<_, ArchivedCandidateRow>(&format!(
            "SELECT {ARCHIVED_COLUMNS} FROM archived_candidates WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(ArchivedRecord::try_from).transpose()?)
    }

    async fn find_candidates(
        &self,
        field: CandidateField,
        value: &str,
    ) -> Result<Vec<Candidate>, StoreError> {
        // Column names come from a closed enum, never from user input.
        let rows = sqlx::query_as::<_, CandidateRow>(&format!(
            "SELECT {CANDIDATE_COLUMNS} FROM candidates WHERE {} = $1 ORDER BY id",
            field.column()
        ))
        .bind(value)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(Candidate::try_from)
            .collect::<Result<_, _>>()?)
    }

    async fn find_archived(
        &self,
        field: CandidateField,
        value: &str,
    ) -> Result<Vec<ArchivedRecord>, StoreError> {
        let rows = sqlx::query_as::<_, ArchivedCandidateRow>(&format!(
            "SELECT {ARCHIVED_COLUMNS} FROM archived_candidates WHERE {} = $1 ORDER BY id",
            field.column()
        ))
        .bind(value)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(ArchivedRecord::try_from)
            .collect::<Result<_, _>>()?)
    }

    async fn list_candidates(&self) -> Result<Vec<Candidate>, StoreError> {
        let rows = sqlx::query_as::<_, CandidateRow>(&format!(
            "SELECT {CANDIDATE_COLUMNS} FROM candidates ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(Candidate::try_from)
            .collect::<Result<_, _>>()?)
    }

    async fn get_job(&self, id: &str) -> Result<Option<Job>, StoreError> {
        let row = sqlx::query_as::<_, JobRow>(
            "SELECT id, title, required_skills, status FROM jobs WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Job::from))
    }

    async fn list_jobs(&self) -> Result<Vec<Job>, StoreError> {
        let rows = sqlx::query_as::<_, JobRow>(
            "SELECT id, title, required_skills, status FROM jobs ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Job::from).collect())
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        let size = batch.len();
        let mut tx = self.pool.begin().await?;
        for op in batch.ops() {
            apply_op(&mut tx, op).await?;
        }
        tx.commit().await?;
        debug!("Committed batch of {size} operations");
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }
}

async fn apply_op(tx: &mut Transaction<'_, Postgres>, op: &StoreOp) -> Result<(), StoreError> {
    match op {
        StoreOp::PutActive(c) => {
            sqlx::query(
                r#"
                INSERT INTO candidates
                    (id, legacy_id, name, email, skills, status, last_activity,
                     applied_date, rejected_date, stage_date, referrer_id)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                ON CONFLICT (id) DO UPDATE SET
                    legacy_id = EXCLUDED.legacy_id,
                    name = EXCLUDED.name,
                    email = EXCLUDED.email,
                    skills = EXCLUDED.skills,
                    status = EXCLUDED.status,
                    last_activity = EXCLUDED.last_activity,
                    applied_date = EXCLUDED.applied_date,
                    rejected_date = EXCLUDED.rejected_date,
                    stage_date = EXCLUDED.stage_date,
                    referrer_id = EXCLUDED.referrer_id
                "#,
            )
            .bind(&c.id)
            .bind(&c.legacy_id)
            .bind(&c.name)
            .bind(&c.email)
            .bind(&c.skills)
            .bind(c.status.as_str())
            .bind(c.last_activity)
            .bind(c.applied_date)
            .bind(c.rejected_date)
            .bind(c.stage_date)
            .bind(&c.referrer_id)
            .execute(&mut **tx)
            .await?;
        }
        StoreOp::DeleteActive(id) => {
            sqlx::query("DELETE FROM candidates WHERE id = $1")
                .bind(id)
                .execute(&mut **tx)
                .await?;
        }
        StoreOp::PutArchived(r) => {
            let c = &r.candidate;
            sqlx::query(
                r#"
                INSERT INTO archived_candidates
                    (id, legacy_id, name, email, skills, status, last_activity,
                     applied_date, rejected_date, stage_date, referrer_id,
                     original_status, archived_date, archival_reason)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
                ON CONFLICT (id) DO UPDATE SET
                    legacy_id = EXCLUDED.legacy_id,
                    name = EXCLUDED.name,
                    email = EXCLUDED.email,
                    skills = EXCLUDED.skills,
                    status = EXCLUDED.status,
                    last_activity = EXCLUDED.last_activity,
                    applied_date = EXCLUDED.applied_date,
                    rejected_date = EXCLUDED.rejected_date,
                    stage_date = EXCLUDED.stage_date,
                    referrer_id = EXCLUDED.referrer_id,
                    original_status = EXCLUDED.original_status,
                    archived_date = EXCLUDED.archived_date,
                    archival_reason = EXCLUDED.archival_reason
                "#,
            )
            .bind(&c.id)
            .bind(&c.legacy_id)
            .bind(&c.name)
            .bind(&c.email)
            .bind(&c.skills)
            .bind(c.status.as_str())
            .bind(c.last_activity)
            .bind(c.applied_date)
            .bind(c.rejected_date)
            .bind(c.stage_date)
            .bind(&c.referrer_id)
            .bind(r.original_status.as_str())
            .bind(r.archived_date)
            .bind(&r.archival_reason)
            .execute(&mut **tx)
            .await?;
        }
        StoreOp::DeleteArchived(id) => {
            sqlx::query("DELETE FROM archived_candidates WHERE id = $1")
                .bind(id)
                .execute(&mut **tx)
                .await?;
        }
    }
    Ok(())
}
