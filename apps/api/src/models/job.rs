use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Open,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    #[serde(default)]
    pub title: String,
    /// Empty means the job has no skill constraint.
    #[serde(default)]
    pub required_skills: Vec<String>,
    pub status: JobStatus,
}

impl Job {
    pub fn is_open(&self) -> bool {
        self.status == JobStatus::Open
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct JobRow {
    pub id: String,
    pub title: String,
    pub required_skills: Vec<String>,
    pub status: String,
}

impl From<JobRow> for Job {
    fn from(row: JobRow) -> Self {
        // Anything that is not explicitly open is treated as closed.
        let status = if row.status.eq_ignore_ascii_case("open") {
            JobStatus::Open
        } else {
            JobStatus::Closed
        };
        Job {
            id: row.id,
            title: row.title,
            required_skills: row.required_skills,
            status,
        }
    }
}
