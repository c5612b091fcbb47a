//! Repository for the `jobs` table.
//!
//! Every status change is a conditional update guarded on the current
//! status, so concurrent writers cannot move a job backwards or claim it
//! twice.

use sqlx::types::Json;
use sqlx::{FromRow, PgExecutor, PgPool};
use tryon_core::job::{JobData, JobResult};
use tryon_core::status::{JobStatus, StatusId};
use tryon_core::types::{JobId, SessionId, Timestamp};

use crate::models::job::{Job, NewJob};

/// Column list for `jobs` queries.
const COLUMNS: &str = "\
    id, session_id, status_id, data, result, error, \
    created_at, started_at, completed_at";

/// Raw `jobs` row; converted into [`Job`] once the status id is decoded.
#[derive(FromRow)]
struct JobRow {
    id: JobId,
    session_id: SessionId,
    status_id: StatusId,
    data: Json<JobData>,
    result: Option<Json<JobResult>>,
    error: Option<String>,
    created_at: Timestamp,
    started_at: Option<Timestamp>,
    completed_at: Option<Timestamp>,
}

impl TryFrom<JobRow> for Job {
    type Error = sqlx::Error;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let status =
            JobStatus::try_from(row.status_id).map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
        Ok(Job {
            id: row.id,
            session_id: row.session_id,
            status,
            data: row.data.0,
            result: row.result.map(|r| r.0),
            error: row.error,
            created_at: row.created_at,
            started_at: row.started_at,
            completed_at: row.completed_at,
        })
    }
}

fn into_jobs(rows: Vec<JobRow>) -> Result<Vec<Job>, sqlx::Error> {
    rows.into_iter().map(Job::try_from).collect()
}

/// Provides persistence operations for jobs.
pub struct JobRepo;

impl JobRepo {
    /// Insert a new pending job.
    ///
    /// Accepts any executor so the insert can share a transaction with the
    /// session linkage.
    pub async fn insert(conn: impl PgExecutor<'_>, input: &NewJob) -> Result<Job, sqlx::Error> {
        let query = format!(
            "INSERT INTO jobs (id, session_id, status_id, data) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, JobRow>(&query)
            .bind(&input.id)
            .bind(&input.session_id)
            .bind(JobStatus::Pending.id())
            .bind(Json(&input.data))
            .fetch_one(conn)
            .await?
            .try_into()
    }

    /// Find a job by its ID.
    pub async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Job>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM jobs WHERE id = $1");
        sqlx::query_as::<_, JobRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await?
            .map(Job::try_from)
            .transpose()
    }

    /// List a session's jobs, newest first.
    pub async fn list_by_session(
        pool: &PgPool,
        session_id: &str,
    ) -> Result<Vec<Job>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM jobs \
             WHERE session_id = $1 \
             ORDER BY created_at DESC, seq DESC"
        );
        let rows = sqlx::query_as::<_, JobRow>(&query)
            .bind(session_id)
            .fetch_all(pool)
            .await?;
        into_jobs(rows)
    }

    /// List up to `limit` pending jobs, oldest first.
    pub async fn list_pending(pool: &PgPool, limit: i64) -> Result<Vec<Job>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM jobs \
             WHERE status_id = $1 \
             ORDER BY created_at ASC, seq ASC \
             LIMIT $2"
        );
        let rows = sqlx::query_as::<_, JobRow>(&query)
            .bind(JobStatus::Pending.id())
            .bind(limit)
            .fetch_all(pool)
            .await?;
        into_jobs(rows)
    }

    /// Move a job from `pending` to `processing` and stamp `started_at`.
    ///
    /// Returns `None` when the job is no longer pending, i.e. another
    /// dispatcher won the claim.
    pub async fn claim(pool: &PgPool, id: &str) -> Result<Option<Job>, sqlx::Error> {
        let query = format!(
            "UPDATE jobs \
             SET status_id = $2, started_at = GREATEST(NOW(), created_at) \
             WHERE id = $1 AND status_id = $3 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, JobRow>(&query)
            .bind(id)
            .bind(JobStatus::Processing.id())
            .bind(JobStatus::Pending.id())
            .fetch_optional(pool)
            .await?
            .map(Job::try_from)
            .transpose()
    }

    /// Mark a processing job as completed with its result payload.
    ///
    /// Returns `false` if the job was not in `processing`.
    pub async fn complete(
        pool: &PgPool,
        id: &str,
        result: &JobResult,
    ) -> Result<bool, sqlx::Error> {
        let outcome = sqlx::query(
            "UPDATE jobs \
             SET status_id = $2, result = $3, completed_at = GREATEST(NOW(), started_at) \
             WHERE id = $1 AND status_id = $4",
        )
        .bind(id)
        .bind(JobStatus::Completed.id())
        .bind(Json(result))
        .bind(JobStatus::Processing.id())
        .execute(pool)
        .await?;
        Ok(outcome.rows_affected() > 0)
    }

    /// Mark a processing job as failed with an error message.
    ///
    /// No automatic retry is performed; a failed job is final.
    pub async fn fail(pool: &PgPool, id: &str, error: &str) -> Result<bool, sqlx::Error> {
        let outcome = sqlx::query(
            "UPDATE jobs \
             SET status_id = $2, error = $3, completed_at = GREATEST(NOW(), started_at) \
             WHERE id = $1 AND status_id = $4",
        )
        .bind(id)
        .bind(JobStatus::Failed.id())
        .bind(error)
        .bind(JobStatus::Processing.id())
        .execute(pool)
        .await?;
        Ok(outcome.rows_affected() > 0)
    }

    /// Count jobs grouped by status id.
    pub async fn count_by_status(pool: &PgPool) -> Result<Vec<(StatusId, i64)>, sqlx::Error> {
        sqlx::query_as::<_, (StatusId, i64)>(
            "SELECT status_id, COUNT(*) FROM jobs GROUP BY status_id",
        )
        .fetch_all(pool)
        .await
    }
}
