//! Repository for the `sessions` table.

use sqlx::{PgExecutor, PgPool};

use crate::models::session::Session;

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, jobs, created_at, last_activity";

/// Provides persistence operations for sessions.
pub struct SessionRepo;

impl SessionRepo {
    /// Insert an empty session, returning the created row.
    pub async fn create(pool: &PgPool, id: &str) -> Result<Session, sqlx::Error> {
        let query = format!("INSERT INTO sessions (id) VALUES ($1) RETURNING {COLUMNS}");
        sqlx::query_as::<_, Session>(&query)
            .bind(id)
            .fetch_one(pool)
            .await
    }

    /// Append a job to a session, creating the session if it is missing.
    ///
    /// A single `INSERT .. ON CONFLICT` statement, so concurrent enqueues
    /// into the same session never lose an append.
    pub async fn upsert_job(
        conn: impl PgExecutor<'_>,
        session_id: &str,
        job_id: &str,
    ) -> Result<Session, sqlx::Error> {
        let query = format!(
            "INSERT INTO sessions (id, jobs) VALUES ($1, ARRAY[$2::TEXT]) \
             ON CONFLICT (id) DO UPDATE \
             SET jobs = array_append(sessions.jobs, $2::TEXT), last_activity = NOW() \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Session>(&query)
            .bind(session_id)
            .bind(job_id)
            .fetch_one(conn)
            .await
    }

    /// Find a session by its ID.
    pub async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Session>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM sessions WHERE id = $1");
        sqlx::query_as::<_, Session>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Total number of sessions.
    pub async fn count(pool: &PgPool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM sessions")
            .fetch_one(pool)
            .await
    }
}
