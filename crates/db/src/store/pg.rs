//! Postgres-backed [`Store`].

use async_trait::async_trait;
use tryon_core::job::JobResult;
use tryon_core::status::JobStatus;

use crate::error::PersistenceError;
use crate::models::job::{Job, NewJob};
use crate::models::session::Session;
use crate::repositories::{JobRepo, SessionRepo};
use crate::store::{Store, StoreStats};
use crate::DbPool;

/// [`Store`] implementation over a Postgres pool.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn create_session(&self, id: &str) -> Result<Session, PersistenceError> {
        SessionRepo::create(&self.pool, id)
            .await
            .map_err(|e| PersistenceError::from_insert(e, "session", id))
    }

    async fn add_job_to_session(
        &self,
        session_id: &str,
        job_id: &str,
    ) -> Result<Session, PersistenceError> {
        Ok(SessionRepo::upsert_job(&self.pool, session_id, job_id).await?)
    }

    async fn find_session(&self, id: &str) -> Result<Option<Session>, PersistenceError> {
        Ok(SessionRepo::find_by_id(&self.pool, id).await?)
    }

    async fn enqueue(&self, job: &NewJob) -> Result<Job, PersistenceError> {
        let mut tx = self.pool.begin().await?;
        SessionRepo::upsert_job(&mut *tx, &job.session_id, &job.id).await?;
        let created = JobRepo::insert(&mut *tx, job)
            .await
            .map_err(|e| PersistenceError::from_insert(e, "job", &job.id))?;
        tx.commit().await?;
        Ok(created)
    }

    async fn find_job(&self, id: &str) -> Result<Option<Job>, PersistenceError> {
        Ok(JobRepo::find_by_id(&self.pool, id).await?)
    }

    async fn list_jobs_by_session(&self, session_id: &str) -> Result<Vec<Job>, PersistenceError> {
        Ok(JobRepo::list_by_session(&self.pool, session_id).await?)
    }

    async fn list_pending(&self, limit: usize) -> Result<Vec<Job>, PersistenceError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        Ok(JobRepo::list_pending(&self.pool, limit).await?)
    }

    async fn claim(&self, id: &str) -> Result<Option<Job>, PersistenceError> {
        Ok(JobRepo::claim(&self.pool, id).await?)
    }

    async fn complete(&self, id: &str, result: &JobResult) -> Result<bool, PersistenceError> {
        Ok(JobRepo::complete(&self.pool, id, result).await?)
    }

    async fn fail(&self, id: &str, error: &str) -> Result<bool, PersistenceError> {
        Ok(JobRepo::fail(&self.pool, id, error).await?)
    }

    async fn stats(&self) -> Result<StoreStats, PersistenceError> {
        let mut stats = StoreStats {
            total_sessions: SessionRepo::count(&self.pool).await?,
            ..Default::default()
        };
        for (status_id, count) in JobRepo::count_by_status(&self.pool).await? {
            stats.total_jobs += count;
            match JobStatus::try_from(status_id) {
                Ok(JobStatus::Pending) => stats.pending = count,
                Ok(JobStatus::Processing) => stats.processing = count,
                Ok(JobStatus::Completed) => stats.completed = count,
                Ok(JobStatus::Failed) => stats.failed = count,
                Err(e) => tracing::warn!(status_id, error = %e, "Unknown status id in jobs table"),
            }
        }
        Ok(stats)
    }
}
