//! The store access contract shared by the queue, dispatcher and executor.

use async_trait::async_trait;
use serde::Serialize;
use tryon_core::job::JobResult;

use crate::error::PersistenceError;
use crate::models::job::{Job, NewJob};
use crate::models::session::Session;

pub mod memory;
pub mod pg;

/// Aggregate counters used by health reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    pub total_jobs: i64,
    pub total_sessions: i64,
    pub pending: i64,
    pub processing: i64,
    pub completed: i64,
    pub failed: i64,
}

/// Durable storage for jobs and sessions.
///
/// Implementations must make [`claim`](Store::claim),
/// [`complete`](Store::complete) and [`fail`](Store::fail) conditional on
/// the job's current status, and [`add_job_to_session`](Store::add_job_to_session)
/// a single atomic upsert.
#[async_trait]
pub trait Store: Send + Sync {
    /// Persist an empty session.
    async fn create_session(&self, id: &str) -> Result<Session, PersistenceError>;

    /// Append `job_id` to a session (creating it when missing) and bump
    /// its `last_activity`.
    async fn add_job_to_session(
        &self,
        session_id: &str,
        job_id: &str,
    ) -> Result<Session, PersistenceError>;

    async fn find_session(&self, id: &str) -> Result<Option<Session>, PersistenceError>;

    /// Record the session linkage and the pending job row together.
    async fn enqueue(&self, job: &NewJob) -> Result<Job, PersistenceError>;

    async fn find_job(&self, id: &str) -> Result<Option<Job>, PersistenceError>;

    /// Jobs of one session, newest `created_at` first.
    async fn list_jobs_by_session(&self, session_id: &str) -> Result<Vec<Job>, PersistenceError>;

    /// Up to `limit` pending jobs, oldest `created_at` first.
    async fn list_pending(&self, limit: usize) -> Result<Vec<Job>, PersistenceError>;

    /// Transition `pending -> processing`. `None` means the claim lost.
    async fn claim(&self, id: &str) -> Result<Option<Job>, PersistenceError>;

    /// Transition `processing -> completed`. `false` if not processing.
    async fn complete(&self, id: &str, result: &JobResult) -> Result<bool, PersistenceError>;

    /// Transition `processing -> failed`. `false` if not processing.
    async fn fail(&self, id: &str, error: &str) -> Result<bool, PersistenceError>;

    async fn stats(&self) -> Result<StoreStats, PersistenceError>;
}
