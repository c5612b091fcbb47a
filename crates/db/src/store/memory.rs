//! In-process [`Store`] with the same conditional-update semantics as
//! [`PgStore`](crate::PgStore).
//!
//! State lives behind one mutex that is never held across an `.await`, so
//! every trait method is atomic with respect to every other.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use tryon_core::job::JobResult;
use tryon_core::status::JobStatus;
use tryon_core::types::{JobId, SessionId, Timestamp};

use crate::error::PersistenceError;
use crate::models::job::{Job, NewJob};
use crate::models::session::Session;
use crate::store::{Store, StoreStats};

#[derive(Default)]
struct Inner {
    /// Jobs in insertion order; ties on `created_at` keep this order.
    jobs: Vec<Job>,
    index: HashMap<JobId, usize>,
    sessions: HashMap<SessionId, Session>,
}

impl Inner {
    fn job_mut(&mut self, id: &str) -> Option<&mut Job> {
        let pos = *self.index.get(id)?;
        self.jobs.get_mut(pos)
    }

    fn upsert_session(&mut self, session_id: &str, job_id: &str, now: Timestamp) -> Session {
        let session = self
            .sessions
            .entry(session_id.to_string())
            .and_modify(|s| {
                s.jobs.push(job_id.to_string());
                s.last_activity = now.max(s.last_activity);
            })
            .or_insert_with(|| Session {
                id: session_id.to_string(),
                jobs: vec![job_id.to_string()],
                created_at: now,
                last_activity: now,
            });
        session.clone()
    }

    /// Move a job to the terminal status `next` if that is a legal step.
    fn finish(&mut self, id: &str, next: JobStatus, apply: impl FnOnce(&mut Job)) -> bool {
        let Some(job) = self.job_mut(id) else {
            return false;
        };
        if !job.status.can_transition_to(next) {
            return false;
        }
        let now = Utc::now();
        job.status = next;
        job.completed_at = Some(job.started_at.map_or(now, |started| now.max(started)));
        apply(job);
        true
    }
}

/// Mutex-guarded in-memory store.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_session(&self, id: &str) -> Result<Session, PersistenceError> {
        let mut inner = self.lock();
        if inner.sessions.contains_key(id) {
            return Err(PersistenceError::Duplicate {
                entity: "session",
                id: id.to_string(),
            });
        }
        let now = Utc::now();
        let session = Session {
            id: id.to_string(),
            jobs: Vec::new(),
            created_at: now,
            last_activity: now,
        };
        inner.sessions.insert(id.to_string(), session.clone());
        Ok(session)
    }

    async fn add_job_to_session(
        &self,
        session_id: &str,
        job_id: &str,
    ) -> Result<Session, PersistenceError> {
        Ok(self.lock().upsert_session(session_id, job_id, Utc::now()))
    }

    async fn find_session(&self, id: &str) -> Result<Option<Session>, PersistenceError> {
        Ok(self.lock().sessions.get(id).cloned())
    }

    async fn enqueue(&self, new: &NewJob) -> Result<Job, PersistenceError> {
        let mut inner = self.lock();
        if inner.index.contains_key(&new.id) {
            return Err(PersistenceError::Duplicate {
                entity: "job",
                id: new.id.clone(),
            });
        }
        let now = Utc::now();
        inner.upsert_session(&new.session_id, &new.id, now);

        let job = Job {
            id: new.id.clone(),
            session_id: new.session_id.clone(),
            status: JobStatus::Pending,
            data: new.data.clone(),
            result: None,
            error: None,
            created_at: now,
            started_at: None,
            completed_at: None,
        };
        let pos = inner.jobs.len();
        inner.jobs.push(job.clone());
        inner.index.insert(job.id.clone(), pos);
        Ok(job)
    }

    async fn find_job(&self, id: &str) -> Result<Option<Job>, PersistenceError> {
        let inner = self.lock();
        Ok(inner.index.get(id).map(|&pos| inner.jobs[pos].clone()))
    }

    async fn list_jobs_by_session(&self, session_id: &str) -> Result<Vec<Job>, PersistenceError> {
        let inner = self.lock();
        let mut jobs: Vec<Job> = inner
            .jobs
            .iter()
            .rev()
            .filter(|j| j.session_id == session_id)
            .cloned()
            .collect();
        // Stable sort over reversed insertion order: newest first, ties
        // broken by most recent insertion.
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(jobs)
    }

    async fn list_pending(&self, limit: usize) -> Result<Vec<Job>, PersistenceError> {
        let inner = self.lock();
        let mut pending: Vec<Job> = inner
            .jobs
            .iter()
            .filter(|j| j.status == JobStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        pending.truncate(limit);
        Ok(pending)
    }

    async fn claim(&self, id: &str) -> Result<Option<Job>, PersistenceError> {
        let mut inner = self.lock();
        let Some(job) = inner.job_mut(id) else {
            return Ok(None);
        };
        if !job.status.can_transition_to(JobStatus::Processing) {
            return Ok(None);
        }
        job.status = JobStatus::Processing;
        job.started_at = Some(Utc::now().max(job.created_at));
        Ok(Some(job.clone()))
    }

    async fn complete(&self, id: &str, result: &JobResult) -> Result<bool, PersistenceError> {
        Ok(self.lock().finish(id, JobStatus::Completed, |job| {
            job.result = Some(result.clone());
        }))
    }

    async fn fail(&self, id: &str, error: &str) -> Result<bool, PersistenceError> {
        Ok(self.lock().finish(id, JobStatus::Failed, |job| {
            job.error = Some(error.to_string());
        }))
    }

    async fn stats(&self) -> Result<StoreStats, PersistenceError> {
        let inner = self.lock();
        let mut stats = StoreStats {
            total_jobs: inner.jobs.len() as i64,
            total_sessions: inner.sessions.len() as i64,
            ..Default::default()
        };
        for job in &inner.jobs {
            match job.status {
                JobStatus::Pending => stats.pending += 1,
                JobStatus::Processing => stats.processing += 1,
                JobStatus::Completed => stats.completed += 1,
                JobStatus::Failed => stats.failed += 1,
            }
        }
        Ok(stats)
    }
}
