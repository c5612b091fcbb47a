//! Session registry: groups jobs under a session id.

use std::sync::Arc;

use tryon_core::types::mint_id;
use tryon_db::models::job::Job;
use tryon_db::models::session::Session;
use tryon_db::{PersistenceError, Store};

/// Thin domain layer over the session half of the [`Store`].
#[derive(Clone)]
pub struct SessionRegistry {
    store: Arc<dyn Store>,
}

impl SessionRegistry {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Allocate and persist an empty session with a minted id.
    pub async fn create_session(&self) -> Result<Session, PersistenceError> {
        let session = self.store.create_session(&mint_id()).await?;
        tracing::debug!(session_id = %session.id, "Session created");
        Ok(session)
    }

    /// Append `job_id` to `session_id`, creating the session if needed.
    /// Single atomic upsert in the store.
    pub async fn add_job_to_session(
        &self,
        session_id: &str,
        job_id: &str,
    ) -> Result<Session, PersistenceError> {
        self.store.add_job_to_session(session_id, job_id).await
    }

    pub async fn get_session(&self, session_id: &str) -> Result<Option<Session>, PersistenceError> {
        self.store.find_session(session_id).await
    }

    /// Jobs whose `session_id` matches, newest first.
    pub async fn get_jobs_by_session(&self, session_id: &str) -> Result<Vec<Job>, PersistenceError> {
        self.store.list_jobs_by_session(session_id).await
    }
}

#[cfg(test)]
mod tests {
    use tryon_db::MemoryStore;

    use super::*;

    #[tokio::test]
    async fn created_session_starts_empty() {
        let registry = SessionRegistry::new(Arc::new(MemoryStore::new()));

        let session = registry.create_session().await.unwrap();

        assert!(session.jobs.is_empty());
        assert_eq!(session.created_at, session.last_activity);
        let found = registry.get_session(&session.id).await.unwrap();
        assert_eq!(found, Some(session));
    }

    #[tokio::test]
    async fn adding_jobs_appends_in_order_and_touches_activity() {
        let registry = SessionRegistry::new(Arc::new(MemoryStore::new()));

        let first = registry.add_job_to_session("s1", "j1").await.unwrap();
        assert_eq!(first.jobs, vec!["j1".to_string()]);

        let second = registry.add_job_to_session("s1", "j2").await.unwrap();
        assert_eq!(second.jobs, vec!["j1".to_string(), "j2".to_string()]);
        assert_eq!(second.created_at, first.created_at);
        assert!(second.last_activity >= first.last_activity);
    }

    #[tokio::test]
    async fn unknown_session_is_none() {
        let registry = SessionRegistry::new(Arc::new(MemoryStore::new()));
        assert!(registry.get_session("missing").await.unwrap().is_none());
        assert!(registry.get_jobs_by_session("missing").await.unwrap().is_empty());
    }
}
