//! The job queue facade: admission, queries and notifications.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tryon_core::job::{SubmitJob, SubmitResponse};
use tryon_core::types::{mint_id, JobId};
use tryon_db::models::job::{Job, NewJob};
use tryon_db::models::session::Session;
use tryon_db::{PersistenceError, Store, StoreStats};
use tryon_events::{EventBus, JobEvent};
use tryon_pipeline::pipeline::DEFAULT_STEP_TIMEOUT;
use tryon_pipeline::{GenerationBackend, TryOnPipeline};

use crate::dispatcher::{Dispatcher, DispatcherConfig};
use crate::executor::Executor;
use crate::sessions::SessionRegistry;

#[derive(Debug, Clone, Copy)]
pub struct QueueConfig {
    pub max_concurrent: usize,
    pub poll_interval: Duration,
    /// Hard ceiling for one pipeline step.
    pub step_timeout: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        let dispatcher = DispatcherConfig::default();
        Self {
            max_concurrent: dispatcher.max_concurrent,
            poll_interval: dispatcher.poll_interval,
            step_timeout: DEFAULT_STEP_TIMEOUT,
        }
    }
}

/// A session together with its jobs, newest first.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionOverview {
    pub session: Session,
    pub jobs: Vec<Job>,
    pub job_count: usize,
}

/// Queue health counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStats {
    #[serde(flatten)]
    pub store: StoreStats,
    /// Jobs this instance is executing right now.
    pub in_flight: usize,
    pub max_concurrent: usize,
}

/// Entry point for clients of the queue.
///
/// Wires the [`SessionRegistry`], [`Dispatcher`] and [`Executor`] around
/// one shared [`Store`] and [`EventBus`].
pub struct JobQueue {
    store: Arc<dyn Store>,
    sessions: SessionRegistry,
    dispatcher: Arc<Dispatcher>,
    events: Arc<EventBus>,
}

impl JobQueue {
    pub fn new(
        store: Arc<dyn Store>,
        backend: Arc<dyn GenerationBackend>,
        config: QueueConfig,
    ) -> Self {
        let events = Arc::new(EventBus::default());
        let pipeline = TryOnPipeline::new(backend).with_step_timeout(config.step_timeout);
        let executor = Arc::new(Executor::new(
            Arc::clone(&store),
            pipeline,
            Arc::clone(&events),
        ));
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::clone(&store),
            executor,
            Arc::clone(&events),
            DispatcherConfig {
                max_concurrent: config.max_concurrent,
                poll_interval: config.poll_interval,
            },
        ));

        Self {
            sessions: SessionRegistry::new(Arc::clone(&store)),
            store,
            dispatcher,
            events,
        }
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Spawn the dispatch loop. It stops when `cancel` fires.
    pub fn start(&self, cancel: CancellationToken) -> JoinHandle<()> {
        let dispatcher = Arc::clone(&self.dispatcher);
        tokio::spawn(async move { dispatcher.run(cancel).await })
    }

    /// Durably record a job under `job_id` and wake the dispatcher.
    ///
    /// A session is minted when the request names none. The job exists
    /// only if this returns `Ok`.
    pub async fn submit(
        &self,
        job_id: JobId,
        request: SubmitJob,
    ) -> Result<SubmitResponse, PersistenceError> {
        let (session_id, data) = request.into_parts();
        let session_id = session_id.unwrap_or_else(mint_id);

        let job = self
            .store
            .enqueue(&NewJob {
                id: job_id,
                session_id,
                data,
            })
            .await?;
        tracing::info!(job_id = %job.id, session_id = %job.session_id, "Job submitted");

        self.dispatcher.wake();
        Ok(SubmitResponse {
            job_id: job.id,
            session_id: job.session_id,
        })
    }

    /// [`submit`](Self::submit) with a minted job id.
    pub async fn enqueue(&self, request: SubmitJob) -> Result<SubmitResponse, PersistenceError> {
        self.submit(mint_id(), request).await
    }

    pub async fn get(&self, job_id: &str) -> Result<Option<Job>, PersistenceError> {
        self.store.find_job(job_id).await
    }

    pub async fn get_jobs_by_session(&self, session_id: &str) -> Result<Vec<Job>, PersistenceError> {
        self.sessions.get_jobs_by_session(session_id).await
    }

    pub async fn create_session(&self) -> Result<Session, PersistenceError> {
        self.sessions.create_session().await
    }

    pub async fn get_session(&self, session_id: &str) -> Result<Option<Session>, PersistenceError> {
        self.sessions.get_session(session_id).await
    }

    pub async fn session_overview(
        &self,
        session_id: &str,
    ) -> Result<Option<SessionOverview>, PersistenceError> {
        let Some(session) = self.sessions.get_session(session_id).await? else {
            return Ok(None);
        };
        let jobs = self.sessions.get_jobs_by_session(session_id).await?;
        Ok(Some(SessionOverview {
            job_count: jobs.len(),
            session,
            jobs,
        }))
    }

    pub async fn stats(&self) -> Result<QueueStats, PersistenceError> {
        Ok(QueueStats {
            store: self.store.stats().await?,
            in_flight: self.dispatcher.in_flight_count(),
            max_concurrent: self.dispatcher.max_concurrent(),
        })
    }

    /// Receive every job event published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.events.subscribe()
    }

    /// Wait until the job is terminal or `timeout` elapses, then return its
    /// stored state. `None` means the job does not exist.
    pub async fn wait_for_terminal(
        &self,
        job_id: &str,
        timeout: Duration,
    ) -> Result<Option<Job>, PersistenceError> {
        // Subscribe before reading so a transition between the two is not missed.
        let mut rx = self.events.subscribe();
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            match self.store.find_job(job_id).await? {
                Some(job) if !job.status.is_terminal() => {
                    let woke = tokio::time::timeout_at(deadline, next_terminal(&mut rx, job_id));
                    if woke.await.is_err() {
                        return self.store.find_job(job_id).await;
                    }
                }
                other => return Ok(other),
            }
        }
    }

    /// Stop launching jobs and wait for running ones, up to `timeout`.
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        self.dispatcher.drain(timeout).await
    }
}

/// Resolve on the next terminal event for `job_id`, or when events were
/// lost and the store must be re-read.
async fn next_terminal(rx: &mut broadcast::Receiver<JobEvent>, job_id: &str) {
    loop {
        match rx.recv().await {
            Ok(event) if event.job_id == job_id && event.is_terminal() => return,
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(_)) => return,
            Err(broadcast::error::RecvError::Closed) => std::future::pending::<()>().await,
        }
    }
}
