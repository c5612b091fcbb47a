//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is the push side of job status reporting: pollers read the
//! store, subscribers get a [`JobEvent`] the moment a job is claimed or
//! reaches a terminal state. It is designed to be shared via
//! `Arc<EventBus>`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tryon_core::status::JobStatus;
use tryon_core::types::{JobId, SessionId};

// ---------------------------------------------------------------------------
// JobEvent
// ---------------------------------------------------------------------------

/// What happened to the job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobEventKind {
    /// The dispatcher moved the job to `processing`.
    Claimed,
    /// The job reached `completed`.
    Completed,
    /// The job reached `failed`.
    Failed,
}

impl JobEventKind {
    /// The job status this event reports.
    pub fn status(self) -> JobStatus {
        match self {
            JobEventKind::Claimed => JobStatus::Processing,
            JobEventKind::Completed => JobStatus::Completed,
            JobEventKind::Failed => JobStatus::Failed,
        }
    }
}

/// A job lifecycle event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobEvent {
    pub kind: JobEventKind,
    pub job_id: JobId,
    pub session_id: SessionId,
    /// Failure message, only on [`JobEventKind::Failed`].
    pub error: Option<String>,
    /// Whether the terminal state was durably recorded. `false` means the
    /// store write failed and a poller may still see the old status.
    pub persisted: bool,
    pub timestamp: DateTime<Utc>,
}

impl JobEvent {
    fn new(kind: JobEventKind, job_id: &str, session_id: &str) -> Self {
        Self {
            kind,
            job_id: job_id.to_string(),
            session_id: session_id.to_string(),
            error: None,
            persisted: true,
            timestamp: Utc::now(),
        }
    }

    pub fn claimed(job_id: &str, session_id: &str) -> Self {
        Self::new(JobEventKind::Claimed, job_id, session_id)
    }

    pub fn completed(job_id: &str, session_id: &str) -> Self {
        Self::new(JobEventKind::Completed, job_id, session_id)
    }

    pub fn failed(job_id: &str, session_id: &str, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::new(JobEventKind::Failed, job_id, session_id)
        }
    }

    /// Mark whether the store write behind this event succeeded.
    pub fn with_persisted(mut self, persisted: bool) -> Self {
        self.persisted = persisted;
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.kind.status().is_terminal()
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Events buffered per subscriber before the oldest are overwritten.
const DEFAULT_CAPACITY: usize = 1024;

/// Fan-out of [`JobEvent`]s to every live subscriber.
///
/// ```rust
/// use tryon_events::bus::{EventBus, JobEvent};
///
/// let bus = EventBus::default();
/// let mut rx = bus.subscribe();
/// bus.publish(JobEvent::completed("job-1", "session-1"));
/// assert!(rx.try_recv().is_ok());
/// ```
pub struct EventBus {
    sender: broadcast::Sender<JobEvent>,
}

impl EventBus {
    /// A subscriber that falls more than `capacity` events behind gets
    /// `RecvError::Lagged` and must re-read the store.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Deliver `event` to current subscribers. Without subscribers the
    /// event is dropped; the store remains the source of truth.
    pub fn publish(&self, event: JobEvent) {
        if self.sender.send(event).is_err() {
            tracing::trace!("Job event published with no subscribers");
        }
    }

    /// Receive every event published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
