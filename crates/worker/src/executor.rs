//! Per-job execution: run the pipeline, record the terminal state.

use std::sync::Arc;

use tryon_core::job::{JobKind, JobResult};
use tryon_core::status::JobStatus;
use tryon_db::models::job::Job;
use tryon_db::{PersistenceError, Store};
use tryon_events::{EventBus, JobEvent};
use tryon_pipeline::TryOnPipeline;

/// Runs one claimed job to `completed` or `failed`.
///
/// Step failures never escape [`execute`](Executor::execute): they become
/// the job's `error`. A failed terminal write is logged and surfaced on
/// the published event (`persisted = false`), never retried.
pub struct Executor {
    store: Arc<dyn Store>,
    pipeline: TryOnPipeline,
    events: Arc<EventBus>,
}

impl Executor {
    pub fn new(store: Arc<dyn Store>, pipeline: TryOnPipeline, events: Arc<EventBus>) -> Self {
        Self {
            store,
            pipeline,
            events,
        }
    }

    /// Execute a job the dispatcher has moved to `processing`.
    ///
    /// Returns the terminal status the job was driven to.
    pub async fn execute(&self, job: &Job) -> JobStatus {
        match self.run(job).await {
            Ok(result) => {
                let write = self.store.complete(&job.id, &result).await;
                let persisted = self.check_write(job, JobStatus::Completed, write);
                tracing::info!(
                    job_id = %job.id,
                    partial = result.is_partial(),
                    persisted,
                    "Job completed",
                );
                self.events.publish(
                    JobEvent::completed(&job.id, &job.session_id).with_persisted(persisted),
                );
                JobStatus::Completed
            }
            Err(message) => {
                let write = self.store.fail(&job.id, &message).await;
                let persisted = self.check_write(job, JobStatus::Failed, write);
                tracing::warn!(job_id = %job.id, error = %message, persisted, "Job failed");
                self.events.publish(
                    JobEvent::failed(&job.id, &job.session_id, message).with_persisted(persisted),
                );
                JobStatus::Failed
            }
        }
    }

    /// Validate the payload and dispatch on its kind.
    async fn run(&self, job: &Job) -> Result<JobResult, String> {
        let kind = job.data.validate().map_err(|e| e.to_string())?;
        match kind {
            JobKind::VirtualTryOn => self
                .pipeline
                .run(&job.id, &job.data)
                .await
                .map_err(|e| e.to_string()),
        }
    }

    /// Log a terminal write that did not land. Returns whether it landed.
    fn check_write(
        &self,
        job: &Job,
        target: JobStatus,
        write: Result<bool, PersistenceError>,
    ) -> bool {
        match write {
            Ok(true) => true,
            Ok(false) => {
                tracing::error!(
                    job_id = %job.id,
                    target = %target,
                    "Terminal write skipped: job was no longer processing",
                );
                false
            }
            Err(e) => {
                tracing::error!(
                    job_id = %job.id,
                    target = %target,
                    error = %e,
                    "Failed to persist terminal job state",
                );
                false
            }
        }
    }
}
