//! Job entity model and DTOs.

use serde::Serialize;
use tryon_core::job::{JobData, JobResult};
use tryon_core::status::JobStatus;
use tryon_core::types::{JobId, SessionId, Timestamp};

/// A job record, as returned by status queries.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: JobId,
    pub session_id: SessionId,
    pub status: JobStatus,
    pub data: JobData,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<JobResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: Timestamp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<Timestamp>,
}

impl Job {
    /// Check the lifecycle invariants that tie timestamps and payloads to
    /// the status:
    ///
    /// - `started_at` is set iff the job left `pending`.
    /// - `completed_at` is set iff the job is terminal.
    /// - `created_at <= started_at <= completed_at`.
    /// - `result` only on `completed`, `error` only on `failed`.
    pub fn is_consistent(&self) -> bool {
        let started_ok = self.started_at.is_some() == self.status.has_started();
        let completed_ok = self.completed_at.is_some() == self.status.is_terminal();
        let ordered = match (self.started_at, self.completed_at) {
            (Some(started), Some(completed)) => {
                self.created_at <= started && started <= completed
            }
            (Some(started), None) => self.created_at <= started,
            (None, None) => true,
            (None, Some(_)) => false,
        };
        let result_ok = self.result.is_none() || self.status == JobStatus::Completed;
        let error_ok = self.error.is_none() || self.status == JobStatus::Failed;
        started_ok && completed_ok && ordered && result_ok && error_ok
    }
}

/// DTO for persisting a freshly submitted job.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub id: JobId,
    pub session_id: SessionId,
    pub data: JobData,
}
