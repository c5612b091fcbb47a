//! Session model.

use serde::Serialize;
use sqlx::FromRow;
use tryon_core::types::{JobId, SessionId, Timestamp};

/// A row from the `sessions` table.
///
/// `jobs` lists member job ids in submission order.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: SessionId,
    pub jobs: Vec<JobId>,
    pub created_at: Timestamp,
    pub last_activity: Timestamp,
}
