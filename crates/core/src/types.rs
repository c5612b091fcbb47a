/// Jobs are keyed by opaque string ids (caller supplied or minted).
pub type JobId = String;

/// Sessions are keyed by opaque string ids.
pub type SessionId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Mint a fresh opaque identifier for a job or session.
pub fn mint_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}
