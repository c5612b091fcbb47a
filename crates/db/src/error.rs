//! Store error taxonomy.

/// A store operation could not be carried out.
///
/// "Not found" is never an error: lookups return `Option`.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    /// The store could not be reached (pool exhausted, connection lost).
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A record with the same primary key already exists.
    #[error("Duplicate {entity} id: {id}")]
    Duplicate { entity: &'static str, id: String },

    /// The database rejected or failed the statement.
    #[error("Database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for PersistenceError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                PersistenceError::Unavailable(err.to_string())
            }
            other => PersistenceError::Database(other),
        }
    }
}

impl PersistenceError {
    /// Map a unique-key violation to [`PersistenceError::Duplicate`].
    pub(crate) fn from_insert(err: sqlx::Error, entity: &'static str, id: &str) -> Self {
        let unique_violation = matches!(
            &err,
            sqlx::Error::Database(db) if db.is_unique_violation()
        );
        if unique_violation {
            PersistenceError::Duplicate {
                entity,
                id: id.to_string(),
            }
        } else {
            err.into()
        }
    }
}
