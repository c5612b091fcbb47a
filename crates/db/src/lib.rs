//! Persistence for jobs and sessions.
//!
//! The [`Store`] trait is the access contract the queue depends on.
//! [`PgStore`] implements it on Postgres through the sqlx repositories in
//! [`repositories`]; [`MemoryStore`] implements the same semantics in
//! process.

use sqlx::postgres::PgPoolOptions;

pub mod error;
pub mod models;
pub mod repositories;
pub mod store;

pub use error::PersistenceError;
pub use store::memory::MemoryStore;
pub use store::pg::PgStore;
pub use store::{Store, StoreStats};

pub type DbPool = sqlx::PgPool;

/// Create a connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .connect(database_url)
        .await
}

/// Verify the database answers a trivial query.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Apply all pending migrations from `db/migrations`.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("../../db/migrations").run(pool).await
}
