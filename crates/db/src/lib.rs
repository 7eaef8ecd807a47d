//! Persistence layer: row models, PostgreSQL repositories, and the storage
//! capabilities consumed by the API's session store and handlers.
//!
//! - [`repositories`] -- zero-sized repos with `async fn(&PgPool, ..)` queries.
//! - [`backend`] -- `SessionBackend` / `UserBackend` traits plus the
//!   PostgreSQL implementation.
//! - [`memory`] -- an in-process implementation of the same traits.

use sqlx::postgres::PgPoolOptions;

pub mod backend;
pub mod error;
pub mod memory;
pub mod models;
pub mod repositories;

pub use backend::{PgBackend, SessionBackend, UserBackend};
pub use error::StorageError;
pub use memory::MemoryBackend;

pub type DbPool = sqlx::PgPool;

/// Create a connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .connect(database_url)
        .await
}

/// Run a trivial query to confirm the database is reachable.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Apply all pending migrations from `crates/db/migrations`.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
