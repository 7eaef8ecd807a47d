//! Storage failures.
//!
//! A [`StorageError`] means the system could not determine an answer. It is
//! never an authentication verdict: callers must not treat it as "session
//! not found".

use std::time::Duration;

/// PostgreSQL SQLSTATE for `unique_violation`.
const PG_UNIQUE_VIOLATION: &str = "23505";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A unique constraint rejected the write (e.g. duplicate email).
    #[error("Unique constraint violated: {constraint}")]
    UniqueViolation { constraint: String },

    /// The store did not answer within the request-scoped deadline.
    #[error("Storage operation timed out after {0:?}")]
    Timeout(Duration),

    /// Any other database failure (connectivity, pool exhaustion, SQL error).
    #[error("Database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.code().as_deref() == Some(PG_UNIQUE_VIOLATION) {
                return StorageError::UniqueViolation {
                    constraint: db_err.constraint().unwrap_or("unknown").to_string(),
                };
            }
        }
        StorageError::Database(err)
    }
}
