//! Repository for the `sessions` table.
//!
//! Validity is enforced in every query (`is_active AND expires_at > NOW()`)
//! rather than by deleting rows on read; stale rows are removed only by
//! [`SessionRepo::delete_expired_or_inactive`]. Single-row updates rely on
//! PostgreSQL row locking for atomicity between concurrent requests.

use capacity_core::types::DbId;
use chrono::Duration;
use sqlx::PgPool;

use crate::models::session::{CreateSession, Session, SessionIdentityRow};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, user_id, token, ip_address, user_agent, \
                       created_at, updated_at, expires_at, is_active";

/// Provides CRUD operations for sessions.
pub struct SessionRepo;

impl SessionRepo {
    /// Insert a new session, returning the created row.
    pub async fn insert(pool: &PgPool, input: &CreateSession) -> Result<Session, sqlx::Error> {
        let query = format!(
            "INSERT INTO sessions (user_id, token, expires_at, ip_address, user_agent)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Session>(&query)
            .bind(input.user_id)
            .bind(&input.token)
            .bind(input.expires_at)
            .bind(&input.ip_address)
            .bind(&input.user_agent)
            .fetch_one(pool)
            .await
    }

    /// Find a usable session by token.
    pub async fn select_active_by_token(
        pool: &PgPool,
        token: &str,
    ) -> Result<Option<Session>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM sessions
             WHERE token = $1
               AND is_active = true
               AND expires_at > NOW()"
        );
        sqlx::query_as::<_, Session>(&query)
            .bind(token)
            .fetch_optional(pool)
            .await
    }

    /// Find a usable session by token together with its owning user, in one
    /// statement.
    pub async fn select_active_with_identity(
        pool: &PgPool,
        token: &str,
    ) -> Result<Option<SessionIdentityRow>, sqlx::Error> {
        sqlx::query_as::<_, SessionIdentityRow>(
            "SELECT s.id, s.user_id, s.token, s.ip_address, s.user_agent,
                    s.created_at, s.updated_at, s.expires_at, s.is_active,
                    u.email AS user_email, u.name AS user_name, u.is_active AS user_is_active
             FROM sessions s
             JOIN users u ON u.id = s.user_id
             WHERE s.token = $1
               AND s.is_active = true
               AND s.expires_at > NOW()",
        )
        .bind(token)
        .fetch_optional(pool)
        .await
    }

    /// Bump `updated_at` on a usable session. `updated_at` never moves backwards.
    pub async fn update_activity_timestamp(
        pool: &PgPool,
        token: &str,
    ) -> Result<Option<Session>, sqlx::Error> {
        let query = format!(
            "UPDATE sessions SET updated_at = GREATEST(NOW(), updated_at)
             WHERE token = $1
               AND is_active = true
               AND expires_at > NOW()
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Session>(&query)
            .bind(token)
            .fetch_optional(pool)
            .await
    }

    /// Push `expires_at` forward by `additional` on a usable session.
    pub async fn extend_expiration(
        pool: &PgPool,
        token: &str,
        additional: Duration,
    ) -> Result<Option<Session>, sqlx::Error> {
        let query = format!(
            "UPDATE sessions SET expires_at = expires_at + make_interval(secs => $2)
             WHERE token = $1
               AND is_active = true
               AND expires_at > NOW()
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Session>(&query)
            .bind(token)
            .bind(additional.num_milliseconds() as f64 / 1000.0)
            .fetch_optional(pool)
            .await
    }

    /// Mark a session inactive regardless of expiry. Returns `true` if the
    /// row was updated; a second call returns `false`.
    pub async fn mark_inactive(pool: &PgPool, token: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE sessions SET is_active = false WHERE token = $1 AND is_active = true",
        )
        .bind(token)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Mark all active sessions for a user inactive. Returns the count.
    pub async fn mark_inactive_for_user(pool: &PgPool, user_id: DbId) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE sessions SET is_active = false
             WHERE user_id = $1 AND is_active = true",
        )
        .bind(user_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Delete expired or inactive sessions. Returns the count of deleted rows.
    pub async fn delete_expired_or_inactive(pool: &PgPool) -> Result<u64, sqlx::Error> {
        let result =
            sqlx::query("DELETE FROM sessions WHERE expires_at < NOW() OR is_active = false")
                .execute(pool)
                .await?;
        Ok(result.rows_affected())
    }
}
