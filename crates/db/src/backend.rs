//! Storage capabilities consumed by the API layer.
//!
//! The session store and the auth handlers only see these traits, so the
//! same code runs over PostgreSQL ([`PgBackend`]) or the in-process
//! [`MemoryBackend`](crate::memory::MemoryBackend). Every method reports
//! persistence failures as [`StorageError`]; "no matching row" is `None`
//! or `false`, never an error.

use async_trait::async_trait;
use capacity_core::types::DbId;
use chrono::Duration;

use crate::error::StorageError;
use crate::models::session::{CreateSession, Session};
use crate::models::user::{CreateUser, Identity, User};
use crate::repositories::{SessionRepo, UserRepo};
use crate::DbPool;

/// Session persistence capability.
#[async_trait]
pub trait SessionBackend: Send + Sync {
    /// Persist a new session row.
    async fn insert(&self, input: &CreateSession) -> Result<Session, StorageError>;

    /// Return the session iff it is active and unexpired.
    async fn select_active_by_token(&self, token: &str) -> Result<Option<Session>, StorageError>;

    /// Same filter as [`select_active_by_token`](Self::select_active_by_token),
    /// joined with the owning user in a single read.
    async fn select_active_with_identity(
        &self,
        token: &str,
    ) -> Result<Option<(Session, Identity)>, StorageError>;

    /// Advance `updated_at` to now on a usable session.
    async fn update_activity_timestamp(&self, token: &str)
        -> Result<Option<Session>, StorageError>;

    /// Add `additional` to the current `expires_at` of a usable session.
    async fn extend_expiration(
        &self,
        token: &str,
        additional: Duration,
    ) -> Result<Option<Session>, StorageError>;

    /// Deactivate one session. `true` iff a still-active row was changed.
    async fn mark_inactive(&self, token: &str) -> Result<bool, StorageError>;

    /// Deactivate every active session of a user. Returns the count.
    async fn mark_inactive_for_user(&self, user_id: DbId) -> Result<u64, StorageError>;

    /// Delete rows that are expired or inactive. Returns the count.
    async fn delete_expired_or_inactive(&self) -> Result<u64, StorageError>;

    /// Cheap reachability probe for health checks.
    async fn ping(&self) -> Result<(), StorageError>;
}

/// User-management capability used by the auth handlers.
#[async_trait]
pub trait UserBackend: Send + Sync {
    async fn create_user(&self, input: &CreateUser) -> Result<User, StorageError>;

    async fn find_user_by_id(&self, id: DbId) -> Result<Option<User>, StorageError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StorageError>;

    /// Enable or disable a principal. `true` iff the flag changed.
    async fn set_user_active(&self, id: DbId, is_active: bool) -> Result<bool, StorageError>;

    async fn update_password(&self, id: DbId, password_hash: &str) -> Result<bool, StorageError>;

    /// Delete a user and, with it, all of the user's sessions.
    async fn delete_user(&self, id: DbId) -> Result<bool, StorageError>;
}

// ---------------------------------------------------------------------------
// PostgreSQL
// ---------------------------------------------------------------------------

/// [`SessionBackend`] and [`UserBackend`] over a PostgreSQL pool.
#[derive(Clone)]
pub struct PgBackend {
    pool: DbPool,
}

impl PgBackend {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl SessionBackend for PgBackend {
    async fn insert(&self, input: &CreateSession) -> Result<Session, StorageError> {
        Ok(SessionRepo::insert(&self.pool, input).await?)
    }

    async fn select_active_by_token(&self, token: &str) -> Result<Option<Session>, StorageError> {
        Ok(SessionRepo::select_active_by_token(&self.pool, token).await?)
    }

    async fn select_active_with_identity(
        &self,
        token: &str,
    ) -> Result<Option<(Session, Identity)>, StorageError> {
        let row = SessionRepo::select_active_with_identity(&self.pool, token).await?;
        Ok(row.map(|r| r.into_parts()))
    }

    async fn update_activity_timestamp(
        &self,
        token: &str,
    ) -> Result<Option<Session>, StorageError> {
        Ok(SessionRepo::update_activity_timestamp(&self.pool, token).await?)
    }

    async fn extend_expiration(
        &self,
        token: &str,
        additional: Duration,
    ) -> Result<Option<Session>, StorageError> {
        Ok(SessionRepo::extend_expiration(&self.pool, token, additional).await?)
    }

    async fn mark_inactive(&self, token: &str) -> Result<bool, StorageError> {
        Ok(SessionRepo::mark_inactive(&self.pool, token).await?)
    }

    async fn mark_inactive_for_user(&self, user_id: DbId) -> Result<u64, StorageError> {
        Ok(SessionRepo::mark_inactive_for_user(&self.pool, user_id).await?)
    }

    async fn delete_expired_or_inactive(&self) -> Result<u64, StorageError> {
        Ok(SessionRepo::delete_expired_or_inactive(&self.pool).await?)
    }

    async fn ping(&self) -> Result<(), StorageError> {
        Ok(crate::health_check(&self.pool).await?)
    }
}

#[async_trait]
impl UserBackend for PgBackend {
    async fn create_user(&self, input: &CreateUser) -> Result<User, StorageError> {
        Ok(UserRepo::create(&self.pool, input).await?)
    }

    async fn find_user_by_id(&self, id: DbId) -> Result<Option<User>, StorageError> {
        Ok(UserRepo::find_by_id(&self.pool, id).await?)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StorageError> {
        Ok(UserRepo::find_by_email(&self.pool, email).await?)
    }

    async fn set_user_active(&self, id: DbId, is_active: bool) -> Result<bool, StorageError> {
        Ok(UserRepo::set_active(&self.pool, id, is_active).await?)
    }

    async fn update_password(&self, id: DbId, password_hash: &str) -> Result<bool, StorageError> {
        Ok(UserRepo::update_password(&self.pool, id, password_hash).await?)
    }

    async fn delete_user(&self, id: DbId) -> Result<bool, StorageError> {
        Ok(UserRepo::delete(&self.pool, id).await?)
    }
}
