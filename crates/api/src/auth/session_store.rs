//! Server-side session store.
//!
//! Owns the session lifecycle on top of a [`SessionBackend`]: token
//! generation, default expiry, and a per-call deadline. A session is usable
//! iff it is active and unexpired; reads filter on that condition instead of
//! deleting, and rows are only removed by [`SessionStore::cleanup_expired`].
//!
//! Every method returns `Err(StorageError)` when the backend fails or the
//! deadline elapses, and `Ok(None)` / `Ok(false)` when there is simply no
//! usable session. Callers must keep the two apart.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use capacity_core::session_token::generate_session_token;
use capacity_core::types::{DbId, Timestamp};
use capacity_db::models::session::{CreateSession, Session};
use capacity_db::models::user::Identity;
use capacity_db::{SessionBackend, StorageError};
use chrono::Utc;

/// Informational metadata recorded with a new session.
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Cheaply cloneable handle to the session store.
#[derive(Clone)]
pub struct SessionStore {
    backend: Arc<dyn SessionBackend>,
    default_ttl: chrono::Duration,
    timeout: Duration,
}

impl SessionStore {
    pub fn new(
        backend: Arc<dyn SessionBackend>,
        default_ttl: chrono::Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            backend,
            default_ttl,
            timeout,
        }
    }

    pub fn default_ttl(&self) -> chrono::Duration {
        self.default_ttl
    }

    /// Create a session for `user_id` with a fresh token.
    ///
    /// `expires_at` defaults to now + the configured TTL.
    pub async fn create(
        &self,
        user_id: DbId,
        client: ClientInfo,
        expires_at: Option<Timestamp>,
    ) -> Result<Session, StorageError> {
        let input = CreateSession {
            user_id,
            token: generate_session_token(),
            expires_at: expires_at.unwrap_or_else(|| Utc::now() + self.default_ttl),
            ip_address: client.ip_address,
            user_agent: client.user_agent,
        };
        let session = self.bounded(self.backend.insert(&input)).await?;
        tracing::debug!(session_id = session.id, user_id, "Session created");
        Ok(session)
    }

    /// Return the session iff it is active and unexpired. Unknown, expired,
    /// and invalidated tokens all yield `None`.
    pub async fn find_by_token(&self, token: &str) -> Result<Option<Session>, StorageError> {
        self.bounded(self.backend.select_active_by_token(token)).await
    }

    /// Like [`find_by_token`](Self::find_by_token), joined with the owning
    /// principal. A session whose principal no longer exists yields `None`.
    pub async fn find_by_token_with_identity(
        &self,
        token: &str,
    ) -> Result<Option<(Session, Identity)>, StorageError> {
        self.bounded(self.backend.select_active_with_identity(token))
            .await
    }

    /// Record activity on a usable session. `None` if it is not usable.
    pub async fn update_activity(&self, token: &str) -> Result<Option<Session>, StorageError> {
        self.bounded(self.backend.update_activity_timestamp(token))
            .await
    }

    /// Deactivate a session regardless of its expiry. Returns whether a row
    /// changed; invalidating twice returns `true` then `false`.
    pub async fn invalidate(&self, token: &str) -> Result<bool, StorageError> {
        self.bounded(self.backend.mark_inactive(token)).await
    }

    /// Deactivate every session of a user. Returns how many were active.
    pub async fn invalidate_all_for_user(&self, user_id: DbId) -> Result<u64, StorageError> {
        let count = self
            .bounded(self.backend.mark_inactive_for_user(user_id))
            .await?;
        tracing::info!(user_id, count, "Invalidated all sessions for user");
        Ok(count)
    }

    /// Add `additional` to the current expiry of a usable session.
    pub async fn extend_expiration(
        &self,
        token: &str,
        additional: chrono::Duration,
    ) -> Result<Option<Session>, StorageError> {
        self.bounded(self.backend.extend_expiration(token, additional))
            .await
    }

    /// Delete expired or inactive sessions. Usable sessions are never touched.
    pub async fn cleanup_expired(&self) -> Result<u64, StorageError> {
        self.bounded(self.backend.delete_expired_or_inactive())
            .await
    }

    pub async fn ping(&self) -> Result<(), StorageError> {
        self.bounded(self.backend.ping()).await
    }

    /// Apply the store deadline; elapsing it is a storage failure.
    async fn bounded<T, F>(&self, op: F) -> Result<T, StorageError>
    where
        F: Future<Output = Result<T, StorageError>>,
    {
        tokio::time::timeout(self.timeout, op)
            .await
            .map_err(|_| StorageError::Timeout(self.timeout))?
    }
}
