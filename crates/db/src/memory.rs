//! In-process storage backend.
//!
//! Implements [`SessionBackend`] and [`UserBackend`] over a single
//! `tokio::sync::RwLock`, so each operation is atomic with respect to
//! concurrent callers. Used by tests and by local runs without PostgreSQL.
//! Semantics mirror the SQL in [`crate::repositories`], including the
//! cascade from users to sessions.

use std::collections::HashMap;

use async_trait::async_trait;
use capacity_core::types::DbId;
use chrono::{Duration, Utc};
use tokio::sync::RwLock;

use crate::backend::{SessionBackend, UserBackend};
use crate::error::StorageError;
use crate::models::session::{CreateSession, Session};
use crate::models::user::{CreateUser, Identity, User};

#[derive(Default)]
struct MemoryState {
    users: HashMap<DbId, User>,
    /// Sessions keyed by token.
    sessions: HashMap<String, Session>,
    next_user_id: DbId,
    next_session_id: DbId,
}

/// Thread-safe in-memory store; wrap in `Arc` to share.
#[derive(Default)]
pub struct MemoryBackend {
    state: RwLock<MemoryState>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of session rows currently held, usable or not.
    pub async fn session_count(&self) -> usize {
        self.state.read().await.sessions.len()
    }
}

fn identity_of(user: &User) -> Identity {
    Identity {
        user_id: user.id,
        email: user.email.clone(),
        name: user.name.clone(),
        is_active: user.is_active,
    }
}

#[async_trait]
impl SessionBackend for MemoryBackend {
    async fn insert(&self, input: &CreateSession) -> Result<Session, StorageError> {
        let mut state = self.state.write().await;
        if state.sessions.contains_key(&input.token) {
            return Err(StorageError::UniqueViolation {
                constraint: "uq_sessions_token".into(),
            });
        }
        state.next_session_id += 1;
        let now = Utc::now();
        let session = Session {
            id: state.next_session_id,
            user_id: input.user_id,
            token: input.token.clone(),
            ip_address: input.ip_address.clone(),
            user_agent: input.user_agent.clone(),
            created_at: now,
            updated_at: now,
            expires_at: input.expires_at,
            is_active: true,
        };
        state.sessions.insert(session.token.clone(), session.clone());
        Ok(session)
    }

    async fn select_active_by_token(&self, token: &str) -> Result<Option<Session>, StorageError> {
        let state = self.state.read().await;
        let now = Utc::now();
        Ok(state
            .sessions
            .get(token)
            .filter(|s| s.is_usable_at(now))
            .cloned())
    }

    async fn select_active_with_identity(
        &self,
        token: &str,
    ) -> Result<Option<(Session, Identity)>, StorageError> {
        let state = self.state.read().await;
        let now = Utc::now();
        let Some(session) = state.sessions.get(token).filter(|s| s.is_usable_at(now)) else {
            return Ok(None);
        };
        Ok(state
            .users
            .get(&session.user_id)
            .map(|user| (session.clone(), identity_of(user))))
    }

    async fn update_activity_timestamp(
        &self,
        token: &str,
    ) -> Result<Option<Session>, StorageError> {
        let mut state = self.state.write().await;
        let now = Utc::now();
        Ok(state
            .sessions
            .get_mut(token)
            .filter(|s| s.is_usable_at(now))
            .map(|s| {
                s.updated_at = s.updated_at.max(now);
                s.clone()
            }))
    }

    async fn extend_expiration(
        &self,
        token: &str,
        additional: Duration,
    ) -> Result<Option<Session>, StorageError> {
        let mut state = self.state.write().await;
        let now = Utc::now();
        Ok(state
            .sessions
            .get_mut(token)
            .filter(|s| s.is_usable_at(now))
            .map(|s| {
                s.expires_at += additional;
                s.clone()
            }))
    }

    async fn mark_inactive(&self, token: &str) -> Result<bool, StorageError> {
        let mut state = self.state.write().await;
        match state.sessions.get_mut(token) {
            Some(s) if s.is_active => {
                s.is_active = false;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_inactive_for_user(&self, user_id: DbId) -> Result<u64, StorageError> {
        let mut state = self.state.write().await;
        let mut count = 0;
        for session in state.sessions.values_mut() {
            if session.user_id == user_id && session.is_active {
                session.is_active = false;
                count += 1;
            }
        }
        Ok(count)
    }

    async fn delete_expired_or_inactive(&self) -> Result<u64, StorageError> {
        let mut state = self.state.write().await;
        let now = Utc::now();
        let before = state.sessions.len();
        state
            .sessions
            .retain(|_, s| !(s.expires_at < now || !s.is_active));
        Ok((before - state.sessions.len()) as u64)
    }

    async fn ping(&self) -> Result<(), StorageError> {
        Ok(())
    }
}

#[async_trait]
impl UserBackend for MemoryBackend {
    async fn create_user(&self, input: &CreateUser) -> Result<User, StorageError> {
        let mut state = self.state.write().await;
        if state.users.values().any(|u| u.email == input.email) {
            return Err(StorageError::UniqueViolation {
                constraint: "uq_users_email".into(),
            });
        }
        state.next_user_id += 1;
        let now = Utc::now();
        let user = User {
            id: state.next_user_id,
            email: input.email.clone(),
            name: input.name.clone(),
            password_hash: input.password_hash.clone(),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user_by_id(&self, id: DbId) -> Result<Option<User>, StorageError> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StorageError> {
        let state = self.state.read().await;
        Ok(state.users.values().find(|u| u.email == email).cloned())
    }

    async fn set_user_active(&self, id: DbId, is_active: bool) -> Result<bool, StorageError> {
        let mut state = self.state.write().await;
        match state.users.get_mut(&id) {
            Some(user) if user.is_active != is_active => {
                user.is_active = is_active;
                user.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn update_password(&self, id: DbId, password_hash: &str) -> Result<bool, StorageError> {
        let mut state = self.state.write().await;
        match state.users.get_mut(&id) {
            Some(user) => {
                user.password_hash = password_hash.to_string();
                user.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_user(&self, id: DbId) -> Result<bool, StorageError> {
        let mut state = self.state.write().await;
        if state.users.remove(&id).is_none() {
            return Ok(false);
        }
        state.sessions.retain(|_, s| s.user_id != id);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(email: &str) -> CreateUser {
        CreateUser {
            email: email.to_string(),
            name: "Test User".to_string(),
            password_hash: "hash".to_string(),
        }
    }

    fn new_session(user_id: DbId, token: &str, expires_in: Duration) -> CreateSession {
        CreateSession {
            user_id,
            token: token.to_string(),
            expires_at: Utc::now() + expires_in,
            ip_address: Some("127.0.0.1".into()),
            user_agent: None,
        }
    }

    #[tokio::test]
    async fn duplicate_email_is_a_unique_violation() {
        let backend = MemoryBackend::new();
        backend.create_user(&new_user("a@x.io")).await.unwrap();
        let err = backend.create_user(&new_user("a@x.io")).await.unwrap_err();
        assert!(matches!(err, StorageError::UniqueViolation { constraint } if constraint == "uq_users_email"));
    }

    #[tokio::test]
    async fn expired_sessions_are_invisible_but_kept_until_cleanup() {
        let backend = MemoryBackend::new();
        let user = backend.create_user(&new_user("a@x.io")).await.unwrap();
        backend
            .insert(&new_session(user.id, "expired", Duration::minutes(-1)))
            .await
            .unwrap();

        assert!(backend.select_active_by_token("expired").await.unwrap().is_none());
        assert_eq!(backend.session_count().await, 1);

        assert_eq!(backend.delete_expired_or_inactive().await.unwrap(), 1);
        assert_eq!(backend.session_count().await, 0);
    }

    #[tokio::test]
    async fn identity_join_requires_owning_user() {
        let backend = MemoryBackend::new();
        backend
            .insert(&new_session(99, "orphan", Duration::hours(1)))
            .await
            .unwrap();
        assert!(backend
            .select_active_with_identity("orphan")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn deleting_a_user_removes_their_sessions() {
        let backend = MemoryBackend::new();
        let a = backend.create_user(&new_user("a@x.io")).await.unwrap();
        let b = backend.create_user(&new_user("b@x.io")).await.unwrap();
        backend.insert(&new_session(a.id, "a1", Duration::hours(1))).await.unwrap();
        backend.insert(&new_session(a.id, "a2", Duration::hours(1))).await.unwrap();
        backend.insert(&new_session(b.id, "b1", Duration::hours(1))).await.unwrap();

        assert!(backend.delete_user(a.id).await.unwrap());
        assert_eq!(backend.session_count().await, 1);
        assert!(backend.select_active_by_token("b1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn mark_inactive_for_user_skips_other_users() {
        let backend = MemoryBackend::new();
        let a = backend.create_user(&new_user("a@x.io")).await.unwrap();
        let b = backend.create_user(&new_user("b@x.io")).await.unwrap();
        backend.insert(&new_session(a.id, "a1", Duration::hours(1))).await.unwrap();
        backend.insert(&new_session(a.id, "a2", Duration::hours(1))).await.unwrap();
        backend.insert(&new_session(b.id, "b1", Duration::hours(1))).await.unwrap();

        assert_eq!(backend.mark_inactive_for_user(a.id).await.unwrap(), 2);
        assert_eq!(backend.mark_inactive_for_user(a.id).await.unwrap(), 0);
        assert!(backend.select_active_by_token("b1").await.unwrap().is_some());
    }
}
