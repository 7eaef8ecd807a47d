//! Session model and DTOs.

use std::fmt;

use capacity_core::types::{DbId, Timestamp};
use sqlx::FromRow;

use crate::models::user::Identity;

/// A session row from the `sessions` table.
///
/// `Debug` redacts the token so a session can be logged safely.
#[derive(Clone, FromRow)]
pub struct Session {
    pub id: DbId,
    pub user_id: DbId,
    pub token: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub expires_at: Timestamp,
    pub is_active: bool,
}

impl Session {
    /// A session is usable iff it is active and has not yet expired.
    pub fn is_usable_at(&self, now: Timestamp) -> bool {
        self.is_active && self.expires_at > now
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("token", &"<redacted>")
            .field("ip_address", &self.ip_address)
            .field("user_agent", &self.user_agent)
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .field("expires_at", &self.expires_at)
            .field("is_active", &self.is_active)
            .finish()
    }
}

/// DTO for inserting a new session. The token is generated by the caller.
pub struct CreateSession {
    pub user_id: DbId,
    pub token: String,
    pub expires_at: Timestamp,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Joined session + owning user row, as returned by
/// [`SessionRepo::select_active_with_identity`](crate::repositories::SessionRepo::select_active_with_identity).
#[derive(Debug, FromRow)]
pub struct SessionIdentityRow {
    #[sqlx(flatten)]
    pub session: Session,
    pub user_email: String,
    pub user_name: String,
    pub user_is_active: bool,
}

impl SessionIdentityRow {
    pub fn into_parts(self) -> (Session, Identity) {
        let identity = Identity {
            user_id: self.session.user_id,
            email: self.user_email,
            name: self.user_name,
            is_active: self.user_is_active,
        };
        (self.session, identity)
    }
}
