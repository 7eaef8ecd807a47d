//! Cookie-session authentication for Axum handlers.
//!
//! Per request: no cookie is `AuthenticationRequired`; a cookie whose token
//! does not resolve to a usable session is `InvalidOrExpiredSession` (the
//! same response for unknown, expired, invalidated, and orphaned tokens); a
//! resolved session whose principal is disabled is `AccountNotActive`. A
//! storage failure propagates as such and is never turned into a 401.

use std::fmt;

use axum::extract::{FromRequestParts, Request};
use axum::http::request::Parts;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use capacity_core::types::{DbId, Timestamp};
use capacity_db::models::user::Identity;

use crate::auth::cookies::session_token_from_headers;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// The authenticated session attached to a request.
///
/// Use this as an extractor parameter in any handler that requires a session:
///
/// ```ignore
/// async fn my_handler(auth: AuthSession) -> AppResult<Json<()>> {
///     tracing::info!(user_id = auth.identity.user_id, "handling request");
///     Ok(Json(()))
/// }
/// ```
#[derive(Clone)]
pub struct AuthSession {
    pub session_id: DbId,
    token: String,
    pub identity: Identity,
    pub expires_at: Timestamp,
}

impl AuthSession {
    /// The raw session token. Never log it.
    pub fn token(&self) -> &str {
        &self.token
    }
}

impl fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSession")
            .field("session_id", &self.session_id)
            .field("token", &"<redacted>")
            .field("identity", &self.identity)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl FromRequestParts<AppState> for AuthSession {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        // Already resolved by `require_session` for this request.
        if let Some(existing) = parts.extensions.get::<AuthSession>() {
            return Ok(existing.clone());
        }

        let session = authenticate(&parts.headers, state).await?;
        parts.extensions.insert(session.clone());
        Ok(session)
    }
}

/// Resolve the session cookie in `headers` against the session store.
///
/// On success the activity bump is spawned in the background; its failure
/// is logged and does not affect the request.
pub async fn authenticate(headers: &HeaderMap, state: &AppState) -> AppResult<AuthSession> {
    let token = session_token_from_headers(headers, &state.config.session.cookie_name)
        .ok_or(AppError::AuthenticationRequired)?;

    let Some((session, identity)) = state.sessions.find_by_token_with_identity(&token).await?
    else {
        tracing::debug!("Rejected request with unusable session token");
        return Err(AppError::InvalidOrExpiredSession);
    };

    if !identity.is_active {
        tracing::info!(
            user_id = identity.user_id,
            session_id = session.id,
            "Rejected session of inactive account"
        );
        return Err(AppError::AccountNotActive);
    }

    let store = state.sessions.clone();
    let bump_token = token.clone();
    let session_id = session.id;
    tokio::spawn(async move {
        if let Err(e) = store.update_activity(&bump_token).await {
            tracing::warn!(session_id, error = %e, "Failed to record session activity");
        }
    });

    Ok(AuthSession {
        session_id: session.id,
        token,
        identity,
        expires_at: session.expires_at,
    })
}

/// Route middleware that rejects requests without a usable session and makes
/// the resolved [`AuthSession`] available to the handler.
pub async fn require_session(auth: AuthSession, mut req: Request, next: Next) -> Response {
    req.extensions_mut().insert(auth);
    next.run(req).await
}
