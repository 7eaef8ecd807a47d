//! Handlers for the `/auth` resource (register, login, logout, me, extend).

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use axum_extra::extract::cookie::CookieJar;
use capacity_core::error::{normalize_email, validate_email, CoreError};
use capacity_core::types::Timestamp;
use capacity_db::models::user::{CreateUser, Identity, UserResponse};
use capacity_db::StorageError;
use serde::{Deserialize, Serialize};

use crate::auth::cookies::{clear_session_cookie, session_cookie};
use crate::auth::password::{
    hash_password, validate_password_strength, verify_against_dummy, verify_password,
};
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthSession;
use crate::middleware::client::ClientContext;
use crate::response::DataResponse;
use crate::state::AppState;

/// The one message for unknown accounts and wrong passwords alike.
const INVALID_CREDENTIALS_MESSAGE: &str = "Invalid email or password";

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Request body for `POST /auth/register`.
#[derive(Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub name: String,
    pub password: String,
}

/// Request body for `POST /auth/login`.
#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// The authenticated principal and when the current session ends.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub user: Identity,
    pub expires_at: Timestamp,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/auth/register
///
/// Create an account. Returns 201 with the new user.
pub async fn register(
    State(state): State<AppState>,
    Json(input): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<UserResponse>>)> {
    let email = normalize_email(&input.email);
    validate_email(&email)?;

    let name = input.name.trim();
    if name.is_empty() {
        return Err(CoreError::Validation("Name is required".into()).into());
    }

    validate_password_strength(&input.password, state.config.password_min_length)
        .map_err(|msg| AppError::Core(CoreError::Validation(msg)))?;

    let password_hash = hash_password(&input.password)
        .map_err(|e| AppError::InternalError(format!("Password hashing error: {e}")))?;

    let user = state
        .users
        .create_user(&CreateUser {
            email,
            name: name.to_string(),
            password_hash,
        })
        .await
        .map_err(|e| match e {
            StorageError::UniqueViolation { .. } => AppError::Core(CoreError::Conflict(
                "An account with this email already exists".into(),
            )),
            other => other.into(),
        })?;

    tracing::info!(user_id = user.id, "Account created");
    Ok((
        StatusCode::CREATED,
        Json(DataResponse { data: user.into() }),
    ))
}

/// POST /api/v1/auth/login
///
/// Verify email + password and start a session. The session token is only
/// ever sent back in the `Set-Cookie` header.
pub async fn login(
    State(state): State<AppState>,
    client: ClientContext,
    Json(input): Json<LoginRequest>,
) -> AppResult<(CookieJar, Json<DataResponse<SessionInfo>>)> {
    let email = normalize_email(&input.email);

    let Some(user) = state.users.find_user_by_email(&email).await? else {
        verify_against_dummy(&input.password);
        return Err(invalid_credentials());
    };

    let password_valid = verify_password(&input.password, &user.password_hash)
        .map_err(|e| AppError::InternalError(format!("Password verification error: {e}")))?;
    if !password_valid {
        tracing::debug!(user_id = user.id, "Login rejected: wrong password");
        return Err(invalid_credentials());
    }

    if !user.is_active {
        tracing::info!(user_id = user.id, "Login rejected: account not active");
        return Err(AppError::AccountNotActive);
    }

    let session = state.sessions.create(user.id, client.into(), None).await?;
    tracing::info!(user_id = user.id, session_id = session.id, "User logged in");

    let jar = CookieJar::new().add(session_cookie(
        &state.config.session.cookie_name,
        &session.token,
        session.expires_at,
        state.config.production,
    ));
    let info = SessionInfo {
        user: Identity {
            user_id: user.id,
            email: user.email,
            name: user.name,
            is_active: user.is_active,
        },
        expires_at: session.expires_at,
    };

    Ok((jar, Json(DataResponse { data: info })))
}

/// POST /api/v1/auth/logout
///
/// Invalidate the current session and clear the cookie. Returns 204.
pub async fn logout(
    State(state): State<AppState>,
    auth: AuthSession,
) -> AppResult<(StatusCode, CookieJar)> {
    state.sessions.invalidate(auth.token()).await?;
    tracing::info!(
        user_id = auth.identity.user_id,
        session_id = auth.session_id,
        "User logged out"
    );

    let jar = CookieJar::new().add(clear_session_cookie(
        &state.config.session.cookie_name,
        state.config.production,
    ));
    Ok((StatusCode::NO_CONTENT, jar))
}

/// GET /api/v1/auth/me
pub async fn me(auth: AuthSession) -> Json<DataResponse<SessionInfo>> {
    Json(DataResponse {
        data: SessionInfo {
            user: auth.identity,
            expires_at: auth.expires_at,
        },
    })
}

/// POST /api/v1/auth/session/extend
///
/// Push the current session's expiry out by one session lifetime and
/// refresh the cookie.
pub async fn extend_session(
    State(state): State<AppState>,
    auth: AuthSession,
) -> AppResult<(CookieJar, Json<DataResponse<SessionInfo>>)> {
    let session = state
        .sessions
        .extend_expiration(auth.token(), state.sessions.default_ttl())
        .await?
        // Invalidated or expired between authentication and now.
        .ok_or(AppError::InvalidOrExpiredSession)?;

    let jar = CookieJar::new().add(session_cookie(
        &state.config.session.cookie_name,
        &session.token,
        session.expires_at,
        state.config.production,
    ));
    Ok((
        jar,
        Json(DataResponse {
            data: SessionInfo {
                user: auth.identity,
                expires_at: session.expires_at,
            },
        }),
    ))
}

fn invalid_credentials() -> AppError {
    AppError::Core(CoreError::InvalidCredentials(
        INVALID_CREDENTIALS_MESSAGE.into(),
    ))
}
