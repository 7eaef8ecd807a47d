//! Handlers for the `/users` resource (own password, own account).

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use axum_extra::extract::cookie::CookieJar;
use capacity_core::error::CoreError;
use capacity_core::types::DbId;
use serde::Deserialize;

use crate::auth::cookies::{clear_session_cookie, session_cookie};
use crate::auth::password::{hash_password, validate_password_strength, verify_password};
use crate::error::{AppError, AppResult};
use crate::handlers::auth::SessionInfo;
use crate::middleware::auth::AuthSession;
use crate::middleware::client::ClientContext;
use crate::response::DataResponse;
use crate::state::AppState;

/// Request body for `PUT /users/{id}/password`.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// PUT /api/v1/users/{id}/password
///
/// Change the caller's own password. Every existing session of the user is
/// invalidated and a fresh session is issued to the caller.
pub async fn change_password(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    auth: AuthSession,
    client: ClientContext,
    Json(input): Json<ChangePasswordRequest>,
) -> AppResult<(CookieJar, Json<DataResponse<SessionInfo>>)> {
    ensure_owner(&auth, id)?;

    validate_password_strength(&input.new_password, state.config.password_min_length)
        .map_err(|msg| AppError::Core(CoreError::Validation(msg)))?;

    let user = state
        .users
        .find_user_by_id(id)
        .await?
        .ok_or(CoreError::NotFound { entity: "user", id })?;

    let current_valid = verify_password(&input.current_password, &user.password_hash)
        .map_err(|e| AppError::InternalError(format!("Password verification error: {e}")))?;
    if !current_valid {
        return Err(CoreError::InvalidCredentials("Current password is incorrect".into()).into());
    }

    let password_hash = hash_password(&input.new_password)
        .map_err(|e| AppError::InternalError(format!("Password hashing error: {e}")))?;
    state.users.update_password(id, &password_hash).await?;

    state.sessions.invalidate_all_for_user(id).await?;
    let session = state.sessions.create(id, client.into(), None).await?;
    tracing::info!(user_id = id, session_id = session.id, "Password changed");

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

/// DELETE /api/v1/users/{id}
///
/// Delete the caller's own account. Returns 204 and clears the cookie.
pub async fn delete_account(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    auth: AuthSession,
) -> AppResult<(StatusCode, CookieJar)> {
    ensure_owner(&auth, id)?;

    state.sessions.invalidate_all_for_user(id).await?;
    if !state.users.delete_user(id).await? {
        return Err(CoreError::NotFound { entity: "user", id }.into());
    }
    tracing::info!(user_id = id, "Account deleted");

    let jar = CookieJar::new().add(clear_session_cookie(
        &state.config.session.cookie_name,
        state.config.production,
    ));
    Ok((StatusCode::NO_CONTENT, jar))
}

fn ensure_owner(auth: &AuthSession, id: DbId) -> AppResult<()> {
    if auth.identity.user_id != id {
        return Err(CoreError::Forbidden("You can only manage your own account".into()).into());
    }
    Ok(())
}
