//! Route definitions for the `/users` resource.

use axum::middleware::from_fn_with_state;
use axum::routing::{delete, put};
use axum::Router;

use crate::handlers::user;
use crate::middleware::auth::require_session;
use crate::middleware::rate_limit::{enforce, KeyScope, RateLimitGate};
use crate::state::AppState;

/// Routes mounted at `/users`. All require a session owned by `{id}`. The
/// password limiter counts attempts before the session is checked.
///
/// ```text
/// PUT    /{id}/password  -> change_password (password limiter, keyed by address + id)
/// DELETE /{id}           -> delete_account
/// ```
pub fn router(state: &AppState) -> Router<AppState> {
    let password_gate = RateLimitGate::new(
        state.limiters.password_update.clone(),
        KeyScope::ClientAndPathParam("id"),
        state.config.trust_proxy_headers,
    );

    // The gate is added last so it runs before the session check.
    let password = Router::new()
        .route("/{id}/password", put(user::change_password))
        .route_layer(from_fn_with_state(state.clone(), require_session))
        .route_layer(from_fn_with_state(password_gate, enforce));

    let account = Router::new()
        .route("/{id}", delete(user::delete_account))
        .route_layer(from_fn_with_state(state.clone(), require_session));

    password.merge(account)
}
