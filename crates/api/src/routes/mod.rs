pub mod auth;
pub mod health;
pub mod user;

use axum::middleware::from_fn_with_state;
use axum::Router;

use crate::middleware::rate_limit::{enforce, KeyScope, RateLimitGate};
use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /auth/register                 create account (public)
/// /auth/login                    start session (public)
/// /auth/logout                   end session (requires session)
/// /auth/me                       current principal (requires session)
/// /auth/session/extend           extend session (requires session)
///
/// /users/{id}/password           change own password (PUT)
/// /users/{id}                    delete own account (DELETE)
/// ```
///
/// Every route under `/api/v1` also passes the general API limiter.
pub fn api_routes(state: &AppState) -> Router<AppState> {
    let general_gate = RateLimitGate::new(
        state.limiters.general_api.clone(),
        KeyScope::Client,
        state.config.trust_proxy_headers,
    );

    Router::new()
        .nest("/auth", auth::router(state))
        .nest("/users", user::router(state))
        .layer(from_fn_with_state(general_gate, enforce))
}
