//! Route definitions for the `/auth` resource.

use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;

use crate::handlers::auth;
use crate::middleware::auth::require_session;
use crate::middleware::rate_limit::{enforce, KeyScope, RateLimitGate};
use crate::state::AppState;

/// Routes mounted at `/auth`.
///
/// ```text
/// POST /register        -> register (account-creation limiter)
/// POST /login           -> login (login limiter, keyed by address + email)
/// POST /logout          -> logout (requires session)
/// GET  /me              -> me (requires session)
/// POST /session/extend  -> extend_session (requires session)
/// ```
pub fn router(state: &AppState) -> Router<AppState> {
    let trust_proxy = state.config.trust_proxy_headers;
    let signup_gate = RateLimitGate::new(
        state.limiters.account_creation.clone(),
        KeyScope::Client,
        trust_proxy,
    );
    let login_gate = RateLimitGate::new(
        state.limiters.login.clone(),
        KeyScope::ClientAndBodyField("email"),
        trust_proxy,
    );

    let public = Router::new()
        .route(
            "/register",
            post(auth::register).layer(from_fn_with_state(signup_gate, enforce)),
        )
        .route(
            "/login",
            post(auth::login).layer(from_fn_with_state(login_gate, enforce)),
        );

    let protected = Router::new()
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
        .route("/session/extend", post(auth::extend_session))
        .route_layer(from_fn_with_state(state.clone(), require_session));

    public.merge(protected)
}
