//! Request middleware and extractors.
//!
//! - [`auth::AuthSession`] -- Resolves the session cookie to an authenticated principal.
//! - [`auth::require_session`] -- Route layer that rejects requests without a usable session.
//! - [`rate_limit::enforce`] -- Fixed-window rate-limit gate.
//! - [`client::ClientContext`] -- Client address and user agent.

pub mod auth;
pub mod client;
pub mod rate_limit;
