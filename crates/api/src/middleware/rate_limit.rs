//! Rate-limit gates for Axum routes.
//!
//! A [`RateLimitGate`] pairs one [`FixedWindowLimiter`] with the rule that
//! derives its key from a request. Gates are attached with
//! `axum::middleware::from_fn_with_state(gate, enforce)`. Every response that
//! passes through a gate carries `ratelimit-limit`, `ratelimit-remaining` and
//! `ratelimit-reset`, whether the request was admitted or rejected. When gates
//! nest, the innermost gate's headers are kept.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::extract::{FromRequestParts, RawPathParams, Request, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use capacity_core::error::normalize_email;
use capacity_core::rate_limit::{composite_key, FixedWindowLimiter, RateLimitOutcome};

use crate::config::RateLimitConfig;
use crate::error::AppError;
use crate::middleware::client::client_address;

/// Largest request body buffered to read a key field.
const MAX_KEYED_BODY_BYTES: usize = 64 * 1024;

pub const RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("ratelimit-limit");
pub const RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("ratelimit-remaining");
pub const RATELIMIT_RESET: HeaderName = HeaderName::from_static("ratelimit-reset");

// ---------------------------------------------------------------------------
// Limiter family
// ---------------------------------------------------------------------------

/// The independent limiter instances of the application.
#[derive(Debug, Clone)]
pub struct RateLimiters {
    pub login: Arc<FixedWindowLimiter>,
    pub password_update: Arc<FixedWindowLimiter>,
    pub account_creation: Arc<FixedWindowLimiter>,
    pub general_api: Arc<FixedWindowLimiter>,
}

impl RateLimiters {
    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self {
            login: Arc::new(FixedWindowLimiter::new(config.login.clone())),
            password_update: Arc::new(FixedWindowLimiter::new(config.password_update.clone())),
            account_creation: Arc::new(FixedWindowLimiter::new(config.account_creation.clone())),
            general_api: Arc::new(FixedWindowLimiter::new(config.general_api.clone())),
        }
    }

    /// Drop stale windows from every limiter. Returns the number removed.
    pub fn purge_expired(&self) -> usize {
        [
            &self.login,
            &self.password_update,
            &self.account_creation,
            &self.general_api,
        ]
        .iter()
        .map(|limiter| limiter.purge_expired())
        .sum()
    }
}

// ---------------------------------------------------------------------------
// Gate
// ---------------------------------------------------------------------------

/// How a gate derives the action discriminator appended to the client address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyScope {
    /// Client address only.
    Client,
    /// Client address plus a top-level string field of the JSON body.
    /// The value is trimmed and lowercased.
    ClientAndBodyField(&'static str),
    /// Client address plus a path parameter.
    ClientAndPathParam(&'static str),
}

/// State of one `enforce` middleware instance.
#[derive(Debug, Clone)]
pub struct RateLimitGate {
    limiter: Arc<FixedWindowLimiter>,
    scope: KeyScope,
    trust_proxy: bool,
}

impl RateLimitGate {
    pub fn new(limiter: Arc<FixedWindowLimiter>, scope: KeyScope, trust_proxy: bool) -> Self {
        Self {
            limiter,
            scope,
            trust_proxy,
        }
    }
}

/// Count the request against the gate's limiter and either forward it or
/// answer 429 without calling the handler.
pub async fn enforce(State(gate): State<RateLimitGate>, req: Request, next: Next) -> Response {
    let (mut parts, body) = req.into_parts();
    let client = client_address(&parts, gate.trust_proxy);

    let mut oversized = false;
    let (discriminator, body) = match gate.scope {
        KeyScope::Client => (None, body),
        KeyScope::ClientAndPathParam(name) => {
            let param = RawPathParams::from_request_parts(&mut parts, &())
                .await
                .ok()
                .and_then(|params| {
                    params
                        .iter()
                        .find(|(key, _)| *key == name)
                        .map(|(_, value)| value.to_string())
                });
            (param, body)
        }
        KeyScope::ClientAndBodyField(field) => match to_bytes(body, MAX_KEYED_BODY_BYTES).await {
            Ok(bytes) => {
                let value = serde_json::from_slice::<serde_json::Value>(&bytes)
                    .ok()
                    .and_then(|json| {
                        json.get(field).and_then(|v| v.as_str()).map(normalize_email)
                    })
                    .filter(|v| !v.is_empty());
                (value, Body::from(bytes))
            }
            // Unreadable bodies still count, under the address-only key.
            Err(_) => {
                oversized = true;
                (None, Body::empty())
            }
        },
    };

    let key = composite_key(client.as_deref(), discriminator.as_deref());
    let outcome = gate.limiter.check(&key);

    if !outcome.allowed {
        let policy = gate.limiter.policy();
        tracing::warn!(
            limiter = policy.name,
            client = client.as_deref().unwrap_or("unknown"),
            retry_after_secs = outcome.reset_after_secs(),
            "Rate limit exceeded"
        );
        let mut response = AppError::RateLimited {
            limiter: policy.name,
            retry_after: outcome.reset_after,
        }
        .into_response();
        set_quota_headers(response.headers_mut(), &outcome);
        return response;
    }

    if oversized {
        let mut response = AppError::BadRequest("Request body too large".into()).into_response();
        set_quota_headers(response.headers_mut(), &outcome);
        return response;
    }

    let mut response = next.run(Request::from_parts(parts, body)).await;
    set_quota_headers(response.headers_mut(), &outcome);
    response
}

/// Attach quota headers unless an inner, route-specific gate already did.
fn set_quota_headers(headers: &mut HeaderMap, outcome: &RateLimitOutcome) {
    headers
        .entry(RATELIMIT_LIMIT)
        .or_insert(HeaderValue::from(outcome.limit));
    headers
        .entry(RATELIMIT_REMAINING)
        .or_insert(HeaderValue::from(outcome.remaining));
    headers
        .entry(RATELIMIT_RESET)
        .or_insert(HeaderValue::from(outcome.reset_after_secs()));
}
