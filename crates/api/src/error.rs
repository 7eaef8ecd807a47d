use std::time::Duration;

use axum::http::header::RETRY_AFTER;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use capacity_core::error::CoreError;
use capacity_core::rate_limit::describe_duration;
use capacity_db::StorageError;
use serde_json::json;

/// Message shared by every unusable-session rejection. Unknown, expired,
/// invalidated, and orphaned tokens must be indistinguishable to clients.
pub const INVALID_SESSION_MESSAGE: &str = "Invalid or expired session";

/// Application-level error type for HTTP handlers and middleware.
///
/// Wraps [`CoreError`] for domain errors and [`StorageError`] for persistence
/// failures, and carries the authentication and rate-limit verdicts.
/// Implements [`IntoResponse`] to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `capacity_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The store could not answer. Not an authentication verdict.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// No session credential was presented.
    #[error("Authentication required")]
    AuthenticationRequired,

    /// A credential was presented but is unknown, expired, invalidated, or
    /// belongs to a principal that no longer exists.
    #[error("Invalid or expired session")]
    InvalidOrExpiredSession,

    /// The session is valid but its principal is disabled.
    #[error("Account is not active")]
    AccountNotActive,

    /// A limiter rejected the request.
    #[error("Rate limit exceeded for {limiter}")]
    RateLimited {
        limiter: &'static str,
        retry_after: Duration,
    },

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

const GENERIC_INTERNAL: &str = "An internal error occurred";

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            // --- CoreError variants ---
            AppError::Core(core) => match core {
                CoreError::NotFound { entity, id } => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("{entity} with id {id} not found"),
                ),
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
                CoreError::InvalidCredentials(msg) => {
                    (StatusCode::UNAUTHORIZED, "INVALID_CREDENTIALS", msg.clone())
                }
                CoreError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone()),
                CoreError::Internal(msg) => {
                    tracing::error!(error = %msg, "Internal core error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        GENERIC_INTERNAL.to_string(),
                    )
                }
            },

            // --- Storage errors ---
            AppError::Storage(err) => classify_storage_error(err),

            // --- Authentication ---
            AppError::AuthenticationRequired => (
                StatusCode::UNAUTHORIZED,
                "AUTHENTICATION_REQUIRED",
                "Authentication required".to_string(),
            ),
            AppError::InvalidOrExpiredSession => (
                StatusCode::UNAUTHORIZED,
                "INVALID_SESSION",
                INVALID_SESSION_MESSAGE.to_string(),
            ),
            AppError::AccountNotActive => (
                StatusCode::UNAUTHORIZED,
                "INVALID_SESSION",
                "Account is not active".to_string(),
            ),

            // --- Rate limiting ---
            AppError::RateLimited { retry_after, .. } => {
                return rate_limited_response(*retry_after);
            }

            // --- HTTP-specific errors ---
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    GENERIC_INTERNAL.to_string(),
                )
            }
        };

        let body = json!({
            "message": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

/// Build the 429 body: `message`, `error`, and a human-readable `retryAfter`,
/// plus a `Retry-After` header in whole seconds.
fn rate_limited_response(retry_after: Duration) -> Response {
    let body = json!({
        "message": "Too many requests, please try again later.",
        "error": "Too many requests",
        "retryAfter": describe_duration(retry_after),
        "code": "RATE_LIMITED",
    });
    let mut response = (StatusCode::TOO_MANY_REQUESTS, axum::Json(body)).into_response();
    let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
    response
        .headers_mut()
        .insert(RETRY_AFTER, HeaderValue::from(secs));
    response
}

/// Classify a storage failure into an HTTP status, error code, and message.
///
/// - Unique violations on `uq_`-prefixed constraints map to 409.
/// - Everything else maps to 503 with a sanitized message; the client may
///   retry, and the failure is never reported as an authentication verdict.
fn classify_storage_error(err: &StorageError) -> (StatusCode, &'static str, String) {
    match err {
        StorageError::UniqueViolation { constraint } if constraint.starts_with("uq_") => (
            StatusCode::CONFLICT,
            "CONFLICT",
            format!("Duplicate value violates unique constraint: {constraint}"),
        ),
        other => {
            tracing::error!(error = %other, "Storage error");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "STORAGE_UNAVAILABLE",
                "Service temporarily unavailable".to_string(),
            )
        }
    }
}
