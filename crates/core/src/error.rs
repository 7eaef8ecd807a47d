//! Domain-level errors shared by the persistence and HTTP layers.

use crate::types::DbId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// Credentials were presented but did not match. The message must not
    /// reveal whether the account exists.
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    /// The caller is authenticated but acting on someone else's resource.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Normalize an email address for lookups and rate-limit keys.
///
/// Emails are compared case-insensitively with surrounding whitespace removed.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Minimal structural check for an email address: one `@` with a non-empty
/// local part and a domain containing a dot.
pub fn validate_email(email: &str) -> Result<(), CoreError> {
    let Some((local, domain)) = email.split_once('@') else {
        return Err(CoreError::Validation("Email address is invalid".into()));
    };
    if local.is_empty() || domain.contains('@') || !domain.contains('.') || domain.ends_with('.') {
        return Err(CoreError::Validation("Email address is invalid".into()));
    }
    Ok(())
}
