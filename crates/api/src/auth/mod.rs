//! Authentication primitives.
//!
//! - [`password`] -- Argon2id password hashing and verification.
//! - [`session_store`] -- server-side session lifecycle over a storage backend.
//! - [`cookies`] -- reading and writing the session cookie.

pub mod cookies;
pub mod password;
pub mod session_store;
