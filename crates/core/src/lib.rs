//! Domain primitives for the capacity-planning backend.
//!
//! This crate has no I/O: it holds shared types, the domain error, session
//! token generation, and the fixed-window rate-limit algorithm used by the
//! API layer.

pub mod error;
pub mod rate_limit;
pub mod session_token;
pub mod types;
