//! Row models and DTOs.
//!
//! Each submodule contains a `FromRow` entity struct matching the database
//! row and the `Create*` DTO used for inserts.

pub mod session;
pub mod user;
