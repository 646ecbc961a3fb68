//! Error types for roomcast

use thiserror::Error;

/// Identity verification failure at connection establishment.
///
/// Either variant rejects the connection before any registry state exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Authentication token missing")]
    Missing,

    #[error("Authentication token invalid")]
    Invalid,
}
