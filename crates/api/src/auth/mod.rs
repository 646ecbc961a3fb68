//! Authentication module for roomcast

pub mod jwt;

use axum::http::{header::AUTHORIZATION, HeaderMap};

pub use jwt::{Claims, IdentityVerifier, JwtError};

/// Extract the token from an `Authorization: Bearer <token>` header
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer ").or_else(|| v.strip_prefix("bearer ")))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}
