//! JWT bearer token validation

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use roomcast_shared::{AuthError, UserId};
use serde::{Deserialize, Serialize};

use crate::config::Config;

/// JWT claims presented by connecting clients
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID). Tokens minted with a `userId` claim are accepted too.
    #[serde(alias = "userId")]
    pub sub: String,
    /// Issued at
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    /// Expiration
    pub exp: i64,
}

/// Verifies bearer credentials and extracts the user identity
#[derive(Clone)]
pub struct IdentityVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl IdentityVerifier {
    /// Create a verifier for HS256 tokens signed with `secret`
    pub fn new(secret: &str) -> Self {
        // Explicit algorithm prevents algorithm confusion attacks
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 60; // 60 second clock skew tolerance
        validation.validate_aud = false;

        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Build a verifier from application configuration
    pub fn from_config(config: &Config) -> Self {
        let verifier = Self::new(&config.jwt_secret).with_leeway(config.jwt_leeway_seconds);
        match &config.jwt_audience {
            Some(audience) => verifier.with_audience(audience),
            None => verifier,
        }
    }

    /// Require the `aud` claim to match
    pub fn with_audience(mut self, audience: &str) -> Self {
        self.validation.set_audience(&[audience]);
        self.validation.validate_aud = true;
        self
    }

    /// Override the clock skew tolerance
    pub fn with_leeway(mut self, seconds: u64) -> Self {
        self.validation.leeway = seconds;
        self
    }

    /// Validate and decode a token
    pub fn validate_token(&self, token: &str) -> Result<Claims, JwtError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::Expired,
                jsonwebtoken::errors::ErrorKind::InvalidToken => JwtError::Invalid,
                jsonwebtoken::errors::ErrorKind::InvalidSignature => JwtError::Invalid,
                jsonwebtoken::errors::ErrorKind::InvalidAlgorithm => JwtError::Invalid,
                jsonwebtoken::errors::ErrorKind::InvalidAudience => JwtError::Invalid,
                _ => JwtError::Validation(e.to_string()),
            })
    }

    /// Authenticate a connection attempt.
    ///
    /// `None` or a blank credential is [`AuthError::Missing`]; anything that fails
    /// verification or carries an empty subject is [`AuthError::Invalid`].
    pub fn authenticate(&self, credential: Option<&str>) -> Result<UserId, AuthError> {
        let token = credential
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::Missing)?;

        let claims = self.validate_token(token).map_err(|e| {
            tracing::warn!(error = %e, "Bearer token rejected");
            AuthError::Invalid
        })?;

        if claims.sub.trim().is_empty() {
            tracing::warn!("Bearer token has an empty subject");
            return Err(AuthError::Invalid);
        }

        Ok(UserId::new(claims.sub))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("Token has expired")]
    Expired,
    #[error("Invalid token")]
    Invalid,
    #[error("Token validation failed: {0}")]
    Validation(String),
}
