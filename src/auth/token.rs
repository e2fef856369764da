use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::models::User;

/// Claims
///
/// Payload signed into every session token. `role` is copied from the user
/// record at issue time; the edge guard trusts it, the API guard re-reads the
/// role from the repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user id.
    pub sub: Uuid,
    pub email: String,
    pub role: String,
    /// Expiration time (seconds since epoch).
    pub exp: usize,
    /// Issued at (seconds since epoch).
    pub iat: usize,
}

/// Upper bound on the session lifetime. Larger values are clamped.
pub const MAX_TOKEN_TTL_DAYS: i64 = 365;

/// Why a token failed verification.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token expired")]
    Expired,
    #[error("token invalid: {0}")]
    Invalid(String),
    #[error("token could not be signed: {0}")]
    Signing(String),
}

/// TokenCodec
///
/// HS256 signer/verifier built once from the configured secret and shared by
/// both guards and the login/registration handlers.
#[derive(Clone)]
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl TokenCodec {
    /// `ttl_days` is clamped to `1..=MAX_TOKEN_TTL_DAYS`.
    pub fn new(secret: &str, ttl_days: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::days(ttl_days.clamp(1, MAX_TOKEN_TTL_DAYS)),
        }
    }

    /// Signs arbitrary claims. Used directly by tests that need expired or
    /// hand-crafted tokens.
    pub fn sign_claims(&self, claims: &Claims) -> Result<String, TokenError> {
        encode(&Header::default(), claims, &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Issues a session token for `user`, valid for the configured lifetime.
    pub fn sign(&self, user: &User) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id,
            email: user.email.clone(),
            role: user.role.clone(),
            iat: now.timestamp() as usize,
            exp: (now + self.ttl).timestamp() as usize,
        };
        self.sign_claims(&claims)
    }

    /// Verifies signature and expiry, returning the decoded claims.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::default();
        validation.validate_exp = true;

        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid(e.to_string()),
            })
    }
}
