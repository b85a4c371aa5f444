//! Session token issuance.
//!
//! The streaming endpoint authenticates with a short-lived JWT passed in the
//! connection URL. Tokens are signed locally with the account's secret key
//! and only need to outlive the connection handshake, so every connection
//! attempt signs a fresh one; nothing is cached.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from signed-token issuance.
#[derive(Error, Debug)]
pub enum CredentialError {
    /// The access key is empty.
    #[error("access key must not be empty")]
    EmptyAccessKey,
    /// The secret key is empty.
    #[error("secret key must not be empty")]
    EmptySecretKey,
    /// The requested validity window is zero.
    #[error("token validity duration must be positive")]
    ZeroDuration,
    /// The JWT library rejected the signing inputs.
    #[error("token signing failed: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
}

/// Claims carried by the session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// API access key identifying the caller.
    #[serde(rename = "accessKey")]
    pub access_key: String,
    /// Issued at - Unix timestamp when the token was created.
    pub iat: u64,
    /// Expiration time - Unix timestamp when the token expires.
    pub exp: u64,
}

impl TokenClaims {
    /// Create claims valid from now for `ttl`.
    pub fn new(access_key: &str, ttl: Duration) -> Self {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("Time went backwards")
            .as_secs();

        Self {
            access_key: access_key.to_string(),
            iat: now,
            exp: now + ttl.as_secs(),
        }
    }
}

/// Issue a bearer token for one connection attempt.
///
/// # Arguments
/// * `access_key` - API access key, becomes the `accessKey` claim
/// * `secret_key` - HMAC secret the token is signed with (HS256)
/// * `ttl` - validity window starting now
///
/// # Returns
/// * `Result<String, CredentialError>` - The encoded JWT, or why the inputs
///   were rejected
pub fn issue_token(
    access_key: &str,
    secret_key: &str,
    ttl: Duration,
) -> Result<String, CredentialError> {
    if access_key.is_empty() {
        return Err(CredentialError::EmptyAccessKey);
    }
    if secret_key.is_empty() {
        return Err(CredentialError::EmptySecretKey);
    }
    if ttl.is_zero() {
        return Err(CredentialError::ZeroDuration);
    }

    let header = Header::new(Algorithm::HS256);
    let claims = TokenClaims::new(access_key, ttl);

    Ok(encode(
        &header,
        &claims,
        &EncodingKey::from_secret(secret_key.as_bytes()),
    )?)
}
