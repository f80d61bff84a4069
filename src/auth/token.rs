//! Bearer tokens
//!
//! HS256 tokens carrying the user id. Issued on login and verified by the
//! API middleware before any namespace operation.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::MIN_JWT_SECRET_LEN;
use crate::error::{Error, Result};
use crate::namespace::UserId;

/// Payload stored in a token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id (namespace root)
    pub id: String,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// Issues and verifies bearer tokens
#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl TokenIssuer {
    /// Create an issuer. The secret must be at least 32 characters.
    pub fn new(secret: &str, ttl: Duration) -> Result<Self> {
        if secret.len() < MIN_JWT_SECRET_LEN {
            return Err(Error::Config(format!(
                "token secret must be at least {} characters",
                MIN_JWT_SECRET_LEN
            )));
        }

        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        })
    }

    /// Issue a token for a user
    pub fn issue(&self, user: &UserId) -> Result<String> {
        let now = unix_now()?;
        let claims = Claims {
            id: user.as_str().to_string(),
            iat: now,
            exp: now + self.ttl.as_secs(),
        };

        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| Error::Internal(format!("Failed to generate token: {}", e)))
    }

    /// Verify a token and return its claims
    pub fn verify(&self, token: &str) -> Result<Claims> {
        decode::<Claims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|err| {
                use jsonwebtoken::errors::ErrorKind;
                let reason = match err.kind() {
                    ErrorKind::ExpiredSignature => "Token expired",
                    ErrorKind::InvalidSignature => "Invalid signature",
                    ErrorKind::InvalidToken => "Invalid token",
                    _ => "Token validation failed",
                };
                Error::Authentication(reason.to_string())
            })
    }
}

fn unix_now() -> Result<u64> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|e| Error::Internal(format!("System time error: {}", e)))
}

/// Extract the token from an `Authorization: Bearer <token>` header
pub fn extract_bearer(header: Option<&str>) -> Option<&str> {
    let token = header?.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}
