//! JWT Token Handler
//! Mission: Issue and verify short-lived access tokens, mint opaque refresh tokens

use crate::auth::models::{Claims, Role, User};
use anyhow::{Context, Result};
use chrono::Utc;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use rand::{rngs::OsRng, RngCore};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

/// Default access token lifetime (15 minutes)
pub const DEFAULT_ACCESS_TTL_SECS: i64 = 15 * 60;

/// Refresh tokens carry 256 bits of entropy
pub const REFRESH_TOKEN_BYTES: usize = 32;

/// Why a token was rejected. Callers outside the token service collapse
/// every variant into a single "unauthenticated" outcome.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token is malformed")]
    Malformed,
    #[error("token signature does not verify")]
    BadSignature,
    #[error("token is missing a required claim")]
    MissingClaims,
    #[error("token has expired")]
    Expired,
}

/// Loose view of the payload, so absent fields are told apart from garbage.
#[derive(Debug, Deserialize)]
struct RawClaims {
    sub: Option<String>,
    username: Option<String>,
    role: Option<String>,
    iat: Option<i64>,
    exp: i64,
}

/// JWT Handler for token operations
pub struct JwtHandler {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl_secs: i64,
}

impl JwtHandler {
    /// Create a new JWT handler with the access-token secret
    pub fn new(secret: &str) -> Self {
        Self::with_ttl(secret, DEFAULT_ACCESS_TTL_SECS)
    }

    pub fn with_ttl(secret: &str, access_ttl_secs: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            access_ttl_secs,
        }
    }

    /// Generate an access token for a user, returning it with its lifetime in seconds
    pub fn generate_access_token(&self, user: &User) -> Result<(String, i64)> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: user.id.to_string(),
            username: user.username.clone(),
            role: user.role,
            iat: now,
            exp: now + self.access_ttl_secs,
        };

        debug!(
            "Generating access token for user {} ({}), expires in {}s",
            user.username, user.id, self.access_ttl_secs
        );

        Ok((self.issue(&claims)?, self.access_ttl_secs))
    }

    /// Sign an arbitrary set of claims
    pub fn issue(&self, claims: &Claims) -> Result<String> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .context("Failed to sign access token")
    }

    /// Validate an access token against the current clock
    pub fn validate_token(&self, token: &str) -> Result<Claims, TokenError> {
        self.validate_token_at(token, Utc::now().timestamp())
    }

    /// Validate an access token as of `now` (unix seconds).
    ///
    /// The signature is checked before any payload field is looked at. A token
    /// whose `exp` equals `now` is already expired.
    pub fn validate_token_at(&self, token: &str, now: i64) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["exp"]);

        let raw = decode::<RawClaims>(token, &self.decoding_key, &validation)
            .map_err(|e| {
                let err = match e.kind() {
                    ErrorKind::InvalidSignature => TokenError::BadSignature,
                    ErrorKind::MissingRequiredClaim(_) => TokenError::MissingClaims,
                    ErrorKind::ExpiredSignature => TokenError::Expired,
                    _ => TokenError::Malformed,
                };
                debug!("Token rejected: {} ({})", err, e);
                err
            })?
            .claims;

        let (Some(sub), Some(username), Some(role)) = (raw.sub, raw.username, raw.role) else {
            debug!("Token rejected: {}", TokenError::MissingClaims);
            return Err(TokenError::MissingClaims);
        };
        if sub.is_empty() || username.is_empty() {
            debug!("Token rejected: {}", TokenError::MissingClaims);
            return Err(TokenError::MissingClaims);
        }
        let role = Role::parse(&role).ok_or(TokenError::Malformed)?;

        if raw.exp <= now {
            debug!("Token rejected: {} (exp {} <= now {})", TokenError::Expired, raw.exp, now);
            return Err(TokenError::Expired);
        }

        Ok(Claims {
            sub,
            username,
            role,
            iat: raw.iat.unwrap_or_default(),
            exp: raw.exp,
        })
    }
}

/// Opaque refresh token: 32 bytes from the OS CSPRNG, hex encoded
pub fn generate_refresh_token() -> String {
    let mut buf = [0u8; REFRESH_TOKEN_BYTES];
    OsRng.fill_bytes(&mut buf);
    hex::encode(buf)
}
