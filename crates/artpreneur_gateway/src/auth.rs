//! Bearer-token identity resolution.
//!
//! Access tokens are HS256 JWTs issued by the backend's auth service; the
//! `sub` claim carries the user's UUID. The user id is taken from the token
//! only, never from request input.

use anyhow::{bail, Context, Result};
use artpreneur_core::{HealthScoreError, IdentityResolver};
use async_trait::async_trait;
use axum::http::{header::AUTHORIZATION, HeaderMap};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Claims read from (and written into) access tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
    /// Issued at (Unix timestamp)
    #[serde(default)]
    pub iat: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

#[derive(Clone)]
pub struct JwtIdentity {
    secret: String,
    audience: Option<String>,
}

impl JwtIdentity {
    /// Returns an error if the secret is empty or shorter than 32 characters.
    pub fn new(secret: impl Into<String>, audience: Option<String>) -> Result<Self> {
        let secret = secret.into();
        if secret.is_empty() {
            bail!("auth.jwt_secret is required (or set ARTPRENEUR_JWT_SECRET)");
        }
        if secret.len() < 32 {
            bail!("auth.jwt_secret must be at least 32 characters");
        }
        Ok(Self { secret, audience })
    }

    /// Mint a token for `user_id`, valid for `ttl_secs`.
    pub fn issue(&self, user_id: Uuid, ttl_secs: u64) -> Result<String> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .context("System time before Unix epoch")?
            .as_secs();

        let claims = Claims {
            sub: user_id.to_string(),
            exp: now + ttl_secs,
            iat: now,
            aud: self.audience.clone(),
            role: Some("authenticated".to_string()),
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .context("Failed to encode access token")
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        match &self.audience {
            Some(aud) => validation.set_audience(&[aud]),
            None => validation.validate_aud = false,
        }
        validation
    }
}

#[async_trait]
impl IdentityResolver for JwtIdentity {
    async fn resolve(&self, token: &str) -> Result<Uuid, HealthScoreError> {
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &self.validation(),
        )
        .map_err(|err| {
            use jsonwebtoken::errors::ErrorKind;
            let reason = match err.kind() {
                ErrorKind::ExpiredSignature => "Token expired",
                ErrorKind::InvalidSignature => "Invalid signature",
                ErrorKind::InvalidAudience => "Invalid audience",
                ErrorKind::InvalidToken => "Invalid token",
                _ => "Token validation failed",
            };
            HealthScoreError::authentication(reason)
        })?;

        Uuid::parse_str(&data.claims.sub)
            .map_err(|_| HealthScoreError::authentication("Invalid user"))
    }
}

/// Extract the bearer credential from the `Authorization` header.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, HealthScoreError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or_else(|| HealthScoreError::authentication("No authorization header"))?
        .to_str()
        .map_err(|_| HealthScoreError::authentication("Malformed authorization header"))?;

    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
        .ok_or_else(|| HealthScoreError::authentication("Expected a Bearer token"))?
        .trim();

    if token.is_empty() {
        return Err(HealthScoreError::authentication("Empty bearer token"));
    }
    Ok(token)
}
