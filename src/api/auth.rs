//! HS256 bearer-token authentication

use crate::api::state::AppState;
use crate::error::{AuthFailure, ServiceError};
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub username: String,
    /// Expiry as a unix timestamp; tokens without one never expire
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<u64>,
}

/// Mint a token for `username`, valid for `ttl` when given
pub fn issue_token(secret: &str, username: &str, ttl: Option<Duration>) -> anyhow::Result<String> {
    let exp = ttl.map(|ttl| jsonwebtoken::get_current_timestamp() + ttl.as_secs());
    let claims = Claims {
        username: username.to_string(),
        exp,
    };
    Ok(encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?)
}

/// Verify signature and expiry
pub fn decode_token(token: &str, secret: &str) -> Result<Claims, AuthFailure> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.required_spec_claims.clear();
    validation.validate_exp = true;

    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => AuthFailure::Expired,
            _ => AuthFailure::Invalid,
        })
}

/// Token from an `Authorization: Bearer <token>` header
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")?
        .split(' ')
        .next()
        .filter(|t| !t.is_empty())
}

/// Authenticated caller; rejects the request with 401 otherwise
#[derive(Debug, Clone)]
pub struct AuthUser(pub Claims);

/// Caller identity when a token is supplied; a bad token is still a 401
#[derive(Debug, Clone)]
pub struct OptionalUser(pub Option<Claims>);

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ServiceError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)
            .ok_or(ServiceError::AuthFailure(AuthFailure::Missing))?;
        decode_token(token, &state.config.auth.jwt_secret)
            .map(AuthUser)
            .map_err(ServiceError::AuthFailure)
    }
}

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for OptionalUser {
    type Rejection = ServiceError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        if parts.headers.get(AUTHORIZATION).is_none() {
            return Ok(OptionalUser(None));
        }
        AuthUser::from_request_parts(parts, state)
            .await
            .map(|AuthUser(claims)| OptionalUser(Some(claims)))
    }
}
