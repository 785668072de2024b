//! Request authentication
//!
//! With no `server.auth_token` configured every request is accepted as
//! `server.default_user`. With a token configured, the caller must present
//! it as `Authorization: Bearer <token>` or, for EventSource clients that
//! cannot set headers, as a `token` query parameter.

use axum::async_trait;
use axum::extract::{FromRequestParts, Query};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use serde::Deserialize;
use subtle::ConstantTimeEq;
use tracing::warn;

use super::{ApiError, AppState};

/// The authenticated subject
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser(pub String);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let subject = AuthUser(state.config.server.default_user.clone());
        let Some(expected) = state.config.server.auth_token.as_deref() else {
            return Ok(subject);
        };

        let presented = bearer_token(parts).or_else(|| query_token(parts));
        match presented {
            Some(token) if constant_time_eq(token.as_bytes(), expected.as_bytes()) => Ok(subject),
            Some(_) => {
                warn!("Rejected request to {} with an invalid token", parts.uri.path());
                Err(ApiError::Unauthorized("Invalid token".to_string()))
            }
            None => Err(ApiError::Unauthorized("Missing authorization token".to_string())),
        }
    }
}

fn bearer_token(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
}

#[derive(Debug, Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

fn query_token(parts: &Parts) -> Option<String> {
    Query::<TokenQuery>::try_from_uri(&parts.uri)
        .ok()
        .and_then(|Query(q)| q.token)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}
