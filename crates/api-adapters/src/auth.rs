//! Bearer-token extractors.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use domains::Principal;

use crate::error::ApiError;
use crate::state::AppState;

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// A caller that must be signed in.
pub struct Authenticated(pub Principal);

impl FromRequestParts<AppState> for Authenticated {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)
            .ok_or_else(|| ApiError::Unauthenticated("missing bearer token".into()))?;
        let principal = state
            .services
            .identity
            .authenticate(token)
            .await
            .map_err(ApiError::from_auth)?;
        Ok(Self(principal))
    }
}

/// A caller that may be anonymous. A token that is present but invalid is
/// still rejected.
pub struct Viewer(pub Option<Principal>);

impl Viewer {
    pub fn id(&self) -> Option<uuid::Uuid> {
        self.0.as_ref().map(|p| p.id)
    }
}

impl FromRequestParts<AppState> for Viewer {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if parts.headers.get(AUTHORIZATION).is_none() {
            return Ok(Self(None));
        }
        Authenticated::from_request_parts(parts, state)
            .await
            .map(|Authenticated(p)| Self(Some(p)))
    }
}
