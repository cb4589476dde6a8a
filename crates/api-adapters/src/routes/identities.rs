//! Registration, login, profiles, follows, public keys and suspension.

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use domains::{FollowToggle, Identity, IdentityProfile, IdentitySummary};
use serde::Deserialize;
use serde_json::{json, Value};
use services::Session;
use uuid::Uuid;

use super::optional_body;
use crate::auth::{Authenticated, Viewer};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicKeyBody {
    pub public_key: String,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct SuspendBody {
    #[serde(default)]
    pub reason: Option<String>,
}

pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<Credentials>,
) -> ApiResult<impl IntoResponse> {
    let session = state
        .services
        .identity
        .register(&body.username, &body.password)
        .await?;
    Ok((StatusCode::CREATED, Json(session)))
}

/// Any refusal, including a suspension, answers 401 with the reason.
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<Credentials>,
) -> ApiResult<Json<Session>> {
    let session = state
        .services
        .identity
        .login(&body.username, &body.password)
        .await
        .map_err(ApiError::from_auth)?;
    Ok(Json(session))
}

pub async fn profile(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<IdentityProfile>> {
    Ok(Json(state.services.social.profile(viewer.id(), id).await?))
}

pub async fn profile_by_username(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(username): Path<String>,
) -> ApiResult<Json<IdentityProfile>> {
    let profile = state
        .services
        .social
        .profile_by_username(viewer.id(), &username)
        .await?;
    Ok(Json(profile))
}

pub async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<Vec<IdentitySummary>>> {
    Ok(Json(state.services.social.search(&query.q).await?))
}

pub async fn toggle_follow(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<FollowToggle>> {
    Ok(Json(state.services.social.toggle_follow(principal.id, id).await?))
}

pub async fn followers(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<IdentitySummary>>> {
    Ok(Json(state.services.social.followers(id).await?))
}

pub async fn following(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<IdentitySummary>>> {
    Ok(Json(state.services.social.following(id).await?))
}

pub async fn register_public_key(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
    Path(id): Path<Uuid>,
    Json(body): Json<PublicKeyBody>,
) -> ApiResult<StatusCode> {
    state
        .services
        .identity
        .register_public_key(&principal, id, body.public_key)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn public_key(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<Value>> {
    let key = state.services.identity.public_key(id).await?;
    Ok(Json(json!({ "publicKey": key })))
}

pub async fn toggle_suspension(
    State(state): State<AppState>,
    Authenticated(admin): Authenticated,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> ApiResult<Json<Identity>> {
    let SuspendBody { reason } = optional_body(&body)?;
    let updated = state
        .services
        .moderation
        .toggle_suspension(&admin, id, reason)
        .await?;
    Ok(Json(updated))
}
