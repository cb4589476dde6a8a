//! Content nodes: feeds, trees, publishing, edits, deletes, likes and status.

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use domains::{
    CascadeOutcome, ContentNode, EnrichedNode, FeedMode, FeedRequest, LikeToggle, ModerationStatus,
};
use serde::Deserialize;
use services::NewNode;
use uuid::Uuid;

use super::optional_body;
use crate::auth::{Authenticated, Viewer};
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedQuery {
    #[serde(default)]
    pub following: bool,
    pub author_id: Option<Uuid>,
    pub parent_id: Option<Uuid>,
    /// Only consulted for anonymous requests; a bearer token always wins.
    pub current_user_id: Option<Uuid>,
}

impl FeedQuery {
    fn into_request(self, viewer: &Viewer) -> FeedRequest {
        FeedRequest {
            viewer_id: viewer.id().or(self.current_user_id),
            mode: if self.following { FeedMode::Home } else { FeedMode::Explore },
            author_filter: self.author_id,
            parent_filter: self.parent_id,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNodeBody {
    pub content: String,
    #[serde(default)]
    pub parent_id: Option<Uuid>,
    #[serde(default)]
    pub context_binding: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EditNodeBody {
    pub content: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct DeleteNodeBody {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusBody {
    pub status: ModerationStatus,
}

pub async fn feed(
    State(state): State<AppState>,
    viewer: Viewer,
    Query(query): Query<FeedQuery>,
) -> ApiResult<Json<Vec<EnrichedNode>>> {
    let request = query.into_request(&viewer);
    Ok(Json(state.services.feed.build_feed(request).await?))
}

pub async fn trending(State(state): State<AppState>, viewer: Viewer) -> ApiResult<Json<Vec<EnrichedNode>>> {
    Ok(Json(state.services.feed.trending(viewer.id()).await?))
}

pub async fn tree(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(root_id): Path<Uuid>,
) -> ApiResult<Json<Vec<EnrichedNode>>> {
    Ok(Json(state.services.content.descendants(viewer.id(), root_id).await?))
}

pub async fn get_one(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<EnrichedNode>> {
    Ok(Json(state.services.content.get_node(viewer.id(), id).await?))
}

pub async fn create(
    State(state): State<AppState>,
    Authenticated(author): Authenticated,
    Json(body): Json<CreateNodeBody>,
) -> ApiResult<impl IntoResponse> {
    let node = state
        .services
        .content
        .create_node(
            &author,
            NewNode {
                content: body.content,
                parent_id: body.parent_id,
                context_binding: body.context_binding,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(node)))
}

pub async fn edit(
    State(state): State<AppState>,
    Authenticated(editor): Authenticated,
    Path(id): Path<Uuid>,
    Json(body): Json<EditNodeBody>,
) -> ApiResult<Json<ContentNode>> {
    Ok(Json(state.services.content.edit_node(&editor, id, body.content).await?))
}

pub async fn delete(
    State(state): State<AppState>,
    Authenticated(requester): Authenticated,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> ApiResult<Json<CascadeOutcome>> {
    let DeleteNodeBody { reason } = optional_body(&body)?;
    Ok(Json(state.services.content.delete_node(&requester, id, reason).await?))
}

pub async fn toggle_like(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<LikeToggle>> {
    Ok(Json(state.services.content.toggle_like(&user, id).await?))
}

pub async fn set_status(
    State(state): State<AppState>,
    Authenticated(moderator): Authenticated,
    Path(id): Path<Uuid>,
    Json(body): Json<StatusBody>,
) -> ApiResult<Json<ContentNode>> {
    Ok(Json(state.services.content.set_status(&moderator, id, body.status).await?))
}
