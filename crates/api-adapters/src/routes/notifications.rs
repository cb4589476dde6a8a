use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use domains::{DomainError, NotificationView};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth::Authenticated;
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboxQuery {
    pub user_id: Option<Uuid>,
}

/// The caller's own inbox. A `userId` naming anyone else is refused.
pub async fn list(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
    Query(query): Query<InboxQuery>,
) -> ApiResult<Json<Vec<NotificationView>>> {
    if query.user_id.is_some_and(|id| id != principal.id) {
        return Err(DomainError::Unauthorized("notifications are private to their recipient".into()).into());
    }
    Ok(Json(state.services.notifications.list_for_user(principal.id).await?))
}

pub async fn unread_count(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
) -> ApiResult<Json<Value>> {
    let count = state.services.notifications.unread_count(principal.id).await?;
    Ok(Json(json!({ "count": count })))
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
) -> ApiResult<Json<Value>> {
    let updated = state.services.notifications.mark_all_read(principal.id).await?;
    Ok(Json(json!({ "updated": updated })))
}

pub async fn delete(
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.services.notifications.delete(id, &principal).await?;
    Ok(StatusCode::NO_CONTENT)
}
