use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use domains::{ConversationSummary, DirectMessage};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::Authenticated;
use crate::error::ApiResult;
use crate::state::AppState;

/// Body of a send. `body` holds plaintext or base64 ciphertext; `isEncrypted`
/// says which, and is stored with the message.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageBody {
    pub receiver_id: Uuid,
    #[serde(alias = "content")]
    pub body: String,
    #[serde(default)]
    pub is_encrypted: bool,
}

pub async fn send(
    State(state): State<AppState>,
    Authenticated(sender): Authenticated,
    Json(body): Json<SendMessageBody>,
) -> ApiResult<impl IntoResponse> {
    let message = state
        .services
        .messages
        .send(&sender, body.receiver_id, body.body, body.is_encrypted)
        .await?;
    Ok((StatusCode::CREATED, Json(message)))
}

pub async fn history(
    State(state): State<AppState>,
    Authenticated(requester): Authenticated,
    Path((user_id, other_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<Vec<DirectMessage>>> {
    Ok(Json(
        state
            .services
            .messages
            .history(&requester, user_id, other_id)
            .await?,
    ))
}

pub async fn conversations(
    State(state): State<AppState>,
    Authenticated(requester): Authenticated,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<Vec<ConversationSummary>>> {
    Ok(Json(
        state
            .services
            .messages
            .conversations(&requester, user_id)
            .await?,
    ))
}
