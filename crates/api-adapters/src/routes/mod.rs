//! Route table.

mod health;
mod identities;
mod live;
mod messages;
mod notifications;
mod posts;

use axum::body::Bytes;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post, put};
use axum::Router;
use domains::DomainError;
use serde::de::DeserializeOwned;
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};

use crate::error::ApiResult;
use crate::metrics::track_requests;
use crate::middleware::{cors_policy, trace_layer};
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/metrics", get(health::metrics))
        // identities
        .route("/identities/register", post(identities::register))
        .route("/identities/login", post(identities::login))
        .route("/identities/search", get(identities::search))
        .route("/identities/by-username/{username}", get(identities::profile_by_username))
        .route("/identities/{id}", get(identities::profile))
        .route("/identities/{id}/follow", post(identities::toggle_follow))
        .route("/identities/{id}/followers", get(identities::followers))
        .route("/identities/{id}/following", get(identities::following))
        .route(
            "/identities/{id}/public-key",
            put(identities::register_public_key).get(identities::public_key),
        )
        .route("/identities/{id}/suspend", post(identities::toggle_suspension))
        // content
        .route("/posts", get(posts::feed).post(posts::create))
        .route("/posts/analytics/trending", get(posts::trending))
        .route("/posts/tree/{root_id}", get(posts::tree))
        .route(
            "/posts/{id}",
            get(posts::get_one).patch(posts::edit).delete(posts::delete),
        )
        .route("/posts/{id}/like", post(posts::toggle_like))
        .route("/posts/{id}/status", put(posts::set_status))
        // notifications
        .route("/notifications", get(notifications::list))
        .route("/notifications/unread-count", get(notifications::unread_count))
        .route("/notifications/mark-read", post(notifications::mark_all_read))
        .route(
            "/notifications/{id}",
            axum::routing::delete(notifications::delete),
        )
        // direct messages
        .route("/messages", post(messages::send))
        .route("/messages/conversations/{user_id}", get(messages::conversations))
        .route("/messages/{user_id}/{other_id}", get(messages::history))
        // live channel
        .route("/live", get(live::upgrade))
        .layer(from_fn_with_state(state.metrics.clone(), track_requests))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(trace_layer())
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(cors_policy()),
        )
        .with_state(state)
}

/// Decodes a JSON body that the client may leave out entirely.
fn optional_body<T: DeserializeOwned + Default>(body: &Bytes) -> ApiResult<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| DomainError::Validation(format!("malformed request body: {e}")).into())
}
