//! The live channel.
//!
//! Browsers cannot set headers on a WebSocket handshake, so the bearer token
//! travels in `?token=`. The connection is registered on the bus under the
//! token's identity before the upgrade completes and is released when the
//! socket task ends.

use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use services::LiveConnection;
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

const HEARTBEAT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
pub struct LiveQuery {
    pub token: String,
}

pub async fn upgrade(
    State(state): State<AppState>,
    Query(query): Query<LiveQuery>,
    ws: WebSocketUpgrade,
) -> ApiResult<Response> {
    let principal = state
        .services
        .identity
        .authenticate(&query.token)
        .await
        .map_err(ApiError::from_auth)?;
    let connection = state.services.bus.connect(principal.id);
    Ok(ws.on_upgrade(move |socket| serve_connection(socket, connection)))
}

async fn serve_connection(socket: WebSocket, mut connection: LiveConnection) {
    let (mut sender, mut receiver) = socket.split();
    let identity = connection.identity();
    info!(%identity, connection = connection.id(), "live connection opened");

    let mut heartbeat = interval(HEARTBEAT);
    heartbeat.tick().await;

    loop {
        tokio::select! {
            frame = connection.recv() => {
                let Some(frame) = frame else { break };
                if sender.send(Message::Text(frame.to_string().into())).await.is_err() {
                    break;
                }
            }

            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(Message::Text(text))) => {
                        debug!(%identity, len = text.len(), "ignoring client text frame");
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(%identity, error = %e, "live socket error");
                        break;
                    }
                }
            }

            _ = heartbeat.tick() => {
                if sender.send(Message::Ping(Default::default())).await.is_err() {
                    break;
                }
            }
        }
    }

    info!(%identity, connection = connection.id(), "live connection closed");
}
