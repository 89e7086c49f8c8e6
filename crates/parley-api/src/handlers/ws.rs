//! WebSocket upgrade handler.

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tracing::{debug, error, info, warn};

use parley_auth::AuthenticatedUser;
use parley_realtime::message::serializer::serialize_outbound;

use crate::error::ApiError;
use crate::state::AppState;

/// Query parameter for WebSocket authentication.
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// Session token issued by the identity service.
    pub token: String,
}

/// GET /ws?token={jwt}
///
/// The token is verified before the upgrade; a bad token gets a plain 401.
pub async fn ws_upgrade(
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let user = state.jwt_decoder.authenticate(&query.token)?;
    let transport_cap = state.hub.config().max_transport_frame_bytes;

    Ok(ws
        .max_message_size(transport_cap)
        .max_frame_size(transport_cap)
        .on_upgrade(move |socket| handle_socket(state, user, socket)))
}

/// Drives one established connection until either side closes it.
///
/// Inbound frames are dispatched sequentially, which keeps a connection's
/// events in arrival order. Outbound events are drained from the
/// connection's queue by a separate writer task.
async fn handle_socket(state: AppState, user: AuthenticatedUser, socket: WebSocket) {
    let registration = state.hub.connect(user.user_id, user.username);
    let handle = registration.handle;
    let mut outbound_rx = registration.receiver;
    let conn_id = handle.id;
    let closed = handle.close_token();

    info!(
        conn_id = %conn_id,
        user_id = %handle.user_id,
        "WebSocket connection established"
    );

    let (mut ws_tx, mut ws_rx) = socket.split();

    let writer_closed = closed.clone();
    let writer = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = writer_closed.cancelled() => break,
                next = outbound_rx.recv() => {
                    let Some(msg) = next else { break };
                    let text = match serialize_outbound(&msg) {
                        Ok(text) => text,
                        Err(e) => {
                            error!(conn_id = %conn_id, error = %e, "Dropping unserializable event");
                            continue;
                        }
                    };
                    if ws_tx.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
            }
        }
        let _ = ws_tx.send(Message::Close(None)).await;
    });

    loop {
        tokio::select! {
            _ = closed.cancelled() => {
                debug!(conn_id = %conn_id, "Connection closed by hub");
                break;
            }
            frame = ws_rx.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    state.hub.dispatch(&conn_id, text.as_str()).await;
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => state.hub.touch(&conn_id),
                Some(Ok(Message::Binary(_))) => {
                    debug!(conn_id = %conn_id, "Ignoring binary frame");
                    state.hub.touch(&conn_id);
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    warn!(conn_id = %conn_id, error = %e, "WebSocket error");
                    break;
                }
            }
        }
    }

    state.hub.disconnect(&conn_id);
    let _ = writer.await;

    info!(conn_id = %conn_id, "WebSocket connection closed");
}
