use std::collections::HashSet;

use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::{
    auth::Principal,
    chat::events::{ServerEvent, TypingPayload},
    registry::ConnectionHandle,
    store, AppState,
};

/// Close code sent when the handshake credential does not resolve.
const CLOSE_AUTH_FAILURE: u16 = 4001;

#[derive(Debug, Deserialize)]
pub(crate) struct WsQuery {
    token: Option<String>,
}

/// Live-connection endpoint. The credential rides in as `?token=`; everything
/// after the handshake is JSON control frames.
pub(crate) async fn chat_ws(
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    let principal = match query.token {
        Some(token) => match state.sessions.resolve(&token).await {
            Ok(Some(principal)) if principal.active => Some(principal),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(error = %e, "session lookup failed during ws handshake");
                None
            }
        },
        None => None,
    };

    ws.on_upgrade(move |socket| run_session(state, principal, socket))
}

async fn run_session(state: AppState, principal: Option<Principal>, mut socket: WebSocket) {
    let Some(principal) = principal else {
        let _ = socket
            .send(Message::Close(Some(CloseFrame {
                code: CLOSE_AUTH_FAILURE,
                reason: "authentication failed".into(),
            })))
            .await;
        return;
    };

    let (mut sink, mut stream) = socket.split();
    let (conn, mut rx) = ConnectionHandle::new();

    // All outbound traffic (error replies and room broadcasts) funnels
    // through the connection's channel; this task owns the sink.
    let forward = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if sink.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
    });

    tracing::debug!(conn_id = %conn.id(), user_id = %principal.user_id, "ws session open");

    let mut subscribed: HashSet<Uuid> = HashSet::new();
    while let Some(Ok(msg)) = stream.next().await {
        let text = match msg {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };
        if let Some(reply) =
            handle_frame(&state, &principal, &conn, &mut subscribed, text.as_str()).await
        {
            if !conn.send_event(&reply) {
                break;
            }
        }
    }

    state
        .registry
        .unsubscribe_all(conn.id(), subscribed.iter().copied())
        .await;
    forward.abort();
    tracing::debug!(conn_id = %conn.id(), "ws session closed");
}

/// Dispatch one inbound control frame. Returns the error event to reply with,
/// if any; errors never close the connection.
async fn handle_frame(
    state: &AppState,
    principal: &Principal,
    conn: &ConnectionHandle,
    subscribed: &mut HashSet<Uuid>,
    raw: &str,
) -> Option<ServerEvent> {
    let Ok(frame) = serde_json::from_str::<Value>(raw) else {
        return Some(ServerEvent::error(
            "INVALID_JSON",
            "Request body must be valid JSON.",
        ));
    };

    let room_id = match frame.get("room_id") {
        None | Some(Value::Null) => {
            return Some(ServerEvent::error(
                "MISSING_ROOM_ID",
                "Missing required field: room_id.",
            ));
        }
        Some(value) => {
            if value.as_str() == Some("") {
                return Some(ServerEvent::error(
                    "MISSING_ROOM_ID",
                    "Missing required field: room_id.",
                ));
            }
            match value.as_str().and_then(|s| Uuid::parse_str(s).ok()) {
                Some(room_id) => room_id,
                None => {
                    return Some(ServerEvent::error(
                        "INVALID_ROOM_ID",
                        "room_id must be a valid UUID.",
                    ));
                }
            }
        }
    };

    // Membership is checked against persistence on every frame, never cached.
    let participant = match store::participants::get_by_room_and_user(
        &state.db_pool,
        room_id,
        principal.user_id,
    )
    .await
    {
        Ok(participant) => participant,
        Err(e) => {
            tracing::error!(%room_id, error = %e, "membership lookup failed");
            return Some(ServerEvent::error(
                "INTERNAL_ERROR",
                "Failed to check room membership.",
            ));
        }
    };
    if participant.is_none() {
        return Some(ServerEvent::error(
            "FORBIDDEN",
            "You are not a participant of this room.",
        ));
    }

    match frame.get("action").and_then(Value::as_str) {
        Some("subscribe") => {
            state.registry.subscribe(conn, room_id).await;
            subscribed.insert(room_id);
            None
        }
        Some("unsubscribe") => {
            state.registry.unsubscribe(conn.id(), room_id).await;
            subscribed.remove(&room_id);
            None
        }
        Some("typing") => {
            let typing = frame.get("typing").and_then(Value::as_bool).unwrap_or(false);
            state
                .registry
                .broadcast(
                    room_id,
                    &ServerEvent::UserTyping {
                        room_id,
                        payload: TypingPayload {
                            user_id: principal.user_id,
                            typing,
                        },
                    },
                    Some(conn.id()),
                )
                .await;
            None
        }
        _ => Some(ServerEvent::error(
            "UNKNOWN_ACTION",
            "Expected action: subscribe, unsubscribe, or typing.",
        )),
    }
}
