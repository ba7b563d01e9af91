pub mod handlers;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{sink::SinkExt, stream::StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::AppState;
use crate::types::ConnId;

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    let conn_id: ConnId = ulid::Ulid::new().to_string();
    tracing::info!("connection {} opened", conn_id);

    // Registry entry for targeted emits to this connection
    let (tx, mut direct_rx) = mpsc::unbounded_channel();
    state.register_conn(&conn_id, tx).await;

    // Presence updates and global chat reach every socket through this
    let mut broadcast_rx = state.broadcast.subscribe();

    loop {
        tokio::select! {
            // Fan-out to all connections
            broadcast_msg = broadcast_rx.recv() => {
                if let Ok(msg) = broadcast_msg {
                    if let Ok(json) = serde_json::to_string(&msg) {
                        if sender.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                }
            }

            // Messages addressed to this connection only
            direct_msg = direct_rx.recv() => {
                match direct_msg {
                    Some(msg) => {
                        if let Ok(json) = serde_json::to_string(&msg) {
                            if sender.send(Message::Text(json.into())).await.is_err() {
                                break;
                            }
                        }
                    }
                    None => break,
                }
            }

            // Handle client messages
            ws_msg = receiver.next() => {
                match ws_msg {
                    Some(Ok(Message::Text(text))) => {
                        tracing::debug!("connection {} received: {}", conn_id, text);

                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(client_msg) => {
                                if let Some(response) =
                                    handlers::handle_message(client_msg, &conn_id, &state).await
                                {
                                    if let Ok(json) = serde_json::to_string(&response) {
                                        if sender.send(Message::Text(json.into())).await.is_err() {
                                            tracing::error!("failed to send response on {}", conn_id);
                                            break;
                                        }
                                    }
                                }
                            }
                            Err(e) => {
                                tracing::error!("failed to parse client message: {}", e);
                                let error = ServerMessage::Error {
                                    code: "PARSE_ERROR".to_string(),
                                    msg: format!("Invalid message format: {}", e),
                                };
                                if let Ok(json) = serde_json::to_string(&error) {
                                    let _ = sender.send(Message::Text(json.into())).await;
                                }
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        tracing::info!("connection {} closed by client", conn_id);
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::error!("websocket error on {}: {}", conn_id, e);
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    // Session teardown only matters when a user was actually bound here
    if let Some(user) = state.disconnect(&conn_id).await {
        tracing::info!("{} went offline", user.username);
        state.broadcast_presence().await;
    }
    tracing::info!("connection {} closed", conn_id);
}
