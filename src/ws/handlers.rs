//! WebSocket message dispatch
//!
//! One inbound event in, at most one direct reply out. Presence broadcasts
//! and emits targeted at other users leave through the state as side effects.
//! Operations on an unresolved caller or target are silent no-ops.

use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::AppState;
use crate::types::ConnId;
use std::sync::Arc;

/// Handle one client message and return the direct reply, if any
pub async fn handle_message(
    msg: ClientMessage,
    conn_id: &ConnId,
    state: &Arc<AppState>,
) -> Option<ServerMessage> {
    match msg {
        ClientMessage::Register { username, password } => {
            tracing::info!("register request for {}", username);
            match state.register(conn_id, username, password).await {
                Ok((user, token)) => {
                    state.broadcast_presence().await;
                    Some(ServerMessage::RegisterSuccess { user, token })
                }
                Err(e) => Some(ServerMessage::RegisterError {
                    message: e.to_string(),
                }),
            }
        }

        ClientMessage::Login { username, password } => {
            tracing::info!("login request for {}", username);
            match state.login(conn_id, &username, &password).await {
                Ok(outcome) => {
                    state.broadcast_presence().await;
                    Some(ServerMessage::LoginSuccess {
                        user: outcome.user,
                        token: outcome.token,
                        friends: outcome.friends,
                        requests: outcome.requests,
                    })
                }
                Err(e) => Some(ServerMessage::LoginError {
                    message: e.to_string(),
                }),
            }
        }

        ClientMessage::SearchUsers { query } => {
            let users = match state.current_user(conn_id).await {
                Some(caller) => state.search_users(&caller, &query).await,
                // No bound session: nothing to search against
                None => Vec::new(),
            };
            Some(ServerMessage::SearchResults { users })
        }

        ClientMessage::SendFriendRequest { target_username } => {
            let caller = state.current_user(conn_id).await?;
            let request = state
                .send_friend_request(&caller.username, &target_username)
                .await?;
            // Offline targets discover the request on their next login
            state
                .send_to_user(
                    &request.to,
                    ServerMessage::NewFriendRequest {
                        from: caller.username,
                        from_avatar: caller.avatar,
                    },
                )
                .await;
            Some(ServerMessage::FriendRequestSent)
        }

        ClientMessage::AcceptFriendRequest { from_username } => {
            let caller = state.current_user(conn_id).await?;
            let requester = state
                .accept_friend_request(&caller.username, &from_username)
                .await?;
            state.broadcast_presence().await;
            Some(ServerMessage::FriendAdded { user: requester })
        }

        ClientMessage::PrivateMessage { to, text } => {
            let caller = state.current_user(conn_id).await?;
            let message = state.send_private_message(&caller, &to, text).await?;
            state
                .send_to_user(
                    &to,
                    ServerMessage::NewPrivateMessage {
                        message: message.clone(),
                    },
                )
                .await;
            Some(ServerMessage::NewPrivateMessage { message })
        }

        ClientMessage::GlobalMessage { text } => {
            let caller = state.current_user(conn_id).await?;
            let message = state.send_global_message(&caller, text).await;
            // Sender is subscribed too, so the broadcast covers everyone
            let _ = state
                .broadcast
                .send(ServerMessage::NewGlobalMessage { message });
            None
        }

        ClientMessage::LoadChatHistory { friend_username } => {
            let caller = state.current_user(conn_id).await?;
            let messages = state
                .history_between(&caller.username, &friend_username)
                .await;
            Some(ServerMessage::ChatHistory {
                friend_id: friend_username,
                messages,
            })
        }
    }
}
