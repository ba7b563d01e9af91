use crate::types::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ClientMessage {
    Register {
        username: String,
        password: String,
    },
    Login {
        username: String,
        password: String,
    },
    /// Substring search over usernames, excluding the caller and their friends
    SearchUsers {
        query: String,
    },
    SendFriendRequest {
        target_username: String,
    },
    AcceptFriendRequest {
        from_username: String,
    },
    PrivateMessage {
        to: String,
        text: String,
    },
    GlobalMessage {
        text: String,
    },
    LoadChatHistory {
        friend_username: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ServerMessage {
    RegisterSuccess {
        user: User,
        token: SessionToken,
    },
    RegisterError {
        message: String,
    },
    LoginSuccess {
        user: User,
        token: SessionToken,
        friends: Vec<User>,
        requests: Vec<FriendRequestInfo>,
    },
    LoginError {
        message: String,
    },
    /// Presence broadcast: full resend of the user collection to everyone
    UsersUpdate {
        users: Vec<User>,
    },
    SearchResults {
        users: Vec<User>,
    },
    /// Ack to the caller; the target sees NewFriendRequest if online
    FriendRequestSent,
    NewFriendRequest {
        from: Username,
        from_avatar: String,
    },
    FriendAdded {
        user: User,
    },
    NewPrivateMessage {
        message: ChatMessage,
    },
    NewGlobalMessage {
        message: ChatMessage,
    },
    ChatHistory {
        friend_id: Username,
        messages: Vec<ChatMessage>,
    },
    Error {
        code: String,
        msg: String,
    },
}

/// Pending request as shown to its recipient, live or on next login
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FriendRequestInfo {
    pub from: Username,
    pub from_avatar: String,
}
