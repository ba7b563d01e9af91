use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Opaque ID types for type safety
pub type Username = String;
pub type ConnId = String;
pub type SessionToken = String;

/// Fixed avatar palette; one symbol is assigned at registration and never changes
pub const AVATARS: &[&str] = &[
    "🦊", "🐼", "🐸", "🦉", "🐯", "🐙", "🦄", "🐺", "🐱", "🐢", "🦜", "🐝",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub username: Username,
    /// Plaintext, compared verbatim on login. Never serialized outbound.
    #[serde(skip_serializing, default)]
    pub password: String,
    pub avatar: String,
    pub friends: HashSet<Username>,
    pub online: bool,
}

/// One-directional pending relationship, resolved only by an explicit accept
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FriendRequest {
    pub from: Username,
    pub to: Username,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub from: Username,
    pub from_avatar: String,
    /// Absent for global chat messages
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<Username>,
    pub text: String,
    /// Human-readable local send time
    pub timestamp: String,
}
