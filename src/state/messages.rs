use super::AppState;
use crate::types::*;

fn now_timestamp() -> String {
    chrono::Local::now().format("%H:%M:%S").to_string()
}

impl AppState {
    /// Append a private message to the log. None when the target is unknown;
    /// an offline target still gets the message logged for later replay.
    pub async fn send_private_message(
        &self,
        from: &User,
        to: &str,
        text: String,
    ) -> Option<ChatMessage> {
        if !self.users.read().await.contains_key(to) {
            return None;
        }
        let message = ChatMessage {
            from: from.username.clone(),
            from_avatar: from.avatar.clone(),
            to: Some(to.to_string()),
            text,
            timestamp: now_timestamp(),
        };
        self.messages.write().await.push(message.clone());
        Some(message)
    }

    /// Append a global chat message to the log
    pub async fn send_global_message(&self, from: &User, text: String) -> ChatMessage {
        let message = ChatMessage {
            from: from.username.clone(),
            from_avatar: from.avatar.clone(),
            to: None,
            text,
            timestamp: now_timestamp(),
        };
        self.messages.write().await.push(message.clone());
        message
    }

    /// Messages exchanged between two users in either direction, in send
    /// order. Global messages and third parties never show up here.
    pub async fn history_between(&self, a: &str, b: &str) -> Vec<ChatMessage> {
        self.messages
            .read()
            .await
            .iter()
            .filter(|m| match &m.to {
                Some(to) => (m.from == a && to == b) || (m.from == b && to == a),
                None => false,
            })
            .cloned()
            .collect()
    }
}
