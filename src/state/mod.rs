mod account;
mod friends;
mod messages;

pub use account::{CredentialError, LoginOutcome};

use crate::protocol::ServerMessage;
use crate::types::*;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, RwLock};

/// Handle to one live socket: its outbound queue plus the session bound to it
pub struct ConnHandle {
    pub tx: mpsc::UnboundedSender<ServerMessage>,
    pub session: Option<SessionToken>,
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<RwLock<HashMap<Username, User>>>,
    pub requests: Arc<RwLock<Vec<FriendRequest>>>,
    /// Append-only message log, private and global interleaved in send order
    pub messages: Arc<RwLock<Vec<ChatMessage>>>,
    /// Session token -> username; a token lives from login to disconnect
    pub sessions: Arc<RwLock<HashMap<SessionToken, Username>>>,
    /// Connection id -> live socket handle
    pub conns: Arc<RwLock<HashMap<ConnId, ConnHandle>>>,
    /// Username -> connection id, maintained on login/register/disconnect
    pub online: Arc<RwLock<HashMap<Username, ConnId>>>,
    /// Broadcast channel for presence updates and global chat
    pub broadcast: broadcast::Sender<ServerMessage>,
}

impl AppState {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(100);
        Self {
            users: Arc::new(RwLock::new(HashMap::new())),
            requests: Arc::new(RwLock::new(Vec::new())),
            messages: Arc::new(RwLock::new(Vec::new())),
            sessions: Arc::new(RwLock::new(HashMap::new())),
            conns: Arc::new(RwLock::new(HashMap::new())),
            online: Arc::new(RwLock::new(HashMap::new())),
            broadcast: tx,
        }
    }

    /// Register a freshly accepted socket with the coordinator
    pub async fn register_conn(&self, conn_id: &ConnId, tx: mpsc::UnboundedSender<ServerMessage>) {
        self.conns
            .write()
            .await
            .insert(conn_id.clone(), ConnHandle { tx, session: None });
    }

    /// Send to a single user's live connection, if they have one
    pub async fn send_to_user(&self, username: &str, msg: ServerMessage) {
        let conn_id = self.online.read().await.get(username).cloned();
        if let Some(conn_id) = conn_id {
            if let Some(handle) = self.conns.read().await.get(&conn_id) {
                // Receiver gone means the socket task is shutting down
                let _ = handle.tx.send(msg);
            }
        }
    }

    /// Presence broadcast: resend the full user collection to every connection
    pub async fn broadcast_presence(&self) {
        let users = self.all_users().await;
        let _ = self.broadcast.send(ServerMessage::UsersUpdate { users });
    }

    /// All registered users, ordered by username for stable client rendering
    pub async fn all_users(&self) -> Vec<User> {
        let users = self.users.read().await;
        let mut list: Vec<User> = users.values().cloned().collect();
        list.sort_by(|a, b| a.username.cmp(&b.username));
        list
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Register a fake socket and keep the receiving half for assertions
    async fn connect(state: &AppState) -> (ConnId, mpsc::UnboundedReceiver<ServerMessage>) {
        let conn_id = ulid::Ulid::new().to_string();
        let (tx, rx) = mpsc::unbounded_channel();
        state.register_conn(&conn_id, tx).await;
        (conn_id, rx)
    }

    #[tokio::test]
    async fn test_register_assigns_avatar_and_session() {
        let state = AppState::new();
        let (conn, _rx) = connect(&state).await;

        let (user, token) = state
            .register(&conn, "alice".to_string(), "p1".to_string())
            .await
            .unwrap();

        assert_eq!(user.username, "alice");
        assert!(user.online);
        assert!(user.friends.is_empty());
        assert!(AVATARS.contains(&user.avatar.as_str()));
        assert_eq!(
            state.sessions.read().await.get(&token),
            Some(&"alice".to_string())
        );
        assert!(state.current_user(&conn).await.is_some());
    }

    #[tokio::test]
    async fn test_duplicate_username_rejected() {
        let state = AppState::new();
        let (conn_a, _rx_a) = connect(&state).await;
        let (conn_b, _rx_b) = connect(&state).await;

        state
            .register(&conn_a, "alice".to_string(), "p1".to_string())
            .await
            .unwrap();
        let result = state
            .register(&conn_b, "alice".to_string(), "p2".to_string())
            .await;

        assert_eq!(result.unwrap_err(), CredentialError::UsernameTaken);
        // User table unchanged, original password intact
        let users = state.users.read().await;
        assert_eq!(users.len(), 1);
        assert_eq!(users.get("alice").unwrap().password, "p1");
    }

    #[tokio::test]
    async fn test_login_checks_credentials() {
        let state = AppState::new();
        let (conn, _rx) = connect(&state).await;
        state
            .register(&conn, "alice".to_string(), "p1".to_string())
            .await
            .unwrap();
        state.disconnect(&conn).await;

        let (conn2, _rx2) = connect(&state).await;
        let wrong = state.login(&conn2, "alice", "nope").await;
        assert_eq!(wrong.unwrap_err(), CredentialError::BadCredentials);
        assert!(!state.users.read().await.get("alice").unwrap().online);

        let outcome = state.login(&conn2, "alice", "p1").await.unwrap();
        assert!(outcome.user.online);
        assert!(state.users.read().await.get("alice").unwrap().online);
    }

    #[tokio::test]
    async fn test_disconnect_flips_offline_and_revokes_token() {
        let state = AppState::new();
        let (conn, _rx) = connect(&state).await;
        let (_, token) = state
            .register(&conn, "alice".to_string(), "p1".to_string())
            .await
            .unwrap();

        let user = state.disconnect(&conn).await.unwrap();
        assert!(!user.online);
        assert!(state.sessions.read().await.get(&token).is_none());
        assert!(state.online.read().await.get("alice").is_none());
        assert!(state.conns.read().await.get(&conn).is_none());
    }

    #[tokio::test]
    async fn test_last_login_wins() {
        let state = AppState::new();
        let (conn_a, _rx_a) = connect(&state).await;
        let (_, old_token) = state
            .register(&conn_a, "alice".to_string(), "p1".to_string())
            .await
            .unwrap();

        // Second connection logs in as the same user
        let (conn_b, _rx_b) = connect(&state).await;
        let outcome = state.login(&conn_b, "alice", "p1").await.unwrap();
        assert_ne!(outcome.token, old_token);
        assert!(state.sessions.read().await.get(&old_token).is_none());
        assert_eq!(state.online.read().await.get("alice"), Some(&conn_b));

        // The stale connection closing must not knock the new session offline
        assert!(state.disconnect(&conn_a).await.is_none());
        assert!(state.users.read().await.get("alice").unwrap().online);
    }

    #[tokio::test]
    async fn test_accept_makes_friendship_symmetric() {
        let state = AppState::new();
        let (conn_a, _rx_a) = connect(&state).await;
        let (conn_b, _rx_b) = connect(&state).await;
        state
            .register(&conn_a, "alice".to_string(), "p".to_string())
            .await
            .unwrap();
        state
            .register(&conn_b, "bob".to_string(), "p".to_string())
            .await
            .unwrap();

        state.send_friend_request("bob", "alice").await.unwrap();
        let requester = state.accept_friend_request("alice", "bob").await.unwrap();
        assert_eq!(requester.username, "bob");

        let users = state.users.read().await;
        assert!(users.get("alice").unwrap().friends.contains("bob"));
        assert!(users.get("bob").unwrap().friends.contains("alice"));
        drop(users);

        // Request consumed, repeat accept is a no-op
        assert!(state.requests.read().await.is_empty());
        assert!(state.accept_friend_request("alice", "bob").await.is_none());
    }

    #[tokio::test]
    async fn test_friend_request_to_unknown_user_is_noop() {
        let state = AppState::new();
        let (conn, _rx) = connect(&state).await;
        state
            .register(&conn, "alice".to_string(), "p".to_string())
            .await
            .unwrap();

        assert!(state.send_friend_request("alice", "ghost").await.is_none());
        assert!(state.requests.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_pending_request_survives_for_next_login() {
        let state = AppState::new();
        let (conn_a, _rx_a) = connect(&state).await;
        let (conn_b, _rx_b) = connect(&state).await;
        state
            .register(&conn_a, "alice".to_string(), "p".to_string())
            .await
            .unwrap();
        state
            .register(&conn_b, "bob".to_string(), "p".to_string())
            .await
            .unwrap();
        state.disconnect(&conn_b).await;

        state.send_friend_request("alice", "bob").await.unwrap();

        let (conn_b2, _rx_b2) = connect(&state).await;
        let outcome = state.login(&conn_b2, "bob", "p").await.unwrap();
        assert_eq!(outcome.requests.len(), 1);
        assert_eq!(outcome.requests[0].from, "alice");
        assert!(!outcome.requests[0].from_avatar.is_empty());
    }

    #[tokio::test]
    async fn test_search_excludes_caller_and_friends() {
        let state = AppState::new();
        let (conn, _rx) = connect(&state).await;
        for name in ["anna", "annabel", "bob"] {
            let (c, _r) = connect(&state).await;
            state
                .register(&c, name.to_string(), "p".to_string())
                .await
                .unwrap();
        }
        let (caller, _) = state
            .register(&conn, "ann".to_string(), "p".to_string())
            .await
            .unwrap();

        let hits = state.search_users(&caller, "ann").await;
        let names: Vec<_> = hits.iter().map(|u| u.username.as_str()).collect();
        assert_eq!(names, vec!["anna", "annabel"]);

        // Friends drop out of results
        state.send_friend_request("anna", "ann").await.unwrap();
        state.accept_friend_request("ann", "anna").await.unwrap();
        let caller = state.users.read().await.get("ann").unwrap().clone();
        let hits = state.search_users(&caller, "ann").await;
        let names: Vec<_> = hits.iter().map(|u| u.username.as_str()).collect();
        assert_eq!(names, vec!["annabel"]);
    }

    #[tokio::test]
    async fn test_history_is_symmetric_and_scoped_to_the_pair() {
        let state = AppState::new();
        let mut people = HashMap::new();
        for name in ["alice", "bob", "carol"] {
            let (c, _r) = connect(&state).await;
            let (user, _) = state
                .register(&c, name.to_string(), "p".to_string())
                .await
                .unwrap();
            people.insert(name, user);
        }

        state
            .send_private_message(&people["alice"], "bob", "hi bob".to_string())
            .await
            .unwrap();
        state
            .send_private_message(&people["bob"], "alice", "hi alice".to_string())
            .await
            .unwrap();
        state
            .send_private_message(&people["alice"], "carol", "hi carol".to_string())
            .await
            .unwrap();
        state
            .send_global_message(&people["carol"], "hi everyone".to_string())
            .await;

        let from_alice = state.history_between("alice", "bob").await;
        let from_bob = state.history_between("bob", "alice").await;
        let texts: Vec<_> = from_alice.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["hi bob", "hi alice"]);
        assert_eq!(from_alice.len(), from_bob.len());
        for (a, b) in from_alice.iter().zip(from_bob.iter()) {
            assert_eq!(a.text, b.text);
            assert_eq!(a.from, b.from);
        }
    }

    #[tokio::test]
    async fn test_private_message_to_unknown_user_is_noop() {
        let state = AppState::new();
        let (conn, _rx) = connect(&state).await;
        let (alice, _) = state
            .register(&conn, "alice".to_string(), "p".to_string())
            .await
            .unwrap();

        assert!(state
            .send_private_message(&alice, "ghost", "anyone?".to_string())
            .await
            .is_none());
        assert!(state.messages.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_offline_recipient_message_retained_in_log() {
        let state = AppState::new();
        let (conn_a, _rx_a) = connect(&state).await;
        let (conn_b, mut rx_b) = connect(&state).await;
        let (alice, _) = state
            .register(&conn_a, "alice".to_string(), "p".to_string())
            .await
            .unwrap();
        state
            .register(&conn_b, "bob".to_string(), "p".to_string())
            .await
            .unwrap();
        state.disconnect(&conn_b).await;

        let msg = state
            .send_private_message(&alice, "bob", "you there?".to_string())
            .await
            .unwrap();
        state.send_to_user("bob", ServerMessage::NewPrivateMessage { message: msg }).await;

        // No live delivery, but the log has it for later replay
        assert!(rx_b.try_recv().is_err());
        let history = state.history_between("bob", "alice").await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].text, "you there?");
    }
}
