use super::AppState;
use crate::protocol::FriendRequestInfo;
use crate::types::*;
use rand::Rng;
use std::collections::HashSet;
use thiserror::Error;

/// Failures surfaced to the client as register_error / login_error strings
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CredentialError {
    #[error("Username already taken")]
    UsernameTaken,
    #[error("Invalid username or password")]
    BadCredentials,
}

fn pick_avatar() -> String {
    let mut rng = rand::rng();
    AVATARS[rng.random_range(0..AVATARS.len())].to_string()
}

/// Everything a fresh login needs to render in one round trip
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub user: User,
    pub token: SessionToken,
    pub friends: Vec<User>,
    pub requests: Vec<FriendRequestInfo>,
}

impl AppState {
    /// Create a user and bring them online on this connection.
    /// Usernames are unique and immutable once taken.
    pub async fn register(
        &self,
        conn_id: &ConnId,
        username: String,
        password: String,
    ) -> Result<(User, SessionToken), CredentialError> {
        let user = {
            let mut users = self.users.write().await;
            if users.contains_key(&username) {
                return Err(CredentialError::UsernameTaken);
            }
            let user = User {
                username: username.clone(),
                password,
                avatar: pick_avatar(),
                friends: HashSet::new(),
                online: true,
            };
            users.insert(username, user.clone());
            user
        };

        let token = self.bind_session(conn_id, &user.username).await;
        Ok((user, token))
    }

    /// Exact username+password match brings the user online on this
    /// connection and returns their social graph for the client to render.
    pub async fn login(
        &self,
        conn_id: &ConnId,
        username: &str,
        password: &str,
    ) -> Result<LoginOutcome, CredentialError> {
        let user = {
            let mut users = self.users.write().await;
            let user = users
                .get_mut(username)
                .filter(|u| u.password == password)
                .ok_or(CredentialError::BadCredentials)?;
            user.online = true;
            user.clone()
        };

        let token = self.bind_session(conn_id, username).await;

        let friends = {
            let users = self.users.read().await;
            let mut friends: Vec<User> = user
                .friends
                .iter()
                .filter_map(|name| users.get(name).cloned())
                .collect();
            friends.sort_by(|a, b| a.username.cmp(&b.username));
            friends
        };
        let requests = self.requests_for(username).await;

        Ok(LoginOutcome {
            user,
            token,
            friends,
            requests,
        })
    }

    /// Resolve the user bound to a connection, if any
    pub async fn current_user(&self, conn_id: &ConnId) -> Option<User> {
        let token = self.conns.read().await.get(conn_id)?.session.clone()?;
        let username = self.sessions.read().await.get(&token).cloned()?;
        self.users.read().await.get(&username).cloned()
    }

    /// Tear down a closed connection: revoke its session, flip the user
    /// offline, drop the registry entry. Returns the user whose presence
    /// changed, or None when the connection had no live session (including
    /// sessions already superseded by a newer login).
    pub async fn disconnect(&self, conn_id: &ConnId) -> Option<User> {
        let handle = self.conns.write().await.remove(conn_id)?;
        let token = handle.session?;
        let username = self.sessions.write().await.remove(&token)?;

        let mut online = self.online.write().await;
        if online.get(&username) == Some(conn_id) {
            online.remove(&username);
        }
        drop(online);

        let mut users = self.users.write().await;
        let user = users.get_mut(&username)?;
        user.online = false;
        Some(user.clone())
    }

    /// Issue a fresh session token and bind it to this connection.
    /// Any prior session for the username is revoked: last login wins.
    async fn bind_session(&self, conn_id: &ConnId, username: &str) -> SessionToken {
        let token = ulid::Ulid::new().to_string();

        // A connection re-authenticating drops whatever session it held
        let prior = self
            .conns
            .read()
            .await
            .get(conn_id)
            .and_then(|h| h.session.clone());

        {
            let mut sessions = self.sessions.write().await;
            if let Some(prior) = prior {
                sessions.remove(&prior);
            }
            sessions.retain(|_, bound| bound != username);
            sessions.insert(token.clone(), username.to_string());
        }

        let previous = {
            let mut online = self.online.write().await;
            online.retain(|name, id| *id != *conn_id || name.as_str() == username);
            online.insert(username.to_string(), conn_id.clone())
        };

        let mut conns = self.conns.write().await;
        if let Some(prev_id) = previous.filter(|prev_id| prev_id != conn_id) {
            if let Some(handle) = conns.get_mut(&prev_id) {
                handle.session = None;
            }
        }
        if let Some(handle) = conns.get_mut(conn_id) {
            handle.session = Some(token.clone());
        }

        token
    }
}
