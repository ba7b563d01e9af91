use super::AppState;
use crate::protocol::FriendRequestInfo;
use crate::types::*;

impl AppState {
    /// Substring match over usernames, excluding the caller and anyone
    /// already on their friends list
    pub async fn search_users(&self, caller: &User, query: &str) -> Vec<User> {
        let users = self.users.read().await;
        let mut hits: Vec<User> = users
            .values()
            .filter(|u| u.username.contains(query))
            .filter(|u| u.username != caller.username && !caller.friends.contains(&u.username))
            .cloned()
            .collect();
        hits.sort_by(|a, b| a.username.cmp(&b.username));
        hits
    }

    /// Record a pending request. None when the target does not exist.
    pub async fn send_friend_request(&self, from: &str, to: &str) -> Option<FriendRequest> {
        if !self.users.read().await.contains_key(to) {
            return None;
        }
        let request = FriendRequest {
            from: from.to_string(),
            to: to.to_string(),
        };
        self.requests.write().await.push(request.clone());
        Some(request)
    }

    /// Consume the pending request from `from` to `caller` and add both
    /// directions of the friendship atomically. None when the exact pair is
    /// not pending (a repeat accept lands here), otherwise the requester.
    pub async fn accept_friend_request(&self, caller: &str, from: &str) -> Option<User> {
        {
            let users = self.users.read().await;
            if !users.contains_key(caller) || !users.contains_key(from) {
                return None;
            }
        }

        {
            let mut requests = self.requests.write().await;
            let before = requests.len();
            requests.retain(|r| !(r.from == from && r.to == caller));
            if requests.len() == before {
                return None;
            }
        }

        let mut users = self.users.write().await;
        if let Some(user) = users.get_mut(caller) {
            user.friends.insert(from.to_string());
        }
        if let Some(user) = users.get_mut(from) {
            user.friends.insert(caller.to_string());
        }
        users.get(from).cloned()
    }

    /// Pending requests addressed to a user, shaped for client display
    pub async fn requests_for(&self, username: &str) -> Vec<FriendRequestInfo> {
        let requests = self.requests.read().await;
        let users = self.users.read().await;
        requests
            .iter()
            .filter(|r| r.to == username)
            .map(|r| FriendRequestInfo {
                from: r.from.clone(),
                from_avatar: users
                    .get(&r.from)
                    .map(|u| u.avatar.clone())
                    .unwrap_or_default(),
            })
            .collect()
    }
}
