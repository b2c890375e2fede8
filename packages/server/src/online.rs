//! Registry of currently connected, authenticated users.

use std::collections::HashSet;

use tokio::sync::Mutex;

/// Set of user ids with an open, authenticated chat connection.
pub struct OnlineRegistry {
    users: Mutex<HashSet<String>>,
}

impl OnlineRegistry {
    pub fn new() -> Self {
        Self {
            users: Mutex::new(HashSet::new()),
        }
    }

    pub async fn insert(&self, user_id: String) {
        let mut users = self.users.lock().await;
        users.insert(user_id);
    }

    /// Returns whether the user was present.
    pub async fn remove(&self, user_id: &str) -> bool {
        let mut users = self.users.lock().await;
        users.remove(user_id)
    }

    pub async fn snapshot(&self) -> Vec<String> {
        let users = self.users.lock().await;
        users.iter().cloned().collect()
    }
}

impl Default for OnlineRegistry {
    fn default() -> Self {
        Self::new()
    }
}
