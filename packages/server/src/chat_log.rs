//! Bounded chat history on top of a [`HistoryStore`].

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::domain::{HistoryStore, StoreError};

/// Default number of messages kept before the oldest is evicted.
pub const DEFAULT_HISTORY_CAP: usize = 100;

/// Default store key for the chat room's history list.
pub const DEFAULT_HISTORY_KEY: &str = "chat_history";

/// Append-and-trim chat history, newest first.
///
/// Appends are serialized through a lock so the push and the trim that may
/// follow it act as one step even with many concurrent writers.
pub struct ChatLog {
    store: Arc<dyn HistoryStore>,
    key: String,
    cap: usize,
    append_lock: Mutex<()>,
}

impl ChatLog {
    pub fn new(store: Arc<dyn HistoryStore>, key: impl Into<String>, cap: usize) -> Self {
        Self {
            store,
            key: key.into(),
            cap,
            append_lock: Mutex::new(()),
        }
    }

    /// Record a serialized message, evicting the oldest entry past the cap.
    pub async fn append(&self, serialized: String) -> Result<(), StoreError> {
        let _guard = self.append_lock.lock().await;
        self.store.push_front(&self.key, serialized).await?;
        if self.store.len(&self.key).await? > self.cap {
            self.store.pop_back(&self.key).await?;
        }
        Ok(())
    }

    /// Fetch up to `limit` messages, newest first.
    pub async fn recent(&self, limit: i64) -> Result<Vec<String>, StoreError> {
        if limit <= 0 {
            return Ok(Vec::new());
        }
        self.store.range(&self.key, 0, (limit - 1) as isize).await
    }

    pub async fn clear(&self) -> Result<(), StoreError> {
        self.store.delete(&self.key).await
    }
}
