//! Ordered-list store interface backing the chat history.
//!
//! The domain defines the interface it needs; the infrastructure layer
//! provides the implementations (dependency inversion). Semantics follow a
//! Redis list: index 0 is the newest entry.

use async_trait::async_trait;
use thiserror::Error;

/// Error from the backing history store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("history store unavailable: {0}")]
    Unavailable(String),
}

/// Ordered-list store the chat history is persisted to.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Prepend an entry under the key.
    async fn push_front(&self, key: &str, value: String) -> Result<(), StoreError>;

    /// Number of entries under the key.
    async fn len(&self, key: &str) -> Result<usize, StoreError>;

    /// Remove and return the oldest entry.
    async fn pop_back(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Entries from `start` to `stop`, inclusive, newest first. Negative
    /// indices count from the oldest entry, `-1` being the oldest.
    async fn range(&self, key: &str, start: isize, stop: isize)
    -> Result<Vec<String>, StoreError>;

    /// Drop the key and every entry under it.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}
