//! In-process history store backed by per-key deques.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{HistoryStore, StoreError};

/// List store kept entirely in memory. Contents do not survive a restart.
pub struct InMemoryHistoryStore {
    lists: Mutex<HashMap<String, VecDeque<String>>>,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self {
            lists: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryHistoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn push_front(&self, key: &str, value: String) -> Result<(), StoreError> {
        let mut lists = self.lists.lock().await;
        lists.entry(key.to_string()).or_default().push_front(value);
        Ok(())
    }

    async fn len(&self, key: &str) -> Result<usize, StoreError> {
        let lists = self.lists.lock().await;
        Ok(lists.get(key).map(VecDeque::len).unwrap_or(0))
    }

    async fn pop_back(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut lists = self.lists.lock().await;
        Ok(lists.get_mut(key).and_then(VecDeque::pop_back))
    }

    async fn range(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<String>, StoreError> {
        let lists = self.lists.lock().await;
        let Some(list) = lists.get(key) else {
            return Ok(Vec::new());
        };

        let len = list.len() as isize;
        let resolve = |index: isize| if index < 0 { index + len } else { index };
        let start = resolve(start).max(0);
        let stop = resolve(stop).min(len - 1);
        if start > stop {
            return Ok(Vec::new());
        }
        Ok(list
            .iter()
            .skip(start as usize)
            .take((stop - start + 1) as usize)
            .cloned()
            .collect())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut lists = self.lists.lock().await;
        lists.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_push_front_orders_newest_first() {
        // given:
        let store = InMemoryHistoryStore::new();

        // when:
        store.push_front("k", "one".to_string()).await.unwrap();
        store.push_front("k", "two".to_string()).await.unwrap();

        // then:
        assert_eq!(store.len("k").await.unwrap(), 2);
        assert_eq!(
            store.range("k", 0, -1).await.unwrap(),
            vec!["two".to_string(), "one".to_string()]
        );
    }

    #[tokio::test]
    async fn test_range_is_inclusive_and_clamped() {
        // given:
        let store = InMemoryHistoryStore::new();
        for value in ["a", "b", "c"] {
            store.push_front("k", value.to_string()).await.unwrap();
        }

        // when / then: stop past the end is clamped
        assert_eq!(
            store.range("k", 0, 1).await.unwrap(),
            vec!["c".to_string(), "b".to_string()]
        );
        assert_eq!(store.range("k", 1, 100).await.unwrap().len(), 2);
        assert!(store.range("k", 2, 1).await.unwrap().is_empty());
        assert!(store.range("missing", 0, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_pop_back_drops_the_oldest() {
        // given:
        let store = InMemoryHistoryStore::new();
        store.push_front("k", "old".to_string()).await.unwrap();
        store.push_front("k", "new".to_string()).await.unwrap();

        // when / then:
        assert_eq!(store.pop_back("k").await.unwrap(), Some("old".to_string()));
        assert_eq!(store.pop_back("k").await.unwrap(), Some("new".to_string()));
        assert_eq!(store.pop_back("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_delete_removes_the_key() {
        // given:
        let store = InMemoryHistoryStore::new();
        store.push_front("k", "a".to_string()).await.unwrap();

        // when:
        store.delete("k").await.unwrap();

        // then:
        assert_eq!(store.len("k").await.unwrap(), 0);
    }
}
