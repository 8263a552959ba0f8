use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::storage::traits::KeyValueStore;

/// In-memory key-value store.
///
/// Behaves like the device-local string storage: namespaced string keys,
/// string values, last-write-wins with no locking visible to callers.
#[derive(Default)]
pub struct MemoryKeyValueStore {
    items: RwLock<HashMap<String, String>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently stored. Test helper.
    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.items.read().await.is_empty()
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.items.read().await.get(key).cloned())
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.items
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<()> {
        self.items.write().await.remove(key);
        Ok(())
    }

    async fn multi_remove(&self, keys: &[String]) -> Result<()> {
        let mut items = self.items.write().await;
        for key in keys {
            items.remove(key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_remove() {
        let store = MemoryKeyValueStore::new();

        store.set_item("a", "1").await.unwrap();
        assert_eq!(store.get_item("a").await.unwrap(), Some("1".to_string()));

        store.set_item("a", "2").await.unwrap();
        assert_eq!(store.get_item("a").await.unwrap(), Some("2".to_string()));

        store.remove_item("a").await.unwrap();
        assert_eq!(store.get_item("a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_multi_remove() {
        let store = MemoryKeyValueStore::new();
        store.set_item("a", "1").await.unwrap();
        store.set_item("b", "2").await.unwrap();
        store.set_item("c", "3").await.unwrap();

        store
            .multi_remove(&["a".to_string(), "c".to_string(), "missing".to_string()])
            .await
            .unwrap();

        assert_eq!(store.get_item("a").await.unwrap(), None);
        assert_eq!(store.get_item("b").await.unwrap(), Some("2".to_string()));
        assert_eq!(store.get_item("c").await.unwrap(), None);
    }
}
