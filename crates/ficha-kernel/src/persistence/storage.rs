use crate::error::StoreError;
use async_trait::async_trait;
use dashmap::DashMap;

/// Raw JSON key/value storage
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    /// Write a value
    async fn save(&self, key: &str, value: serde_json::Value) -> Result<(), StoreError>;

    /// Read a value
    async fn load(&self, key: &str) -> Result<Option<serde_json::Value>, StoreError>;

    /// Delete a value, returning whether it existed
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;

    /// Check for a value
    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.load(key).await?.is_some())
    }
}

/// Process-local storage
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    values: DashMap<String, serde_json::Value>,
}

impl InMemoryStorage {
    /// Create new empty storage
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored values
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Nothing stored
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Write a value synchronously, bypassing validation; used to seed payloads
    pub fn insert_raw(&self, key: impl Into<String>, value: serde_json::Value) {
        self.values.insert(key.into(), value);
    }
}

#[async_trait]
impl StorageAdapter for InMemoryStorage {
    async fn save(&self, key: &str, value: serde_json::Value) -> Result<(), StoreError> {
        self.values.insert(key.to_owned(), value);
        Ok(())
    }

    async fn load(&self, key: &str) -> Result<Option<serde_json::Value>, StoreError> {
        Ok(self.values.get(key).map(|v| v.value().clone()))
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.values.remove(key).is_some())
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.values.contains_key(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_round_trip() {
        let storage = InMemoryStorage::new();
        assert!(!storage.exists("k").await.unwrap());
        storage.save("k", json!({"a": 1})).await.unwrap();
        assert_eq!(storage.load("k").await.unwrap(), Some(json!({"a": 1})));
        assert!(storage.delete("k").await.unwrap());
        assert!(!storage.delete("k").await.unwrap());
        assert!(storage.is_empty());
    }
}
