//! In-memory key-value store for testing.
//!
//! Provides synchronous, deterministic storage for unit and integration
//! tests. The compare-and-swap runs under the same lock as every other
//! operation, so it is atomic by construction.
//!
//! # Panics
//!
//! Methods panic if the internal lock is poisoned. This is acceptable for
//! test code; production uses the Redis adapter.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crate::domain::poll::StoreError;
use crate::ports::KeyValueStore;

#[derive(Default)]
struct Tables {
    hashes: HashMap<String, HashMap<String, String>>,
    sets: HashMap<String, HashSet<String>>,
}

/// In-memory [`KeyValueStore`] for tests.
#[derive(Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
}

impl InMemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Tables> {
        self.tables.lock().expect("InMemoryStore: lock poisoned")
    }
}

#[async_trait]
impl KeyValueStore for InMemoryStore {
    async fn hash_get_all(
        &self,
        key: &str,
    ) -> Result<Option<HashMap<String, String>>, StoreError> {
        Ok(self.lock().hashes.get(key).cloned())
    }

    async fn hash_set(&self, key: &str, fields: &[(String, String)]) -> Result<(), StoreError> {
        let mut tables = self.lock();
        let hash = tables.hashes.entry(key.to_string()).or_default();
        for (field, value) in fields {
            hash.insert(field.clone(), value.clone());
        }
        Ok(())
    }

    async fn hash_compare_and_set(
        &self,
        key: &str,
        field: &str,
        expected: &str,
        new: &str,
    ) -> Result<bool, StoreError> {
        let mut tables = self.lock();
        let Some(hash) = tables.hashes.get_mut(key) else {
            return Ok(false);
        };
        match hash.get(field) {
            Some(current) if current == expected => {
                hash.insert(field.to_string(), new.to_string());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.lock().hashes.contains_key(key))
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.lock().hashes.remove(key);
        Ok(())
    }

    async fn set_add(&self, set_key: &str, member: &str) -> Result<(), StoreError> {
        self.lock()
            .sets
            .entry(set_key.to_string())
            .or_default()
            .insert(member.to_string());
        Ok(())
    }

    async fn set_remove(&self, set_key: &str, member: &str) -> Result<(), StoreError> {
        if let Some(set) = self.lock().sets.get_mut(set_key) {
            set.remove(member);
        }
        Ok(())
    }

    async fn set_members(&self, set_key: &str) -> Result<HashSet<String>, StoreError> {
        Ok(self.lock().sets.get(set_key).cloned().unwrap_or_default())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hash_round_trip() {
        let store = InMemoryStore::new();
        store
            .hash_set("k", &[("a".into(), "1".into()), ("b".into(), "2".into())])
            .await
            .unwrap();

        let fields = store.hash_get_all("k").await.unwrap().unwrap();
        assert_eq!(fields.get("a").unwrap(), "1");
        assert_eq!(fields.get("b").unwrap(), "2");
        assert!(store.hash_get_all("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn compare_and_set_swaps_only_on_match() {
        let store = InMemoryStore::new();
        store
            .hash_set("k", &[("f".into(), "old".into())])
            .await
            .unwrap();

        assert!(!store.hash_compare_and_set("k", "f", "stale", "x").await.unwrap());
        assert!(store.hash_compare_and_set("k", "f", "old", "new").await.unwrap());

        let fields = store.hash_get_all("k").await.unwrap().unwrap();
        assert_eq!(fields.get("f").unwrap(), "new");
    }

    #[tokio::test]
    async fn compare_and_set_on_missing_key_fails() {
        let store = InMemoryStore::new();
        assert!(!store.hash_compare_and_set("k", "f", "a", "b").await.unwrap());
    }

    #[tokio::test]
    async fn set_membership_round_trip() {
        let store = InMemoryStore::new();
        store.set_add("s", "a").await.unwrap();
        store.set_add("s", "b").await.unwrap();
        store.set_remove("s", "a").await.unwrap();

        let members = store.set_members("s").await.unwrap();
        assert_eq!(members.len(), 1);
        assert!(members.contains("b"));
    }

    #[tokio::test]
    async fn delete_removes_key() {
        let store = InMemoryStore::new();
        store.hash_set("k", &[("f".into(), "v".into())]).await.unwrap();
        store.delete("k").await.unwrap();

        assert!(!store.exists("k").await.unwrap());
        // Deleting again is a no-op.
        store.delete("k").await.unwrap();
    }
}
