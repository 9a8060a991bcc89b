//! KeyValueStore port - the persistence interface the poll engine consumes.
//!
//! The store is treated as a key-value server offering atomic hash
//! read/write and set membership operations. Poll records live in hashes at
//! `poll:{id}` (fields `question`, `description`, `options`); the set of all
//! poll ids lives at `polls`.
//!
//! `hash_compare_and_set` is the atomicity primitive backing concurrent vote
//! increments: the field is replaced only if its current value still equals
//! the value the caller read, so a lost update shows up as a failed swap the
//! caller can retry.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};

use crate::domain::poll::StoreError;

/// Port for the key-value store backing poll persistence.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Reads all fields of a hash. Returns `None` if the key is absent.
    async fn hash_get_all(&self, key: &str)
        -> Result<Option<HashMap<String, String>>, StoreError>;

    /// Writes the given fields of a hash, creating the key if absent.
    async fn hash_set(&self, key: &str, fields: &[(String, String)]) -> Result<(), StoreError>;

    /// Atomically replaces `field` with `new` only if its current value
    /// equals `expected`. Returns whether the swap happened.
    async fn hash_compare_and_set(
        &self,
        key: &str,
        field: &str,
        expected: &str,
        new: &str,
    ) -> Result<bool, StoreError>;

    /// Checks whether a key exists.
    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    /// Deletes a key. Deleting an absent key is a no-op.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Adds a member to a set.
    async fn set_add(&self, set_key: &str, member: &str) -> Result<(), StoreError>;

    /// Removes a member from a set.
    async fn set_remove(&self, set_key: &str, member: &str) -> Result<(), StoreError>;

    /// Returns all members of a set (empty if the key is absent).
    async fn set_members(&self, set_key: &str) -> Result<HashSet<String>, StoreError>;

    /// Round-trips the connection; backs the health endpoint.
    async fn ping(&self) -> Result<(), StoreError>;
}
