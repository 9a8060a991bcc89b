//! Redis-backed key-value store for production deployments.
//!
//! Maps the [`KeyValueStore`] port onto Redis hashes and sets. The
//! compare-and-swap is a Lua script, so the read-compare-write runs
//! atomically inside the server and concurrent vote increments cannot
//! overwrite each other.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Script};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::domain::poll::StoreError;
use crate::ports::KeyValueStore;

/// Atomically replaces a hash field only if it still holds the expected
/// value. Returns 1 on swap, 0 otherwise (including a missing key/field).
const COMPARE_AND_SET_SCRIPT: &str = r#"
if redis.call('HGET', KEYS[1], ARGV[1]) == ARGV[2] then
    redis.call('HSET', KEYS[1], ARGV[1], ARGV[3])
    return 1
else
    return 0
end
"#;

/// Redis-backed [`KeyValueStore`].
#[derive(Clone)]
pub struct RedisStore {
    conn: MultiplexedConnection,
    compare_and_set: Arc<Script>,
}

impl RedisStore {
    /// Creates a store over an established multiplexed connection.
    pub fn new(conn: MultiplexedConnection) -> Self {
        Self {
            conn,
            compare_and_set: Arc::new(Script::new(COMPARE_AND_SET_SCRIPT)),
        }
    }
}

fn store_err(e: redis::RedisError) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn hash_get_all(
        &self,
        key: &str,
    ) -> Result<Option<HashMap<String, String>>, StoreError> {
        let mut conn = self.conn.clone();
        let fields: HashMap<String, String> = conn.hgetall(key).await.map_err(store_err)?;

        // Redis reports a missing hash as an empty map.
        if fields.is_empty() {
            Ok(None)
        } else {
            Ok(Some(fields))
        }
    }

    async fn hash_set(&self, key: &str, fields: &[(String, String)]) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        conn.hset_multiple::<_, _, _, ()>(key, fields)
            .await
            .map_err(store_err)
    }

    async fn hash_compare_and_set(
        &self,
        key: &str,
        field: &str,
        expected: &str,
        new: &str,
    ) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let swapped: i64 = self
            .compare_and_set
            .key(key)
            .arg(field)
            .arg(expected)
            .arg(new)
            .invoke_async(&mut conn)
            .await
            .map_err(store_err)?;

        Ok(swapped == 1)
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        conn.exists(key).await.map_err(store_err)
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key).await.map_err(store_err)
    }

    async fn set_add(&self, set_key: &str, member: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        conn.sadd::<_, _, ()>(set_key, member).await.map_err(store_err)
    }

    async fn set_remove(&self, set_key: &str, member: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        conn.srem::<_, _, ()>(set_key, member).await.map_err(store_err)
    }

    async fn set_members(&self, set_key: &str) -> Result<HashSet<String>, StoreError> {
        let mut conn = self.conn.clone();
        conn.smembers(set_key).await.map_err(store_err)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
            .map(|_| ())
            .map_err(store_err)
    }
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    // Redis integration tests require a running Redis instance and are
    // typically run separately from unit tests.
    //
    // Example test setup:
    //
    // #[tokio::test]
    // #[ignore] // Run with: cargo test -- --ignored
    // async fn test_compare_and_set_against_redis() {
    //     let client = redis::Client::open("redis://127.0.0.1/").unwrap();
    //     let conn = client.get_multiplexed_tokio_connection().await.unwrap();
    //     let store = RedisStore::new(conn);
    //     // ... test code
    // }
}
