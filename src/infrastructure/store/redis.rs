//! Redis-backed durable entry store

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use tracing::debug;

use crate::domain::cache::{CacheEntry, EntryStore};
use crate::domain::CacheError;

/// Configuration for the Redis store
#[derive(Debug, Clone)]
pub struct RedisStoreConfig {
    /// Redis connection URL (e.g., "redis://127.0.0.1:6379")
    pub url: String,
    /// Key prefix for namespacing
    pub key_prefix: Option<String>,
    /// Connection timeout
    pub connection_timeout: Duration,
    /// Consult the secondary key index before point lookups
    ///
    /// Latency optimization only; the indexed path returns the same
    /// results as the direct path. The index may over-approximate the
    /// live key set, never under-approximate it.
    pub indexed_lookup: bool,
}

impl Default for RedisStoreConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            key_prefix: None,
            connection_timeout: Duration::from_secs(5),
            indexed_lookup: false,
        }
    }
}

impl RedisStoreConfig {
    /// Creates a new configuration with the given URL
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Sets the key prefix
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }

    /// Sets the connection timeout
    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Enables the indexed lookup path
    pub fn with_indexed_lookup(mut self) -> Self {
        self.indexed_lookup = true;
        self
    }
}

/// Durable entry store backed by Redis
///
/// Entries are stored as JSON documents under a single key, so a write is
/// a single atomic `SET` - readers see either the old or the new document,
/// never a torn one. Expiry is enforced twice: Redis `EX` reclaims storage,
/// and the document's own `expires_at` is checked on read so an entry past
/// its expiry is deleted remotely and reported absent.
#[derive(Clone)]
pub struct RedisStore {
    connection: ConnectionManager,
    config: RedisStoreConfig,
}

impl fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisStore")
            .field("config", &self.config)
            .field("connection", &"<ConnectionManager>")
            .finish()
    }
}

impl RedisStore {
    /// Connects to Redis with the given configuration
    pub async fn new(config: RedisStoreConfig) -> Result<Self, CacheError> {
        let client = Client::open(config.url.as_str()).map_err(|e| {
            CacheError::durable_unavailable(format!("failed to create Redis client: {}", e))
        })?;

        let connection = ConnectionManager::new(client).await.map_err(|e| {
            CacheError::durable_unavailable(format!("failed to connect to Redis: {}", e))
        })?;

        Ok(Self { connection, config })
    }

    /// Connects with default configuration
    pub async fn with_url(url: impl Into<String>) -> Result<Self, CacheError> {
        Self::new(RedisStoreConfig::new(url)).await
    }

    fn prefix_key(&self, key: &str) -> String {
        match &self.config.key_prefix {
            Some(prefix) => format!("{}:{}", prefix, key),
            None => key.to_string(),
        }
    }

    fn index_key(&self) -> String {
        match &self.config.key_prefix {
            Some(prefix) => format!("{}:__key_index", prefix),
            None => "__key_index".to_string(),
        }
    }

    /// Deletes an entry found past its expiry (lazy eviction)
    async fn evict_expired(&self, prefixed_key: &str) -> Result<(), CacheError> {
        let mut conn = self.connection.clone();

        let _: () = conn.del(prefixed_key).await.map_err(|e| {
            CacheError::durable_unavailable(format!("failed to evict '{}': {}", prefixed_key, e))
        })?;
        let _: () = conn
            .srem(self.index_key(), prefixed_key)
            .await
            .map_err(|e| {
                CacheError::durable_unavailable(format!("failed to deindex key: {}", e))
            })?;

        debug!(key = prefixed_key, "evicted expired durable entry");
        Ok(())
    }
}

#[async_trait]
impl EntryStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        let prefixed_key = self.prefix_key(key);
        let mut conn = self.connection.clone();

        if self.config.indexed_lookup {
            let indexed: bool = conn
                .sismember(self.index_key(), &prefixed_key)
                .await
                .map_err(|e| {
                    CacheError::durable_unavailable(format!("index lookup failed: {}", e))
                })?;

            if !indexed {
                return Ok(None);
            }
        }

        let raw: Option<String> = conn.get(&prefixed_key).await.map_err(|e| {
            CacheError::durable_unavailable(format!("failed to get key '{}': {}", key, e))
        })?;

        let Some(raw) = raw else {
            return Ok(None);
        };

        let entry: CacheEntry = serde_json::from_str(&raw).map_err(|e| {
            CacheError::durable_unavailable(format!("corrupt entry for key '{}': {}", key, e))
        })?;

        if !entry.is_live() {
            self.evict_expired(&prefixed_key).await?;
            return Ok(None);
        }

        Ok(Some(entry))
    }

    async fn put(&self, entry: CacheEntry) -> Result<(), CacheError> {
        let prefixed_key = self.prefix_key(entry.key());
        let mut conn = self.connection.clone();

        let ttl_secs = entry
            .ttl_remaining()
            .map(|d| d.as_secs())
            .unwrap_or(0)
            .max(1);

        let raw = serde_json::to_string(&entry)
            .map_err(|e| CacheError::internal(format!("failed to serialize entry: {}", e)))?;

        // Index before writing so the indexed path can only over-approximate
        let _: () = conn
            .sadd(self.index_key(), &prefixed_key)
            .await
            .map_err(|e| CacheError::durable_unavailable(format!("failed to index key: {}", e)))?;

        let _: () = conn
            .set_ex(&prefixed_key, raw, ttl_secs)
            .await
            .map_err(|e| {
                CacheError::durable_unavailable(format!(
                    "failed to set key '{}': {}",
                    entry.key(),
                    e
                ))
            })?;

        Ok(())
    }

    async fn invalidate(&self, key: &str) -> Result<bool, CacheError> {
        let prefixed_key = self.prefix_key(key);
        let mut conn = self.connection.clone();

        let deleted: i32 = conn.del(&prefixed_key).await.map_err(|e| {
            CacheError::durable_unavailable(format!("failed to delete key '{}': {}", key, e))
        })?;
        let _: () = conn
            .srem(self.index_key(), &prefixed_key)
            .await
            .map_err(|e| {
                CacheError::durable_unavailable(format!("failed to deindex key: {}", e))
            })?;

        Ok(deleted > 0)
    }

    async fn invalidate_pattern(&self, pattern: &str) -> Result<usize, CacheError> {
        let prefixed_pattern = self.prefix_key(pattern);
        let index_key = self.index_key();
        let mut conn = self.connection.clone();

        // SCAN rather than KEYS; large keyspaces must not block the server
        let mut cursor = 0u64;
        let mut total_deleted = 0usize;

        loop {
            let (new_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&prefixed_pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut conn)
                .await
                .map_err(|e| {
                    CacheError::durable_unavailable(format!(
                        "failed to scan keys with pattern '{}': {}",
                        pattern, e
                    ))
                })?;

            let keys: Vec<String> = keys.into_iter().filter(|k| *k != index_key).collect();

            if !keys.is_empty() {
                let deleted: i32 = conn.del(&keys).await.map_err(|e| {
                    CacheError::durable_unavailable(format!("failed to delete keys: {}", e))
                })?;
                let _: () = conn.srem(&index_key, &keys).await.map_err(|e| {
                    CacheError::durable_unavailable(format!("failed to deindex keys: {}", e))
                })?;
                total_deleted += deleted as usize;
            }

            cursor = new_cursor;

            if cursor == 0 {
                break;
            }
        }

        Ok(total_deleted)
    }

    async fn clear(&self) -> Result<(), CacheError> {
        self.invalidate_pattern("*").await?;

        let mut conn = self.connection.clone();
        let _: () = conn.del(self.index_key()).await.map_err(|e| {
            CacheError::durable_unavailable(format!("failed to clear index: {}", e))
        })?;

        Ok(())
    }

    async fn size(&self) -> Result<usize, CacheError> {
        let pattern = self.prefix_key("*");
        let index_key = self.index_key();
        let mut conn = self.connection.clone();

        let mut cursor = 0u64;
        let mut count = 0usize;

        loop {
            let (new_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(1000)
                .query_async(&mut conn)
                .await
                .map_err(|e| {
                    CacheError::durable_unavailable(format!("failed to scan keys: {}", e))
                })?;

            count += keys.iter().filter(|k| **k != index_key).count();
            cursor = new_cursor;

            if cursor == 0 {
                break;
            }
        }

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Connection-level tests require a running Redis instance and live in
    // the deployment's integration environment; here we cover the pure
    // parts of the store.

    #[test]
    fn test_config_builder() {
        let config = RedisStoreConfig::new("redis://localhost:6379")
            .with_key_prefix("responses")
            .with_connection_timeout(Duration::from_secs(2))
            .with_indexed_lookup();

        assert_eq!(config.url, "redis://localhost:6379");
        assert_eq!(config.key_prefix, Some("responses".to_string()));
        assert_eq!(config.connection_timeout, Duration::from_secs(2));
        assert!(config.indexed_lookup);
    }

    #[test]
    fn test_default_config_direct_lookup() {
        let config = RedisStoreConfig::default();
        assert!(!config.indexed_lookup);
        assert!(config.key_prefix.is_none());
    }

    #[test]
    fn test_entry_document_round_trip() {
        // the exact JSON document format written to Redis
        let entry = CacheEntry::new("abc", r#"{"text":"Y"}"#, Duration::from_secs(60));
        let raw = serde_json::to_string(&entry).unwrap();
        let back: CacheEntry = serde_json::from_str(&raw).unwrap();

        assert_eq!(back.key(), "abc");
        assert_eq!(back.value(), r#"{"text":"Y"}"#);
        assert_eq!(back.expires_at(), entry.expires_at());
    }
}
