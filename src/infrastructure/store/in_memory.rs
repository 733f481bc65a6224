//! In-memory entry store using moka

use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache as MokaCache;

use crate::domain::cache::{CacheEntry, EntryStore};
use crate::domain::CacheError;

/// Configuration for the in-memory store
#[derive(Debug, Clone)]
pub struct InMemoryStoreConfig {
    /// Maximum number of entries; TTL alone does not bound memory when the
    /// write rate outpaces expiry
    pub max_capacity: u64,
    /// Upper bound on entry residency enforced by moka, independent of the
    /// per-entry expiry checked on read
    pub max_ttl: Duration,
    /// Entries not accessed for this duration are evicted
    pub time_to_idle: Option<Duration>,
}

impl Default for InMemoryStoreConfig {
    fn default() -> Self {
        Self {
            max_capacity: 10_000,
            max_ttl: Duration::from_secs(86_400), // 1 day
            time_to_idle: None,
        }
    }
}

impl InMemoryStoreConfig {
    /// Sets the maximum number of entries
    pub fn with_max_capacity(mut self, capacity: u64) -> Self {
        self.max_capacity = capacity;
        self
    }

    /// Sets the residency upper bound
    pub fn with_max_ttl(mut self, ttl: Duration) -> Self {
        self.max_ttl = ttl;
        self
    }

    /// Sets the time-to-idle duration
    pub fn with_time_to_idle(mut self, tti: Duration) -> Self {
        self.time_to_idle = Some(tti);
        self
    }
}

/// Thread-safe in-process entry store, the fast tier
///
/// Entries carry their own expiry timestamp; an expired entry found on
/// read is removed before the lookup reports a miss. moka's capacity
/// bound and TTL act as an eviction backstop on top of that.
#[derive(Debug)]
pub struct InMemoryStore {
    cache: MokaCache<String, CacheEntry>,
}

impl InMemoryStore {
    /// Creates a store with default configuration
    pub fn new() -> Self {
        Self::with_config(InMemoryStoreConfig::default())
    }

    /// Creates a store with the given configuration
    pub fn with_config(config: InMemoryStoreConfig) -> Self {
        let mut builder = MokaCache::builder()
            .max_capacity(config.max_capacity)
            .time_to_live(config.max_ttl);

        if let Some(tti) = config.time_to_idle {
            builder = builder.time_to_idle(tti);
        }

        Self {
            cache: builder.build(),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EntryStore for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        match self.cache.get(key).await {
            Some(entry) => {
                if !entry.is_live() {
                    self.cache.remove(key).await;
                    return Ok(None);
                }

                Ok(Some(entry))
            }
            None => Ok(None),
        }
    }

    async fn put(&self, entry: CacheEntry) -> Result<(), CacheError> {
        self.cache.insert(entry.key().to_string(), entry).await;
        Ok(())
    }

    async fn invalidate(&self, key: &str) -> Result<bool, CacheError> {
        let existed = self.cache.get(key).await.is_some();
        self.cache.remove(key).await;
        Ok(existed)
    }

    async fn invalidate_pattern(&self, pattern: &str) -> Result<usize, CacheError> {
        let pattern_regex = pattern.replace('*', ".*");
        let regex = regex::Regex::new(&pattern_regex)
            .map_err(|e| CacheError::internal(format!("invalid pattern: {}", e)))?;

        self.cache.run_pending_tasks().await;

        let cache_clone = self.cache.clone();
        let keys_to_delete: Vec<String> = tokio::task::spawn_blocking(move || {
            cache_clone
                .iter()
                .filter_map(|(k, _)| {
                    let key_str: &str = k.as_ref();
                    regex.is_match(key_str).then(|| key_str.to_string())
                })
                .collect()
        })
        .await
        .map_err(|e| CacheError::internal(format!("failed to iterate cache: {}", e)))?;

        let mut deleted = 0;
        for key in keys_to_delete {
            self.cache.remove(&key).await;
            deleted += 1;
        }

        Ok(deleted)
    }

    async fn clear(&self) -> Result<(), CacheError> {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
        Ok(())
    }

    async fn size(&self) -> Result<usize, CacheError> {
        self.cache.run_pending_tasks().await;
        Ok(self.cache.entry_count() as usize)
    }
}
