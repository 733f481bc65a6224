//! Store factory for runtime tier selection

use std::sync::Arc;

use crate::domain::cache::EntryStore;
use crate::domain::CacheError;

use super::in_memory::{InMemoryStore, InMemoryStoreConfig};
use super::redis::{RedisStore, RedisStoreConfig};

/// Supported store backends
#[derive(Debug, Clone, Default, PartialEq)]
pub enum StoreType {
    /// In-memory store using moka
    #[default]
    InMemory,
    /// Redis store
    Redis,
}

impl std::fmt::Display for StoreType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreType::InMemory => write!(f, "in_memory"),
            StoreType::Redis => write!(f, "redis"),
        }
    }
}

impl std::str::FromStr for StoreType {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "in_memory" | "inmemory" | "memory" => Ok(StoreType::InMemory),
            "redis" => Ok(StoreType::Redis),
            _ => Err(CacheError::configuration(format!(
                "Unknown store type: {}. Valid types: in_memory, redis",
                s
            ))),
        }
    }
}

/// Configuration for the store factory
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Type of store to create
    pub store_type: StoreType,
    /// Redis URL (required for the Redis type)
    pub redis_url: Option<String>,
    /// Key prefix for namespacing (Redis only)
    pub key_prefix: Option<String>,
    /// Maximum capacity (in-memory only)
    pub max_capacity: Option<u64>,
    /// Use the secondary-index lookup path (Redis only)
    pub indexed_lookup: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            store_type: StoreType::InMemory,
            redis_url: None,
            key_prefix: None,
            max_capacity: Some(10_000),
            indexed_lookup: false,
        }
    }
}

impl StoreConfig {
    /// Creates a configuration for an in-memory store
    pub fn in_memory() -> Self {
        Self {
            store_type: StoreType::InMemory,
            ..Default::default()
        }
    }

    /// Creates a configuration for a Redis store
    pub fn redis(url: impl Into<String>) -> Self {
        Self {
            store_type: StoreType::Redis,
            redis_url: Some(url.into()),
            ..Default::default()
        }
    }

    /// Sets the key prefix
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }

    /// Sets the maximum capacity
    pub fn with_max_capacity(mut self, capacity: u64) -> Self {
        self.max_capacity = Some(capacity);
        self
    }

    /// Enables the secondary-index lookup path
    pub fn with_indexed_lookup(mut self) -> Self {
        self.indexed_lookup = true;
        self
    }

    /// Creates a configuration from environment variables
    ///
    /// Recognized: `TIERCACHE_STORE_TYPE`, `TIERCACHE_REDIS_URL`,
    /// `TIERCACHE_KEY_PREFIX`, `TIERCACHE_MAX_CAPACITY`,
    /// `TIERCACHE_INDEXED_LOOKUP`.
    pub fn from_env() -> Result<Self, CacheError> {
        let store_type = std::env::var("TIERCACHE_STORE_TYPE")
            .unwrap_or_else(|_| "in_memory".to_string())
            .parse()?;

        let redis_url = std::env::var("TIERCACHE_REDIS_URL").ok();
        let key_prefix = std::env::var("TIERCACHE_KEY_PREFIX").ok();

        let max_capacity = std::env::var("TIERCACHE_MAX_CAPACITY")
            .ok()
            .and_then(|v| v.parse().ok());

        let indexed_lookup = std::env::var("TIERCACHE_INDEXED_LOOKUP")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        Ok(Self {
            store_type,
            redis_url,
            key_prefix,
            max_capacity,
            indexed_lookup,
        })
    }
}

/// Factory for creating entry store instances
#[derive(Debug, Default)]
pub struct StoreFactory;

impl StoreFactory {
    /// Creates a new store factory
    pub fn new() -> Self {
        Self
    }

    /// Creates a store based on configuration
    pub async fn create(&self, config: &StoreConfig) -> Result<Arc<dyn EntryStore>, CacheError> {
        match config.store_type {
            StoreType::InMemory => {
                let mut in_memory_config = InMemoryStoreConfig::default();

                if let Some(capacity) = config.max_capacity {
                    in_memory_config = in_memory_config.with_max_capacity(capacity);
                }

                Ok(Arc::new(InMemoryStore::with_config(in_memory_config)))
            }
            StoreType::Redis => {
                let url = config.redis_url.clone().ok_or_else(|| {
                    CacheError::configuration("Redis URL is required for the Redis store type")
                })?;

                let mut redis_config = RedisStoreConfig::new(url);

                if let Some(prefix) = &config.key_prefix {
                    redis_config = redis_config.with_key_prefix(prefix.clone());
                }

                if config.indexed_lookup {
                    redis_config = redis_config.with_indexed_lookup();
                }

                let store = RedisStore::new(redis_config).await?;
                Ok(Arc::new(store))
            }
        }
    }

    /// Creates an in-memory store with default settings
    pub fn create_in_memory(&self) -> Arc<dyn EntryStore> {
        Arc::new(InMemoryStore::new())
    }

    /// Creates an in-memory store with custom configuration
    pub fn create_in_memory_with_config(
        &self,
        config: InMemoryStoreConfig,
    ) -> Arc<dyn EntryStore> {
        Arc::new(InMemoryStore::with_config(config))
    }

    /// Creates a Redis store
    pub async fn create_redis(
        &self,
        config: RedisStoreConfig,
    ) -> Result<Arc<dyn EntryStore>, CacheError> {
        let store = RedisStore::new(config).await?;
        Ok(Arc::new(store))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::cache::CacheEntry;

    #[test]
    fn test_store_type_from_str() {
        assert_eq!("in_memory".parse::<StoreType>().unwrap(), StoreType::InMemory);
        assert_eq!("inmemory".parse::<StoreType>().unwrap(), StoreType::InMemory);
        assert_eq!("memory".parse::<StoreType>().unwrap(), StoreType::InMemory);
        assert_eq!("redis".parse::<StoreType>().unwrap(), StoreType::Redis);
        assert_eq!("REDIS".parse::<StoreType>().unwrap(), StoreType::Redis);
    }

    #[test]
    fn test_store_type_from_str_invalid() {
        assert!("invalid".parse::<StoreType>().is_err());
    }

    #[test]
    fn test_store_type_display() {
        assert_eq!(StoreType::InMemory.to_string(), "in_memory");
        assert_eq!(StoreType::Redis.to_string(), "redis");
    }

    #[test]
    fn test_config_builders() {
        let config = StoreConfig::redis("redis://localhost:6379")
            .with_key_prefix("responses")
            .with_indexed_lookup();

        assert_eq!(config.store_type, StoreType::Redis);
        assert_eq!(config.redis_url, Some("redis://localhost:6379".to_string()));
        assert_eq!(config.key_prefix, Some("responses".to_string()));
        assert!(config.indexed_lookup);
    }

    #[tokio::test]
    async fn test_factory_create_in_memory() {
        let factory = StoreFactory::new();
        let config = StoreConfig::in_memory().with_max_capacity(100);

        let store = factory.create(&config).await.unwrap();

        store
            .put(CacheEntry::new(
                "k1",
                "v1",
                std::time::Duration::from_secs(60),
            ))
            .await
            .unwrap();

        assert!(store.get("k1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_factory_create_redis_missing_url() {
        let factory = StoreFactory::new();
        let config = StoreConfig {
            store_type: StoreType::Redis,
            redis_url: None,
            ..Default::default()
        };

        let result = factory.create(&config).await;
        assert!(matches!(result, Err(CacheError::Configuration { .. })));
    }
}
