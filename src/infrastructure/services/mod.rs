//! Orchestration services

mod request_cache;

pub use request_cache::{
    CacheLookup, CacheStats, LookupSource, RequestCache, RequestCacheConfig,
};
