//! Entry store trait definition
//!
//! One trait covers both tiers: the volatile in-process store and the
//! durable remote store implement the same contract, differing only in
//! persistence guarantees.

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;

use super::CacheEntry;
use crate::domain::CacheError;

/// Key-value store for cache entries with TTL support
///
/// `get` returns only live entries; implementations remove an expired
/// entry found on read before reporting it absent (delete-on-read).
#[async_trait]
pub trait EntryStore: Send + Sync + Debug {
    /// Gets a live entry, evicting it first if it has expired
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheError>;

    /// Inserts or overwrites an entry
    async fn put(&self, entry: CacheEntry) -> Result<(), CacheError>;

    /// Removes an entry; idempotent. Returns whether it existed
    async fn invalidate(&self, key: &str) -> Result<bool, CacheError>;

    /// Removes all entries whose keys match a `*` glob pattern
    async fn invalidate_pattern(&self, pattern: &str) -> Result<usize, CacheError>;

    /// Removes every entry
    async fn clear(&self) -> Result<(), CacheError>;

    /// Approximate number of stored entries
    async fn size(&self) -> Result<usize, CacheError>;

    /// Remaining lifetime of a live entry
    async fn ttl(&self, key: &str) -> Result<Option<Duration>, CacheError> {
        Ok(self.get(key).await?.and_then(|e| e.ttl_remaining()))
    }
}
