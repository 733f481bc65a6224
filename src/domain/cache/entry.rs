//! Cache entry record shared by all tiers

use std::time::{Duration, SystemTime};

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::domain::CacheError;

/// Persistence metadata attached to durable-tier entries
///
/// Opaque passthrough: stored and returned verbatim, never interpreted by
/// the cache logic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierMetadata {
    /// Number of replicas the backend should keep
    pub redundancy_factor: u32,
    /// Whether the entry is replicated across regions
    pub geo_replicated: bool,
    /// Storage tier class (e.g., "standard", "premium")
    pub tier_class: String,
}

impl Default for TierMetadata {
    fn default() -> Self {
        Self {
            redundancy_factor: 1,
            geo_replicated: false,
            tier_class: "standard".to_string(),
        }
    }
}

/// A cached response record
///
/// An entry is live iff `now < expires_at`. Both timestamps are epoch
/// milliseconds so short TTLs behave predictably in tests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Derived key this entry is stored under
    key: String,
    /// Cached value, serialized as JSON
    value: String,
    /// Creation timestamp (epoch millis)
    created_at: u64,
    /// Expiry timestamp (epoch millis)
    expires_at: u64,
    /// Number of times this entry has been served
    hit_count: u32,
    /// Optional durable-tier persistence flags
    tier: Option<TierMetadata>,
}

impl CacheEntry {
    /// Creates a new entry expiring `ttl` from now
    ///
    /// A zero TTL is bumped to one millisecond so `expires_at` is always
    /// strictly after `created_at`.
    pub fn new(key: impl Into<String>, value: impl Into<String>, ttl: Duration) -> Self {
        let now = current_time_millis();
        let ttl_millis = (ttl.as_millis() as u64).max(1);

        Self {
            key: key.into(),
            value: value.into(),
            created_at: now,
            expires_at: now + ttl_millis,
            hit_count: 0,
            tier: None,
        }
    }

    /// Creates an entry from a serializable value
    pub fn from_value<V: Serialize>(
        key: impl Into<String>,
        value: &V,
        ttl: Duration,
    ) -> Result<Self, CacheError> {
        let json = serde_json::to_string(value)
            .map_err(|e| CacheError::invalid_payload(format!("value not serializable: {}", e)))?;
        Ok(Self::new(key, json, ttl))
    }

    /// Attaches durable-tier persistence metadata
    pub fn with_tier_metadata(mut self, tier: TierMetadata) -> Self {
        self.tier = Some(tier);
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Raw JSON value
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Deserializes the cached value
    pub fn value_as<V: DeserializeOwned>(&self) -> Result<V, CacheError> {
        serde_json::from_str(&self.value)
            .map_err(|e| CacheError::internal(format!("failed to deserialize cached value: {}", e)))
    }

    pub fn created_at(&self) -> u64 {
        self.created_at
    }

    pub fn expires_at(&self) -> u64 {
        self.expires_at
    }

    pub fn hit_count(&self) -> u32 {
        self.hit_count
    }

    pub fn tier_metadata(&self) -> Option<&TierMetadata> {
        self.tier.as_ref()
    }

    /// True while the entry has not reached its expiry timestamp
    pub fn is_live(&self) -> bool {
        current_time_millis() < self.expires_at
    }

    /// Remaining lifetime, or `None` once expired
    pub fn ttl_remaining(&self) -> Option<Duration> {
        let now = current_time_millis();
        if now < self.expires_at {
            Some(Duration::from_millis(self.expires_at - now))
        } else {
            None
        }
    }

    /// Increments the served counter
    pub fn increment_hits(&mut self) {
        self.hit_count += 1;
    }
}

/// Current wall-clock time as epoch milliseconds
pub fn current_time_millis() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_new() {
        let entry = CacheEntry::new("k1", r#"{"text":"Y"}"#, Duration::from_secs(3600));

        assert_eq!(entry.key(), "k1");
        assert_eq!(entry.value(), r#"{"text":"Y"}"#);
        assert_eq!(entry.hit_count(), 0);
        assert!(entry.is_live());
        assert!(entry.expires_at() > entry.created_at());
    }

    #[test]
    fn test_entry_zero_ttl_still_ordered() {
        let entry = CacheEntry::new("k1", "v", Duration::from_secs(0));
        assert!(entry.expires_at() > entry.created_at());
    }

    #[test]
    fn test_entry_expiry() {
        let entry = CacheEntry::new("k1", "v", Duration::from_millis(1));
        std::thread::sleep(Duration::from_millis(10));

        assert!(!entry.is_live());
        assert!(entry.ttl_remaining().is_none());
    }

    #[test]
    fn test_ttl_remaining() {
        let entry = CacheEntry::new("k1", "v", Duration::from_secs(60));

        let remaining = entry.ttl_remaining().unwrap();
        assert!(remaining.as_secs() > 55 && remaining.as_secs() <= 60);
    }

    #[test]
    fn test_from_value_round_trip() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct Response {
            text: String,
        }

        let response = Response {
            text: "Y".to_string(),
        };
        let entry = CacheEntry::from_value("k1", &response, Duration::from_secs(60)).unwrap();

        let decoded: Response = entry.value_as().unwrap();
        assert_eq!(decoded, response);
    }

    #[test]
    fn test_tier_metadata_passthrough() {
        let tier = TierMetadata {
            redundancy_factor: 2,
            geo_replicated: true,
            tier_class: "premium".to_string(),
        };

        let entry =
            CacheEntry::new("k1", "v", Duration::from_secs(60)).with_tier_metadata(tier.clone());

        assert_eq!(entry.tier_metadata(), Some(&tier));

        // survives a serialization round trip untouched
        let json = serde_json::to_string(&entry).unwrap();
        let back: CacheEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back.tier_metadata(), Some(&tier));
    }

    #[test]
    fn test_increment_hits() {
        let mut entry = CacheEntry::new("k1", "v", Duration::from_secs(60));

        entry.increment_hits();
        entry.increment_hits();
        assert_eq!(entry.hit_count(), 2);
    }
}
