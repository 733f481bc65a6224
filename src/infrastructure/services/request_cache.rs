//! Request cache facade
//!
//! Orchestrates the tiered lookup pipeline: key derivation, fast tier,
//! durable tier, semantic fallback. Every infrastructure failure along the
//! way degrades the lookup to a miss; only payload errors reach the
//! caller.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::audit::{AuditSink, AuditTransaction, TransactionKind};
use crate::domain::cache::{CacheEntry, CacheKey, EntryStore, KeyDeriver, RequestPayload};
use crate::domain::embedding::Embedder;
use crate::domain::similarity::{EmbeddingRecord, SimilarityIndex};
use crate::domain::{CacheError, TierMetadata};

/// Configuration for the request cache
#[derive(Debug, Clone)]
pub struct RequestCacheConfig {
    /// Namespace prefix for derived keys
    pub namespace: String,
    /// Default TTL for cached entries
    pub default_ttl: Duration,
    /// Whether the semantic fallback participates in lookups
    pub semantic_enabled: bool,
    /// Minimum similarity for a semantic hit, in [0, 1]
    ///
    /// Accepted when `score >= semantic_threshold`: an exactly-at-threshold
    /// match is a hit.
    pub semantic_threshold: f32,
    /// Number of nearest neighbors considered per semantic lookup
    pub semantic_top_k: usize,
    /// Bypass the durable tier entirely
    pub fast_tier_only: bool,
    /// Whether cache decisions are recorded to the audit sink
    pub audit_enabled: bool,
    /// Time budget for each durable-tier call; an overrun counts as a miss
    pub durable_timeout: Duration,
    /// Persistence flags attached to written entries, passed through opaque
    pub tier_metadata: Option<TierMetadata>,
}

impl Default for RequestCacheConfig {
    fn default() -> Self {
        Self {
            namespace: "responses".to_string(),
            default_ttl: Duration::from_secs(3600),
            semantic_enabled: true,
            semantic_threshold: 0.92,
            semantic_top_k: 1,
            fast_tier_only: false,
            audit_enabled: true,
            durable_timeout: Duration::from_secs(5),
            tier_metadata: None,
        }
    }
}

impl RequestCacheConfig {
    /// Creates a configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the key namespace
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Sets the default TTL
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Enables or disables the semantic fallback
    pub fn with_semantic_enabled(mut self, enabled: bool) -> Self {
        self.semantic_enabled = enabled;
        self
    }

    /// Sets the similarity acceptance threshold, clamped to [0, 1]
    pub fn with_semantic_threshold(mut self, threshold: f32) -> Self {
        self.semantic_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    /// Sets how many neighbors each semantic lookup considers
    pub fn with_semantic_top_k(mut self, top_k: usize) -> Self {
        self.semantic_top_k = top_k.max(1);
        self
    }

    /// Restricts the cache to the fast tier
    pub fn with_fast_tier_only(mut self) -> Self {
        self.fast_tier_only = true;
        self
    }

    /// Enables or disables audit recording
    pub fn with_audit_enabled(mut self, enabled: bool) -> Self {
        self.audit_enabled = enabled;
        self
    }

    /// Sets the durable-tier time budget
    pub fn with_durable_timeout(mut self, timeout: Duration) -> Self {
        self.durable_timeout = timeout;
        self
    }

    /// Attaches persistence metadata to written entries
    pub fn with_tier_metadata(mut self, tier: TierMetadata) -> Self {
        self.tier_metadata = Some(tier);
        self
    }

    /// Creates a configuration from environment variables
    ///
    /// Recognized: `TIERCACHE_NAMESPACE`, `TIERCACHE_TTL_SECS`,
    /// `TIERCACHE_SEMANTIC_ENABLED`, `TIERCACHE_SEMANTIC_THRESHOLD`,
    /// `TIERCACHE_FAST_TIER_ONLY`, `TIERCACHE_AUDIT_ENABLED`,
    /// `TIERCACHE_DURABLE_TIMEOUT_SECS`.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(namespace) = std::env::var("TIERCACHE_NAMESPACE") {
            config.namespace = namespace;
        }
        if let Some(secs) = env_parse::<u64>("TIERCACHE_TTL_SECS") {
            config.default_ttl = Duration::from_secs(secs);
        }
        if let Some(enabled) = env_flag("TIERCACHE_SEMANTIC_ENABLED") {
            config.semantic_enabled = enabled;
        }
        if let Some(threshold) = env_parse::<f32>("TIERCACHE_SEMANTIC_THRESHOLD") {
            config.semantic_threshold = threshold.clamp(0.0, 1.0);
        }
        if let Some(enabled) = env_flag("TIERCACHE_FAST_TIER_ONLY") {
            config.fast_tier_only = enabled;
        }
        if let Some(enabled) = env_flag("TIERCACHE_AUDIT_ENABLED") {
            config.audit_enabled = enabled;
        }
        if let Some(secs) = env_parse::<u64>("TIERCACHE_DURABLE_TIMEOUT_SECS") {
            config.durable_timeout = Duration::from_secs(secs);
        }

        config
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

fn env_flag(name: &str) -> Option<bool> {
    std::env::var(name)
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

/// Which tier served a lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupSource {
    /// In-process fast tier
    Memory,
    /// Remote durable tier
    Durable,
    /// Similarity fallback
    Semantic,
    /// No tier had the entry
    Miss,
}

/// Result of a cache lookup
#[derive(Debug, Clone)]
pub struct CacheLookup {
    /// Whether any tier produced a value
    pub hit: bool,
    /// Which tier served the value
    pub source: LookupSource,
    /// Cached value as raw JSON
    pub value: Option<String>,
    /// Similarity score, present for semantic hits
    pub similarity: Option<f32>,
}

impl CacheLookup {
    fn miss() -> Self {
        Self {
            hit: false,
            source: LookupSource::Miss,
            value: None,
            similarity: None,
        }
    }

    fn hit(source: LookupSource, value: String, similarity: Option<f32>) -> Self {
        Self {
            hit: true,
            source,
            value: Some(value),
            similarity,
        }
    }

    /// Deserializes the cached value
    pub fn value_as<T: DeserializeOwned>(&self) -> Result<Option<T>, CacheError> {
        match &self.value {
            Some(raw) => {
                let value = serde_json::from_str(raw).map_err(|e| {
                    CacheError::internal(format!("failed to deserialize cached value: {}", e))
                })?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }
}

/// Counters snapshot
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    /// Lookups entering the pipeline
    pub requests: u64,
    /// Hits served by the fast tier
    pub memory_hits: u64,
    /// Hits served by the durable tier
    pub durable_hits: u64,
    /// Hits served by the similarity fallback
    pub semantic_hits: u64,
    /// Lookups no tier could serve
    pub misses: u64,
    /// Computations run through `get_or_compute`
    pub computes: u64,
    /// Failed computations
    pub compute_errors: u64,
    /// Entries currently in the fast tier
    pub fast_tier_entries: usize,
}

impl CacheStats {
    /// Fraction of requests served from any tier
    pub fn hit_rate(&self) -> f32 {
        if self.requests == 0 {
            return 0.0;
        }
        let hits = self.memory_hits + self.durable_hits + self.semantic_hits;
        hits as f32 / self.requests as f32
    }
}

#[derive(Debug, Default)]
struct Counters {
    requests: AtomicU64,
    memory_hits: AtomicU64,
    durable_hits: AtomicU64,
    semantic_hits: AtomicU64,
    misses: AtomicU64,
    computes: AtomicU64,
    compute_errors: AtomicU64,
}

/// Semantic fallback collaborators
#[derive(Debug, Clone)]
struct SemanticFallback {
    index: Arc<dyn SimilarityIndex>,
    embedder: Arc<dyn Embedder>,
}

/// Tiered request cache
///
/// Lookup pipeline: derive key, fast tier, durable tier (write-through
/// back into the fast tier on hit), similarity fallback, miss. Writes go
/// to the fast tier first and then to the durable tier; a durable failure
/// leaves the entry cached fast-tier-only and is logged, never raised.
///
/// Concurrent identical requests issued through [`get_or_compute`] share a
/// single computation via a per-key in-flight registry.
///
/// [`get_or_compute`]: RequestCache::get_or_compute
#[derive(Debug)]
pub struct RequestCache {
    key_deriver: KeyDeriver,
    fast: Arc<dyn EntryStore>,
    durable: Option<Arc<dyn EntryStore>>,
    semantic: Option<SemanticFallback>,
    audit: Option<Arc<dyn AuditSink>>,
    config: RequestCacheConfig,
    in_flight: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    counters: Counters,
}

impl RequestCache {
    /// Creates a fast-tier-only cache with default configuration
    pub fn new(fast: Arc<dyn EntryStore>) -> Self {
        Self {
            key_deriver: KeyDeriver::new(),
            fast,
            durable: None,
            semantic: None,
            audit: None,
            config: RequestCacheConfig::default(),
            in_flight: Mutex::new(HashMap::new()),
            counters: Counters::default(),
        }
    }

    /// Attaches the durable tier
    pub fn with_durable(mut self, durable: Arc<dyn EntryStore>) -> Self {
        self.durable = Some(durable);
        self
    }

    /// Attaches the similarity fallback
    pub fn with_semantic(
        mut self,
        index: Arc<dyn SimilarityIndex>,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        self.semantic = Some(SemanticFallback { index, embedder });
        self
    }

    /// Attaches the audit sink
    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Replaces the configuration
    pub fn with_config(mut self, config: RequestCacheConfig) -> Self {
        self.config = config;
        self
    }

    /// Current configuration
    pub fn config(&self) -> &RequestCacheConfig {
        &self.config
    }

    fn semantic_active(&self) -> bool {
        self.config.semantic_enabled && self.semantic.is_some()
    }

    fn durable_active(&self) -> bool {
        !self.config.fast_tier_only && self.durable.is_some()
    }

    /// Derives the namespaced key for a payload
    pub fn derive_key(&self, payload: &RequestPayload) -> Result<CacheKey, CacheError> {
        self.key_deriver
            .derive_with_namespace(&self.config.namespace, payload)
    }

    /// Looks up a payload across all tiers
    ///
    /// Never fails for backend reasons; only an unhashable payload is an
    /// error.
    pub async fn get(&self, payload: &RequestPayload) -> Result<CacheLookup, CacheError> {
        let key = self.derive_key(payload)?;
        let request_tx = self.record_request(&key).await;

        self.lookup(payload, &key, request_tx).await
    }

    async fn lookup(
        &self,
        payload: &RequestPayload,
        key: &CacheKey,
        request_tx: Option<Uuid>,
    ) -> Result<CacheLookup, CacheError> {
        self.counters.requests.fetch_add(1, Ordering::Relaxed);

        // 1. fast tier
        match self.fast.get(key.as_str()).await {
            Ok(Some(mut entry)) => {
                debug!(key = %key, "cache hit (memory)");
                self.counters.memory_hits.fetch_add(1, Ordering::Relaxed);

                entry.increment_hits();
                let value = entry.value().to_string();

                // persist the hit count without holding up the response
                let fast = self.fast.clone();
                tokio::spawn(async move {
                    let _ = fast.put(entry).await;
                });

                self.record_hit(TransactionKind::MemoryHit, key, request_tx, None)
                    .await;
                return Ok(CacheLookup::hit(LookupSource::Memory, value, None));
            }
            Ok(None) => {}
            Err(e) => warn!(key = %key, error = %e, "fast tier lookup failed"),
        }

        // 2. durable tier
        if self.durable_active() {
            if let Some(entry) = self.durable_get(key).await {
                debug!(key = %key, "cache hit (durable)");
                self.counters.durable_hits.fetch_add(1, Ordering::Relaxed);

                let value = entry.value().to_string();

                // write-through so the next lookup is served in process
                if let Err(e) = self.fast.put(entry).await {
                    warn!(key = %key, error = %e, "failed to populate fast tier");
                }

                self.record_hit(TransactionKind::CacheHit, key, request_tx, None)
                    .await;
                return Ok(CacheLookup::hit(LookupSource::Durable, value, None));
            }
        }

        // 3. similarity fallback
        if self.semantic_active() {
            match self.semantic_lookup(payload).await {
                Ok(Some((entry, score))) => {
                    debug!(key = %key, score, "cache hit (semantic)");
                    self.counters.semantic_hits.fetch_add(1, Ordering::Relaxed);

                    let value = entry.value().to_string();

                    if let Err(e) = self.fast.put(entry).await {
                        warn!(key = %key, error = %e, "failed to populate fast tier");
                    }

                    self.record_hit(TransactionKind::SemanticHit, key, request_tx, Some(score))
                        .await;
                    return Ok(CacheLookup::hit(LookupSource::Semantic, value, Some(score)));
                }
                Ok(None) => {}
                Err(e) => warn!(key = %key, error = %e, "semantic lookup skipped"),
            }
        }

        debug!(key = %key, "cache miss");
        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        Ok(CacheLookup::miss())
    }

    /// Durable-tier read under the configured time budget
    async fn durable_get(&self, key: &CacheKey) -> Option<CacheEntry> {
        let durable = self.durable.as_ref()?;

        match timeout(self.config.durable_timeout, durable.get(key.as_str())).await {
            Ok(Ok(entry)) => entry,
            Ok(Err(e)) => {
                warn!(key = %key, error = %e, "durable tier degraded, treating as miss");
                None
            }
            Err(_) => {
                warn!(key = %key, "durable tier lookup timed out, treating as miss");
                None
            }
        }
    }

    /// Embeds the payload and resolves the best similarity match
    async fn semantic_lookup(
        &self,
        payload: &RequestPayload,
    ) -> Result<Option<(CacheEntry, f32)>, CacheError> {
        let Some(semantic) = self.semantic.as_ref() else {
            return Ok(None);
        };

        if payload.text().is_empty() {
            return Ok(None);
        }

        let vector = semantic.embedder.embed(payload.text()).await?;
        let matches = semantic
            .index
            .query(&vector, self.config.semantic_top_k)
            .await?;

        for candidate in matches {
            if candidate.score < self.config.semantic_threshold {
                // descending order: nothing further can qualify
                break;
            }

            let key = CacheKey::from_raw(candidate.key.as_str());
            let entry = if self.durable_active() {
                self.durable_get(&key).await
            } else {
                self.fast.get(key.as_str()).await.unwrap_or_default()
            };

            match entry {
                Some(entry) => return Ok(Some((entry, candidate.score))),
                None => {
                    // matched embedding outlived its entry; drop it
                    let _ = semantic.index.delete(&candidate.key).await;
                }
            }
        }

        Ok(None)
    }

    /// Caches a value under the payload's key with the default TTL
    pub async fn set<V: Serialize>(
        &self,
        payload: &RequestPayload,
        value: &V,
    ) -> Result<(), CacheError> {
        self.set_with_ttl(payload, value, self.config.default_ttl)
            .await
    }

    /// Caches a value with an explicit TTL
    pub async fn set_with_ttl<V: Serialize>(
        &self,
        payload: &RequestPayload,
        value: &V,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let key = self.derive_key(payload)?;
        let json = serde_json::to_string(value)
            .map_err(|e| CacheError::invalid_payload(format!("value not serializable: {}", e)))?;

        self.store(payload, &key, json, ttl).await;
        Ok(())
    }

    /// Writes an entry through all configured tiers, degrading on failure
    async fn store(&self, payload: &RequestPayload, key: &CacheKey, json: String, ttl: Duration) {
        let mut entry = CacheEntry::new(key.as_str(), json, ttl);
        if let Some(tier) = &self.config.tier_metadata {
            entry = entry.with_tier_metadata(tier.clone());
        }

        if let Err(e) = self.fast.put(entry.clone()).await {
            warn!(key = %key, error = %e, "fast tier write failed");
        }

        if !self.config.fast_tier_only {
            if let Some(durable) = &self.durable {
                match timeout(self.config.durable_timeout, durable.put(entry)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        warn!(key = %key, error = %e, "durable write failed, entry cached fast-tier-only");
                    }
                    Err(_) => {
                        warn!(key = %key, "durable write timed out, entry cached fast-tier-only");
                    }
                }
            }
        }

        if self.semantic_active() {
            if let Err(e) = self.index_embedding(payload, key).await {
                warn!(key = %key, error = %e, "embedding upsert skipped");
            }
        }
    }

    async fn index_embedding(
        &self,
        payload: &RequestPayload,
        key: &CacheKey,
    ) -> Result<(), CacheError> {
        let Some(semantic) = self.semantic.as_ref() else {
            return Ok(());
        };

        if payload.text().is_empty() {
            return Ok(());
        }

        let vector = semantic.embedder.embed(payload.text()).await?;
        let record = EmbeddingRecord::new(key.as_str(), vector)
            .with_metadata("namespace", self.config.namespace.clone());

        semantic.index.upsert(record).await
    }

    /// Removes the payload's entry from every tier
    pub async fn invalidate(&self, payload: &RequestPayload) -> Result<(), CacheError> {
        let key = self.derive_key(payload)?;

        if let Err(e) = self.fast.invalidate(key.as_str()).await {
            warn!(key = %key, error = %e, "fast tier invalidation failed");
        }

        if let Some(durable) = &self.durable {
            match timeout(self.config.durable_timeout, durable.invalidate(key.as_str())).await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => warn!(key = %key, error = %e, "durable invalidation failed"),
                Err(_) => warn!(key = %key, "durable invalidation timed out"),
            }
        }

        if let Some(semantic) = &self.semantic {
            if let Err(e) = semantic.index.delete(key.as_str()).await {
                warn!(key = %key, error = %e, "embedding deletion failed");
            }
        }

        Ok(())
    }

    /// Removes every entry in this cache's namespace from every tier
    pub async fn invalidate_all(&self) -> Result<(), CacheError> {
        let pattern = format!("{}:*", self.config.namespace);

        if let Err(e) = self.fast.invalidate_pattern(&pattern).await {
            warn!(error = %e, "fast tier namespace invalidation failed");
        }

        if let Some(durable) = &self.durable {
            match timeout(self.config.durable_timeout, durable.invalidate_pattern(&pattern)).await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => warn!(error = %e, "durable namespace invalidation failed"),
                Err(_) => warn!("durable namespace invalidation timed out"),
            }
        }

        if let Some(semantic) = &self.semantic {
            if let Err(e) = semantic.index.clear().await {
                warn!(error = %e, "embedding index clear failed");
            }
        }

        Ok(())
    }

    /// Looks up the payload, computing and caching the value on a miss
    ///
    /// Concurrent callers with the same payload share one computation: the
    /// first caller runs `compute` while the rest wait, re-check the cache
    /// and are served the stored result. Compute failures propagate to
    /// every caller that ran the computation and are not cached.
    pub async fn get_or_compute<T, F, Fut>(
        &self,
        payload: &RequestPayload,
        compute: F,
    ) -> Result<T, CacheError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, CacheError>>,
    {
        let key = self.derive_key(payload)?;
        let request_tx = self.record_request(&key).await;

        // optimistic lookup before taking the in-flight slot
        let lookup = self.lookup(payload, &key, request_tx).await?;
        if let Some(value) = lookup.value_as()? {
            return Ok(value);
        }

        let flight = {
            let mut flights = self.in_flight.lock().await;
            flights
                .entry(key.as_str().to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };

        let _guard = flight.lock().await;

        // a concurrent holder may have filled the cache while we waited
        let lookup = self.lookup(payload, &key, request_tx).await?;
        if let Some(value) = lookup.value_as()? {
            self.release_flight(&key).await;
            return Ok(value);
        }

        self.counters.computes.fetch_add(1, Ordering::Relaxed);
        let result = compute().await;

        match &result {
            Ok(value) => {
                self.record_compute(TransactionKind::ComputeSuccess, &key, request_tx, None)
                    .await;

                match serde_json::to_string(value) {
                    Ok(json) => {
                        self.store(payload, &key, json, self.config.default_ttl).await;
                    }
                    Err(e) => {
                        warn!(key = %key, error = %e, "computed value not cacheable");
                    }
                }
            }
            Err(e) => {
                self.counters.compute_errors.fetch_add(1, Ordering::Relaxed);
                self.record_compute(
                    TransactionKind::ComputeError,
                    &key,
                    request_tx,
                    Some(e.to_string()),
                )
                .await;
            }
        }

        self.release_flight(&key).await;
        result
    }

    async fn release_flight(&self, key: &CacheKey) {
        let mut flights = self.in_flight.lock().await;
        flights.remove(key.as_str());
    }

    /// Counter snapshot plus fast-tier occupancy
    pub async fn stats(&self) -> CacheStats {
        let fast_tier_entries = self.fast.size().await.unwrap_or(0);

        CacheStats {
            requests: self.counters.requests.load(Ordering::Relaxed),
            memory_hits: self.counters.memory_hits.load(Ordering::Relaxed),
            durable_hits: self.counters.durable_hits.load(Ordering::Relaxed),
            semantic_hits: self.counters.semantic_hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            computes: self.counters.computes.load(Ordering::Relaxed),
            compute_errors: self.counters.compute_errors.load(Ordering::Relaxed),
            fast_tier_entries,
        }
    }

    // -- audit helpers -----------------------------------------------------

    async fn record_request(&self, key: &CacheKey) -> Option<Uuid> {
        self.record_audit(AuditTransaction::new(TransactionKind::Request, key.as_str()))
            .await
    }

    async fn record_hit(
        &self,
        kind: TransactionKind,
        key: &CacheKey,
        request_tx: Option<Uuid>,
        similarity: Option<f32>,
    ) {
        let mut tx = AuditTransaction::new(kind, key.as_str());
        if let Some(id) = request_tx {
            tx = tx.with_correlation(id);
        }
        if let Some(score) = similarity {
            tx = tx.with_data(serde_json::json!({ "similarity": score }));
        }

        self.record_audit(tx).await;
    }

    async fn record_compute(
        &self,
        kind: TransactionKind,
        key: &CacheKey,
        request_tx: Option<Uuid>,
        error: Option<String>,
    ) {
        let mut tx = AuditTransaction::new(kind, key.as_str());
        if let Some(id) = request_tx {
            tx = tx.with_correlation(id);
        }
        if let Some(message) = error {
            tx = tx.with_data(serde_json::json!({ "error": message }));
        }

        self.record_audit(tx).await;
    }

    async fn record_audit(&self, transaction: AuditTransaction) -> Option<Uuid> {
        if !self.config.audit_enabled {
            return None;
        }

        let sink = self.audit.as_ref()?;
        match sink.record(transaction).await {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(error = %e, "audit write failed");
                None
            }
        }
    }
}
