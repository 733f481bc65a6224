//! Tiered response cache
//!
//! A two-tier cache for expensive request/response computations (LLM
//! calls being the motivating case) with:
//! - a volatile in-process fast tier and a durable remote tier, both with
//!   per-entry TTL expiry
//! - optional semantic fallback: near-duplicate requests matched by
//!   embedding similarity are served as hits
//! - an append-only audit trail of cache and compute decisions, optionally
//!   anchored to an external ledger
//! - per-key request coalescing so concurrent identical requests share a
//!   single computation
//!
//! Cache infrastructure failures never fail the caller's request: a broken
//! durable tier, embedder, similarity index or audit sink degrades the
//! cache to slower paths (more misses), nothing else.
//!
//! ```no_run
//! use std::sync::Arc;
//! use tiercache::domain::RequestPayload;
//! use tiercache::infrastructure::services::RequestCache;
//! use tiercache::infrastructure::store::InMemoryStore;
//!
//! # async fn example() -> Result<(), tiercache::domain::CacheError> {
//! let cache = RequestCache::new(Arc::new(InMemoryStore::new()));
//!
//! let payload = RequestPayload::new("summarize: the rust book")
//!     .with_component("model", "gpt-4");
//!
//! let response: serde_json::Value = cache
//!     .get_or_compute(&payload, || async {
//!         // expensive call goes here
//!         Ok(serde_json::json!({"summary": "..."}))
//!     })
//!     .await?;
//! # let _ = response;
//! # Ok(())
//! # }
//! ```

pub mod domain;
pub mod infrastructure;

pub use domain::{CacheError, RequestPayload, TierMetadata};
pub use infrastructure::services::{
    CacheLookup, CacheStats, LookupSource, RequestCache, RequestCacheConfig,
};
