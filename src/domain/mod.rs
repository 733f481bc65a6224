//! Domain layer - core traits and entities

pub mod audit;
pub mod cache;
pub mod embedding;
pub mod error;
pub mod similarity;

pub use audit::{AuditSink, AuditTransaction, LedgerAnchor, TransactionKind};
pub use cache::{CacheEntry, CacheKey, EntryStore, KeyDeriver, RequestPayload, TierMetadata};
pub use embedding::{cosine_similarity, Embedder};
pub use error::CacheError;
pub use similarity::{EmbeddingRecord, SimilarityIndex, SimilarityMatch};
