//! Similarity index trait and types
//!
//! Nearest-neighbor lookup over embedding vectors, used as the last
//! fallback after both exact-match tiers miss. The index reports scores;
//! the acceptance threshold is applied by the caller.

mod repository;

pub use repository::{EmbeddingRecord, SimilarityIndex, SimilarityMatch};
