//! Similarity index trait definition

use std::collections::BTreeMap;
use std::fmt::Debug;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::cache::current_time_millis;
use crate::domain::CacheError;

/// An embedding vector stored alongside a cache entry
///
/// Logically owned by the similarity index; removed (best-effort) when the
/// parent cache entry is invalidated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    /// Cache key of the parent entry
    key: String,
    /// Embedding vector, fixed dimension per index
    vector: Vec<f32>,
    /// Small metadata map (namespace, model id)
    metadata: BTreeMap<String, String>,
    /// Creation timestamp (epoch millis), used for eviction ordering
    created_at: u64,
}

impl EmbeddingRecord {
    /// Creates a new record for a cache key
    pub fn new(key: impl Into<String>, vector: Vec<f32>) -> Self {
        Self {
            key: key.into(),
            vector,
            metadata: BTreeMap::new(),
            created_at: current_time_millis(),
        }
    }

    /// Adds a metadata field
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn vector(&self) -> &[f32] {
        &self.vector
    }

    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    pub fn created_at(&self) -> u64 {
        self.created_at
    }
}

/// A single nearest-neighbor match
#[derive(Debug, Clone)]
pub struct SimilarityMatch {
    /// Cache key of the matched record
    pub key: String,
    /// Cosine similarity to the query vector, in [-1, 1]
    pub score: f32,
    /// Metadata stored with the record
    pub metadata: BTreeMap<String, String>,
}

/// Trait for nearest-neighbor vector indexes (Pinecone-style backends)
#[async_trait]
pub trait SimilarityIndex: Send + Sync + Debug {
    /// Inserts or replaces the record for a key
    async fn upsert(&self, record: EmbeddingRecord) -> Result<(), CacheError>;

    /// Returns up to `top_k` matches ordered by descending score
    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<SimilarityMatch>, CacheError>;

    /// Removes the record for a key; idempotent
    async fn delete(&self, key: &str) -> Result<bool, CacheError>;

    /// Removes every record
    async fn clear(&self) -> Result<(), CacheError>;

    /// Number of stored records
    async fn size(&self) -> Result<usize, CacheError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_builder() {
        let record = EmbeddingRecord::new("k1", vec![0.1, 0.2])
            .with_metadata("namespace", "responses")
            .with_metadata("model", "gpt-4");

        assert_eq!(record.key(), "k1");
        assert_eq!(record.vector(), &[0.1, 0.2]);
        assert_eq!(record.metadata().len(), 2);
        assert!(record.created_at() > 0);
    }
}
