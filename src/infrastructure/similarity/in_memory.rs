//! In-memory similarity index using linear search

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::domain::embedding::cosine_similarity;
use crate::domain::similarity::{EmbeddingRecord, SimilarityIndex, SimilarityMatch};
use crate::domain::CacheError;

/// In-memory nearest-neighbor index with linear scan
///
/// Suitable for development and small deployments; swap in an ANN-backed
/// implementation of [`SimilarityIndex`] for large record counts.
#[derive(Debug)]
pub struct InMemorySimilarityIndex {
    records: RwLock<HashMap<String, EmbeddingRecord>>,
    max_records: usize,
}

impl InMemorySimilarityIndex {
    /// Creates an index bounded to `max_records` entries
    pub fn new(max_records: usize) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            max_records,
        }
    }

    /// Evicts the oldest record when the index is full
    fn evict_if_needed(&self, records: &mut HashMap<String, EmbeddingRecord>) {
        if records.len() < self.max_records {
            return;
        }

        if let Some(oldest_key) = records
            .iter()
            .min_by_key(|(_, record)| record.created_at())
            .map(|(key, _)| key.clone())
        {
            records.remove(&oldest_key);
        }
    }
}

#[async_trait]
impl SimilarityIndex for InMemorySimilarityIndex {
    async fn upsert(&self, record: EmbeddingRecord) -> Result<(), CacheError> {
        let mut records = self
            .records
            .write()
            .map_err(|e| CacheError::internal(format!("failed to acquire write lock: {}", e)))?;

        if !records.contains_key(record.key()) {
            self.evict_if_needed(&mut records);
        }
        records.insert(record.key().to_string(), record);

        Ok(())
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<SimilarityMatch>, CacheError> {
        let records = self
            .records
            .read()
            .map_err(|e| CacheError::internal(format!("failed to acquire read lock: {}", e)))?;

        let mut matches: Vec<SimilarityMatch> = records
            .values()
            .map(|record| SimilarityMatch {
                key: record.key().to_string(),
                score: cosine_similarity(vector, record.vector()),
                metadata: record.metadata().clone(),
            })
            .collect();

        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        matches.truncate(top_k);

        Ok(matches)
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        let mut records = self
            .records
            .write()
            .map_err(|e| CacheError::internal(format!("failed to acquire write lock: {}", e)))?;

        Ok(records.remove(key).is_some())
    }

    async fn clear(&self) -> Result<(), CacheError> {
        let mut records = self
            .records
            .write()
            .map_err(|e| CacheError::internal(format!("failed to acquire write lock: {}", e)))?;

        records.clear();
        Ok(())
    }

    async fn size(&self) -> Result<usize, CacheError> {
        let records = self
            .records
            .read()
            .map_err(|e| CacheError::internal(format!("failed to acquire read lock: {}", e)))?;

        Ok(records.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upsert_and_query() {
        let index = InMemorySimilarityIndex::new(100);

        index
            .upsert(EmbeddingRecord::new("k1", vec![1.0, 0.0, 0.0]))
            .await
            .unwrap();

        let matches = index.query(&[1.0, 0.0, 0.0], 1).await.unwrap();

        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].key, "k1");
        assert!((matches[0].score - 1.0).abs() < 0.001);
    }

    #[tokio::test]
    async fn test_query_orders_by_score_descending() {
        let index = InMemorySimilarityIndex::new(100);

        index
            .upsert(EmbeddingRecord::new("low", vec![0.5, 0.5, 0.5]))
            .await
            .unwrap();
        index
            .upsert(EmbeddingRecord::new("high", vec![0.99, 0.1, 0.0]))
            .await
            .unwrap();
        index
            .upsert(EmbeddingRecord::new("medium", vec![0.8, 0.3, 0.0]))
            .await
            .unwrap();

        let matches = index.query(&[1.0, 0.0, 0.0], 3).await.unwrap();

        assert_eq!(matches.len(), 3);
        assert_eq!(matches[0].key, "high");
        assert!(matches[0].score >= matches[1].score);
        assert!(matches[1].score >= matches[2].score);
    }

    #[tokio::test]
    async fn test_query_respects_top_k() {
        let index = InMemorySimilarityIndex::new(100);

        for i in 0..5 {
            index
                .upsert(EmbeddingRecord::new(
                    format!("k{}", i),
                    vec![1.0, i as f32 / 10.0],
                ))
                .await
                .unwrap();
        }

        let matches = index.query(&[1.0, 0.0], 2).await.unwrap();
        assert_eq!(matches.len(), 2);
    }

    #[tokio::test]
    async fn test_upsert_replaces_existing() {
        let index = InMemorySimilarityIndex::new(100);

        index
            .upsert(EmbeddingRecord::new("k1", vec![1.0, 0.0]))
            .await
            .unwrap();
        index
            .upsert(EmbeddingRecord::new("k1", vec![0.0, 1.0]))
            .await
            .unwrap();

        assert_eq!(index.size().await.unwrap(), 1);

        let matches = index.query(&[0.0, 1.0], 1).await.unwrap();
        assert!((matches[0].score - 1.0).abs() < 0.001);
    }

    #[tokio::test]
    async fn test_delete() {
        let index = InMemorySimilarityIndex::new(100);

        index
            .upsert(EmbeddingRecord::new("k1", vec![1.0, 0.0]))
            .await
            .unwrap();

        assert!(index.delete("k1").await.unwrap());
        assert!(!index.delete("k1").await.unwrap());
        assert_eq!(index.size().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_eviction_at_capacity() {
        let index = InMemorySimilarityIndex::new(3);

        for i in 0..3 {
            index
                .upsert(EmbeddingRecord::new(format!("k{}", i), vec![i as f32]))
                .await
                .unwrap();
            // created_at has millisecond resolution; keep insertion order
            // observable to the evictor
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }

        index
            .upsert(EmbeddingRecord::new("k-new", vec![9.0]))
            .await
            .unwrap();

        assert_eq!(index.size().await.unwrap(), 3);
        // oldest record was dropped
        let matches = index.query(&[0.0], 10).await.unwrap();
        assert!(!matches.iter().any(|m| m.key == "k0"));
    }

    #[tokio::test]
    async fn test_clear() {
        let index = InMemorySimilarityIndex::new(100);

        index
            .upsert(EmbeddingRecord::new("k1", vec![1.0]))
            .await
            .unwrap();
        index.clear().await.unwrap();

        assert_eq!(index.size().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_metadata_returned_with_match() {
        let index = InMemorySimilarityIndex::new(100);

        index
            .upsert(
                EmbeddingRecord::new("k1", vec![1.0, 0.0]).with_metadata("model", "gpt-4"),
            )
            .await
            .unwrap();

        let matches = index.query(&[1.0, 0.0], 1).await.unwrap();
        assert_eq!(
            matches[0].metadata.get("model"),
            Some(&"gpt-4".to_string())
        );
    }
}
