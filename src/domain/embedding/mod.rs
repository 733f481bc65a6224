//! Embedding generation trait and vector math
//!
//! Embedding backends are external collaborators; the cache only needs a
//! single `text -> vector` operation. A failing or absent embedder turns
//! the semantic fallback into a guaranteed miss, never an error.

use std::fmt::Debug;

use async_trait::async_trait;

use crate::domain::CacheError;

/// Trait for embedding providers (OpenAI, Cohere, etc.)
#[async_trait]
pub trait Embedder: Send + Sync + Debug {
    /// Generates an embedding vector for the given text
    async fn embed(&self, text: &str) -> Result<Vec<f32>, CacheError>;

    /// Dimension of the vectors this embedder produces
    fn dimensions(&self) -> usize;
}

/// Calculate cosine similarity between two vectors
///
/// Returns a score in [-1, 1]; mismatched or zero-length vectors score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Mock embedder for testing
    ///
    /// Produces deterministic vectors derived from a byte hash of the text.
    /// Specific texts can be pinned to fixed vectors to construct exact
    /// similarity relationships.
    #[derive(Debug)]
    pub struct MockEmbedder {
        dimensions: usize,
        pinned: Mutex<HashMap<String, Vec<f32>>>,
        error: Option<String>,
    }

    impl MockEmbedder {
        pub fn new(dimensions: usize) -> Self {
            Self {
                dimensions,
                pinned: Mutex::new(HashMap::new()),
                error: None,
            }
        }

        /// Pins a text to an exact vector
        pub fn with_vector(self, text: impl Into<String>, vector: Vec<f32>) -> Self {
            self.pinned.lock().unwrap().insert(text.into(), vector);
            self
        }

        pub fn with_error(mut self, error: impl Into<String>) -> Self {
            self.error = Some(error.into());
            self
        }
    }

    #[async_trait]
    impl Embedder for MockEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>, CacheError> {
            if let Some(ref error) = self.error {
                return Err(CacheError::similarity_unavailable(error.clone()));
            }

            if let Some(vector) = self.pinned.lock().unwrap().get(text) {
                return Ok(vector.clone());
            }

            let hash = text.bytes().fold(0u64, |acc, b| acc.wrapping_add(b as u64));
            let vector: Vec<f32> = (0..self.dimensions)
                .map(|i| ((hash.wrapping_add(i as u64) % 1000) as f32 / 1000.0) - 0.5)
                .collect();

            Ok(vector)
        }

        fn dimensions(&self) -> usize {
            self.dimensions
        }
    }
}
