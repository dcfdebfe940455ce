//! Embedding capability seam.
//!
//! The pipeline never talks to a concrete embedding backend directly; the
//! store receives an [`EmbeddingProvider`] and calls it behind a timeout.
//! [`MockEmbeddingProvider`] gives deterministic vectors for tests and
//! offline runs.

use async_trait::async_trait;

use crate::types::RagError;

/// External capability that maps texts to fixed-dimension vectors.
///
/// Implementations must return one vector per input text, each of
/// [`dimension`](Self::dimension) length; the store rejects anything else
/// before writing.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Provider label used in logs and degradation notes.
    fn name(&self) -> &str;

    /// Fixed dimension of every vector this provider returns.
    fn dimension(&self) -> usize;

    /// Embeds a batch of texts, preserving input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError>;

    /// Embeds a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RagError> {
        let texts = [text.to_string()];
        let mut vectors = self.embed_batch(&texts).await?;
        vectors
            .pop()
            .ok_or_else(|| RagError::Embedding(format!("{} returned no vector", self.name())))
    }
}

/// Deterministic hash-based provider for tests and offline pipelines.
///
/// Identical text always maps to an identical vector, so exact-content
/// queries land at distance zero. Not semantically meaningful.
#[derive(Clone, Debug)]
pub struct MockEmbeddingProvider {
    dimension: usize,
}

impl MockEmbeddingProvider {
    pub fn new() -> Self {
        Self { dimension: 8 }
    }

    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }
}

impl Default for MockEmbeddingProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        Ok(texts
            .iter()
            .map(|text| hash_to_vec(text, self.dimension))
            .collect())
    }
}

fn hash_to_vec(text: &str, dimension: usize) -> Vec<f32> {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    let seed = hasher.finish();
    (0..dimension)
        .map(|i| {
            let bits = seed.rotate_left((i as u32) * 8) ^ ((i as u64) << 24);
            (bits as f32) / u32::MAX as f32
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_embeddings_are_deterministic() {
        let provider = MockEmbeddingProvider::new();
        let inputs = vec![
            "Hello world".to_string(),
            "Goodbye world".to_string(),
            "Hello world".to_string(),
        ];

        let first = provider.embed_batch(&inputs).await.unwrap();
        let second = provider.embed_batch(&inputs).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first[0], first[2], "identical text, identical vector");
        assert_ne!(first[0], first[1], "different text, different vector");
        assert!(first.iter().all(|v| v.len() == provider.dimension()));
    }

    #[tokio::test]
    async fn single_embed_matches_batch() {
        let provider = MockEmbeddingProvider::with_dimension(4);
        let single = provider.embed("same text").await.unwrap();
        let batch = provider
            .embed_batch(&["same text".to_string()])
            .await
            .unwrap();
        assert_eq!(single, batch[0]);
    }
}
