use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use async_trait::async_trait;
use rand::Rng;
use rand::SeedableRng;
use tracing::debug;

use crate::application::EmbeddingService;
use crate::domain::DomainError;

const DEFAULT_DIMENSIONS: usize = 384;
const DEFAULT_MAX_TOKENS: usize = 512;

/// Deterministic local embedding provider: vectors are seeded from a content
/// hash and normalised, so identical text always embeds identically. Useful
/// for SQI-focused setups and tests that don't need semantic quality.
pub struct HashEmbedding {
    dimensions: usize,
}

impl HashEmbedding {
    pub fn new() -> Self {
        Self {
            dimensions: DEFAULT_DIMENSIONS,
        }
    }

    pub fn with_dimensions(dimensions: usize) -> Self {
        Self { dimensions }
    }

    fn generate(&self, text: &str) -> Vec<f32> {
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        let seed = hasher.finish();

        let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
        let mut vector: Vec<f32> = (0..self.dimensions)
            .map(|_| rng.gen_range(-1.0..1.0))
            .collect();

        let magnitude: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut vector {
                *value /= magnitude;
            }
        }
        vector
    }
}

impl Default for HashEmbedding {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingService for HashEmbedding {
    async fn initialize(&self) -> Result<(), DomainError> {
        Ok(())
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, DomainError> {
        Ok(self.generate(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, DomainError> {
        let vectors: Vec<Vec<f32>> = texts.iter().map(|t| self.generate(t)).collect();
        debug!("Generated {} hash embeddings", vectors.len());
        Ok(vectors)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn max_tokens(&self) -> usize {
        DEFAULT_MAX_TOKENS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_embedding_deterministic() {
        let service = HashEmbedding::new();
        let first = service.embed("hello world").await.unwrap();
        let second = service.embed("hello world").await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_embedding_dimensions() {
        let service = HashEmbedding::with_dimensions(128);
        let vector = service.embed("test").await.unwrap();
        assert_eq!(vector.len(), 128);
    }

    #[tokio::test]
    async fn test_embedding_normalized() {
        let service = HashEmbedding::new();
        let vector = service.embed("test").await.unwrap();
        let magnitude: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((magnitude - 1.0).abs() < 0.001);
    }

    #[tokio::test]
    async fn test_batch_matches_single() {
        let service = HashEmbedding::new();
        let single = service.embed("alpha").await.unwrap();
        let batch = service
            .embed_batch(&["alpha".to_string(), "beta".to_string()])
            .await
            .unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0], single);
        assert_ne!(batch[0], batch[1]);
    }
}
