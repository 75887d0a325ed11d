use async_trait::async_trait;

use crate::domain::DomainError;

/// Generates vector embeddings for chunk content and search queries.
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    /// One-time readiness check (model load, remote health probe).
    async fn initialize(&self) -> Result<(), DomainError>;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, DomainError>;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, DomainError>;

    fn dimensions(&self) -> usize;

    fn max_tokens(&self) -> usize;
}
