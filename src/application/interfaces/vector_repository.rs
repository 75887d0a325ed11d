use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{Chunk, ContentType, DomainError};

/// A chunk plus everything the vector store needs to make it searchable.
#[derive(Debug, Clone)]
pub struct ChunkPayload {
    pub chunk_id: Uuid,
    pub chunk: Chunk,
    pub repo_id: String,
    pub repo_name: String,
    pub commit_sha: String,
    pub content_type: ContentType,
    pub vector: Vec<f32>,
}

/// Commit-scoped search filter.
#[derive(Debug, Clone, Default)]
pub struct SearchFilter {
    pub repo_id: Option<String>,
    pub commit_sha: Option<String>,
    pub language: Option<String>,
    pub path_pattern: Option<String>,
    pub content_type: Option<ContentType>,
}

/// One semantic search hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkHit {
    pub chunk_id: Uuid,
    pub repo_id: String,
    pub repo_name: String,
    pub file_path: String,
    pub symbol: String,
    pub symbol_type: String,
    pub language: String,
    pub content_type: String,
    pub start_line: u32,
    pub end_line: u32,
    pub content: String,
    pub score: f32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VectorStats {
    pub total_chunks: u64,
    pub total_embeddings: u64,
}

/// Vector storage and similarity search over chunk embeddings. The core only
/// sees this interface; the embedded DuckDB store and the Qdrant HTTP client
/// both implement it.
#[async_trait]
pub trait VectorRepository: Send + Sync {
    async fn initialize(&self) -> Result<(), DomainError>;

    async fn upsert_chunks(&self, payloads: &[ChunkPayload]) -> Result<(), DomainError>;

    /// Tag an already-stored chunk as also appearing in `commit_sha`,
    /// without re-embedding.
    async fn add_commit_to_chunk(
        &self,
        chunk_id: Uuid,
        commit_sha: &str,
    ) -> Result<(), DomainError>;

    async fn search(
        &self,
        query_vector: &[f32],
        filter: &SearchFilter,
        limit: usize,
    ) -> Result<Vec<ChunkHit>, DomainError>;

    async fn get_chunks(&self, chunk_ids: &[Uuid]) -> Result<Vec<ChunkHit>, DomainError>;

    /// Which of the given IDs already exist in the store.
    async fn chunks_exist(&self, chunk_ids: &[Uuid]) -> Result<Vec<Uuid>, DomainError>;

    async fn delete_chunks(&self, chunk_ids: &[Uuid]) -> Result<u64, DomainError>;

    async fn delete_by_repo_id(&self, repo_id: &str) -> Result<u64, DomainError>;

    async fn get_stats(&self) -> Result<VectorStats, DomainError>;

    async fn close(&self) -> Result<(), DomainError>;
}
