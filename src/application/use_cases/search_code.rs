use std::sync::Arc;

use crate::application::{ChunkHit, EmbeddingService, SearchFilter, VectorRepository};
use crate::domain::{ContentType, DomainError};

use super::commit_scope::CommitScope;

/// Semantic search inputs beyond the repo/commit scope.
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub limit: usize,
    pub min_score: Option<f32>,
    pub language: Option<String>,
    pub path_pattern: Option<String>,
    pub content_type: Option<ContentType>,
}

/// Semantic search: embed the query, then similarity-search the vector store
/// with commit-scoped filters, one scope at a time.
pub struct SearchCodeUseCase {
    vector: Arc<dyn VectorRepository>,
    embedding: Arc<dyn EmbeddingService>,
}

impl SearchCodeUseCase {
    pub fn new(vector: Arc<dyn VectorRepository>, embedding: Arc<dyn EmbeddingService>) -> Self {
        Self { vector, embedding }
    }

    pub async fn execute(
        &self,
        query: &str,
        scopes: &[CommitScope],
        options: &SearchOptions,
    ) -> Result<Vec<ChunkHit>, DomainError> {
        if query.trim().is_empty() {
            return Err(DomainError::invalid_argument("Empty search query"));
        }
        let limit = if options.limit == 0 { 10 } else { options.limit };
        let query_vector = self.embedding.embed(query).await?;

        let mut hits = Vec::new();
        for scope in scopes {
            let filter = SearchFilter {
                repo_id: Some(scope.repo.id().to_string()),
                commit_sha: Some(scope.commit.commit_sha().to_string()),
                language: options.language.clone(),
                path_pattern: options.path_pattern.clone(),
                content_type: options.content_type,
            };
            hits.extend(self.vector.search(&query_vector, &filter, limit).await?);
        }

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        if let Some(min_score) = options.min_score {
            hits.retain(|hit| hit.score >= min_score);
        }
        hits.truncate(limit);
        Ok(hits)
    }
}
