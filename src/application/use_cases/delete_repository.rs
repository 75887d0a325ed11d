use std::sync::Arc;

use tracing::info;

use crate::application::{MetadataStore, StructureIndex, VectorRepository};
use crate::domain::DomainError;

/// Deletes a repository: every indexed commit, its structure-index rows, and
/// its vector chunks.
pub struct DeleteRepositoryUseCase {
    metadata: Arc<dyn MetadataStore>,
    structure: Arc<dyn StructureIndex>,
    vector: Arc<dyn VectorRepository>,
}

impl DeleteRepositoryUseCase {
    pub fn new(
        metadata: Arc<dyn MetadataStore>,
        structure: Arc<dyn StructureIndex>,
        vector: Arc<dyn VectorRepository>,
    ) -> Self {
        Self {
            metadata,
            structure,
            vector,
        }
    }

    /// `id_or_name` may be a repository ID, a name, or an indexed path.
    pub async fn execute(&self, id_or_name: &str) -> Result<String, DomainError> {
        let repository = match self.metadata.find_repository_by_id(id_or_name).await? {
            Some(repo) => repo,
            None => match self.metadata.find_repository_by_path(id_or_name).await? {
                Some(repo) => repo,
                None => {
                    let matches = self.metadata.find_repository_by_name(id_or_name).await?;
                    match matches.len() {
                        0 => {
                            return Err(DomainError::not_indexed(format!(
                                "No repository matching '{}'",
                                id_or_name
                            )))
                        }
                        1 => matches.into_iter().next().unwrap(),
                        n => {
                            return Err(DomainError::invalid_argument(format!(
                                "'{}' matches {} repositories; use the ID",
                                id_or_name, n
                            )))
                        }
                    }
                }
            },
        };

        let commit_ids = self
            .metadata
            .delete_all_commits_for_repo(repository.id())
            .await?;
        self.structure.delete_commits(&commit_ids).await?;
        self.vector.delete_by_repo_id(repository.id()).await?;
        self.metadata.delete_repository(repository.id()).await?;

        info!(
            "Deleted repository {} ({} commits)",
            repository.name(),
            commit_ids.len()
        );
        Ok(repository.name().to_string())
    }
}
