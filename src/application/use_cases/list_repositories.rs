use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::application::MetadataStore;
use crate::domain::{DomainError, IndexedCommit, Repository};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryListing {
    pub repository: Repository,
    pub commits: Vec<IndexedCommit>,
}

pub struct ListRepositoriesUseCase {
    metadata: Arc<dyn MetadataStore>,
}

impl ListRepositoriesUseCase {
    pub fn new(metadata: Arc<dyn MetadataStore>) -> Self {
        Self { metadata }
    }

    pub async fn execute(&self) -> Result<Vec<RepositoryListing>, DomainError> {
        let repositories = self.metadata.list_repositories().await?;
        let mut listings = Vec::with_capacity(repositories.len());
        for repository in repositories {
            let commits = self.metadata.commits_for_repo(repository.id()).await?;
            listings.push(RepositoryListing {
                repository,
                commits,
            });
        }
        Ok(listings)
    }
}
