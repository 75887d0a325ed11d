use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::application::StructureIndex;
use crate::domain::{DomainError, Import};

use super::commit_scope::{commit_ids, scope_for_commit, CommitScope};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportMatch {
    pub repo_name: String,
    pub import: Import,
}

/// `find_imports` / `find_importers`: what a file imports, and which files
/// import a module.
pub struct FindImportsUseCase {
    structure: Arc<dyn StructureIndex>,
}

impl FindImportsUseCase {
    pub fn new(structure: Arc<dyn StructureIndex>) -> Self {
        Self { structure }
    }

    /// Imports declared by one file, per scope.
    pub async fn imports_of(
        &self,
        scopes: &[CommitScope],
        file_path: &str,
    ) -> Result<Vec<ImportMatch>, DomainError> {
        let mut matches = Vec::new();
        for scope in scopes {
            let imports = self
                .structure
                .imports_for_file(scope.commit_id(), file_path)
                .await?;
            matches.extend(imports.into_iter().map(|import| ImportMatch {
                repo_name: scope.repo_name().to_string(),
                import,
            }));
        }
        Ok(matches)
    }

    /// Files importing a module specifier (or its resolved path).
    pub async fn importers_of(
        &self,
        scopes: &[CommitScope],
        module_specifier: &str,
    ) -> Result<Vec<ImportMatch>, DomainError> {
        let imports = self
            .structure
            .importers_of(&commit_ids(scopes), module_specifier)
            .await?;
        Ok(imports
            .into_iter()
            .map(|import| ImportMatch {
                repo_name: scope_for_commit(scopes, import.commit_id)
                    .map(|s| s.repo_name().to_string())
                    .unwrap_or_default(),
                import,
            })
            .collect())
    }
}
