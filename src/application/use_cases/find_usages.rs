use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::application::{GitView, MetadataStore, StructureIndex};
use crate::domain::{DomainError, Usage};

use super::commit_scope::{scope_for_commit, CommitScope};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageMatch {
    pub repo_name: String,
    pub usage: Usage,
    /// The source line at the usage site, read from the indexed blob.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

/// `find_usages`: every usage row for a name, each with a one-line context
/// snippet extracted from the commit's source.
pub struct FindUsagesUseCase {
    structure: Arc<dyn StructureIndex>,
    metadata: Arc<dyn MetadataStore>,
    git: Arc<dyn GitView>,
}

impl FindUsagesUseCase {
    pub fn new(
        structure: Arc<dyn StructureIndex>,
        metadata: Arc<dyn MetadataStore>,
        git: Arc<dyn GitView>,
    ) -> Self {
        Self {
            structure,
            metadata,
            git,
        }
    }

    pub async fn execute(
        &self,
        scopes: &[CommitScope],
        symbol_name: &str,
        file_path: Option<&str>,
    ) -> Result<Vec<UsageMatch>, DomainError> {
        if symbol_name.is_empty() {
            return Err(DomainError::invalid_argument("Empty symbol name"));
        }
        let mut matches = Vec::new();
        for scope in scopes {
            let usages = self
                .structure
                .usages_by_name(&[scope.commit_id()], symbol_name, file_path)
                .await?;
            if usages.is_empty() {
                continue;
            }
            let contexts = self.load_contexts(scope, &usages).await;
            for usage in usages {
                let context = contexts
                    .get(&usage.file_path)
                    .and_then(|lines| lines.get(usage.line.saturating_sub(1) as usize))
                    .map(|line| line.trim_end().to_string());
                matches.push(UsageMatch {
                    repo_name: scope.repo_name().to_string(),
                    usage,
                    context,
                });
            }
        }
        Ok(matches)
    }

    /// Blob contents for every file a usage references, split into lines.
    /// Read failures degrade to usages without context.
    async fn load_contexts(
        &self,
        scope: &CommitScope,
        usages: &[Usage],
    ) -> HashMap<String, Vec<String>> {
        let mut wanted: Vec<&str> = usages.iter().map(|u| u.file_path.as_str()).collect();
        wanted.sort();
        wanted.dedup();

        let blobs = match self.metadata.get_file_blobs(scope.commit_id()).await {
            Ok(blobs) => blobs,
            Err(_) => return HashMap::new(),
        };
        let by_path: HashMap<&str, &str> = blobs
            .iter()
            .map(|b| (b.file_path.as_str(), b.blob_sha.as_str()))
            .collect();

        let mut contexts = HashMap::new();
        for path in wanted {
            let Some(blob_sha) = by_path.get(path) else {
                continue;
            };
            let Ok(bytes) = self
                .git
                .read_blob(Path::new(scope.repo.path()), blob_sha)
                .await
            else {
                continue;
            };
            let lines: Vec<String> = String::from_utf8_lossy(&bytes)
                .lines()
                .map(|l| l.to_string())
                .collect();
            contexts.insert(path.to_string(), lines);
        }
        contexts
    }
}

/// Stamp bare usage rows with their repo names (shared by other queries).
pub fn stamp_usages(scopes: &[CommitScope], usages: Vec<Usage>) -> Vec<UsageMatch> {
    usages
        .into_iter()
        .map(|usage| UsageMatch {
            repo_name: scope_for_commit(scopes, usage.commit_id)
                .map(|s| s.repo_name().to_string())
                .unwrap_or_default(),
            usage,
            context: None,
        })
        .collect()
}
