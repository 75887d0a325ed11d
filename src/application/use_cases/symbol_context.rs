use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::application::{GitView, MetadataStore, StructureIndex};
use crate::domain::{DomainError, Import, Symbol, SymbolDocstring, SymbolParameter, Usage};

use super::commit_scope::{commit_ids, scope_for_commit, CommitScope};

const DEFAULT_MAX_USAGES: usize = 20;

#[derive(Debug, Clone, Default)]
pub struct SymbolContextOptions {
    pub include_source: bool,
    pub include_usages: bool,
    pub max_usages: Option<usize>,
}

/// Composite 360° view of one symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolContext {
    pub repo_name: String,
    pub symbol: Symbol,
    pub parameters: Vec<SymbolParameter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docstring: Option<SymbolDocstring>,
    /// The symbol's own source slice, when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub usages: Vec<Usage>,
    /// Imports declared by the symbol's file.
    pub file_imports: Vec<Import>,
    /// Files importing the symbol's module.
    pub importers: Vec<Import>,
    /// Other symbols declared in the same file.
    pub siblings: Vec<Symbol>,
}

/// `get_symbol_context`: symbol + source slice + usages + the file's imports
/// + importers of the file's module + sibling symbols.
pub struct SymbolContextUseCase {
    structure: Arc<dyn StructureIndex>,
    metadata: Arc<dyn MetadataStore>,
    git: Arc<dyn GitView>,
}

impl SymbolContextUseCase {
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
        options: &SymbolContextOptions,
    ) -> Result<SymbolContext, DomainError> {
        let candidates = self
            .structure
            .find_symbols_by_name(&commit_ids(scopes), symbol_name, None)
            .await?;
        let Some(symbol) = candidates.into_iter().next() else {
            return Err(DomainError::symbol_not_found(symbol_name));
        };
        let Some(scope) = scope_for_commit(scopes, symbol.commit_id) else {
            return Err(DomainError::internal("Scope lost for symbol commit"));
        };

        let parameters = self.structure.parameters_of(symbol.id).await?;
        let docstring = self.structure.docstring_of(symbol.id).await?;

        let source = if options.include_source {
            self.read_slice(scope, &symbol).await
        } else {
            None
        };

        let usages = if options.include_usages {
            let max_usages = options.max_usages.unwrap_or(DEFAULT_MAX_USAGES);
            let mut usages = self
                .structure
                .usages_by_name(&[scope.commit_id()], &symbol.name, None)
                .await?;
            usages.truncate(max_usages);
            usages
        } else {
            Vec::new()
        };

        let file_imports = self
            .structure
            .imports_for_file(scope.commit_id(), &symbol.file_path)
            .await?;

        // The symbol's module as an import target: its path minus extension.
        let module_path = symbol
            .file_path
            .rsplit_once('.')
            .map(|(stem, _)| stem.to_string())
            .unwrap_or_else(|| symbol.file_path.clone());
        let importers = self
            .structure
            .importers_of(&[scope.commit_id()], &module_path)
            .await?;

        let siblings = self
            .structure
            .symbols_in_file(scope.commit_id(), &symbol.file_path)
            .await?
            .into_iter()
            .filter(|s| s.id != symbol.id)
            .collect();

        Ok(SymbolContext {
            repo_name: scope.repo_name().to_string(),
            symbol,
            parameters,
            docstring,
            source,
            usages,
            file_imports,
            importers,
            siblings,
        })
    }

    async fn read_slice(&self, scope: &CommitScope, symbol: &Symbol) -> Option<String> {
        let blobs = self.metadata.get_file_blobs(scope.commit_id()).await.ok()?;
        let blob_sha = blobs
            .iter()
            .find(|b| b.file_path == symbol.file_path)
            .map(|b| b.blob_sha.clone())?;
        let bytes = self
            .git
            .read_blob(Path::new(scope.repo.path()), &blob_sha)
            .await
            .ok()?;
        let text = String::from_utf8_lossy(&bytes);
        let start = symbol.start_line.saturating_sub(1) as usize;
        let end = symbol.end_line as usize;
        let slice: Vec<&str> = text
            .lines()
            .skip(start)
            .take(end.saturating_sub(start))
            .collect();
        if slice.is_empty() {
            None
        } else {
            Some(slice.join("\n"))
        }
    }
}
