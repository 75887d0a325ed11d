use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::application::{MetadataStore, StructureIndex};
use crate::domain::{DomainError, Language};

use super::commit_scope::CommitScope;

const DEFAULT_MAX_MODULES: usize = 10;
const DEFAULT_MAX_HOTSPOTS: usize = 10;

/// File stems conventionally marking program entry points.
const ENTRY_POINT_STEMS: &[&str] = &["main", "index", "cli", "server", "app"];

#[derive(Debug, Clone, Default)]
pub struct SummaryOptions {
    pub include_hotspots: bool,
    pub include_dependencies: bool,
    pub max_modules: Option<usize>,
    pub max_hotspots: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LanguageStats {
    pub file_count: u64,
    pub symbol_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hotspot {
    pub symbol: String,
    pub qualified_name: String,
    pub file_path: String,
    pub usage_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoSummary {
    pub repo_name: String,
    pub commit_sha: String,
    pub total_files: u64,
    pub total_symbols: u64,
    pub total_usages: u64,
    pub total_imports: u64,
    pub languages: HashMap<String, LanguageStats>,
    /// Files with the most symbols.
    pub top_modules: Vec<(String, u64)>,
    pub entry_points: Vec<String>,
    pub hotspots: Vec<Hotspot>,
    /// External dependencies (unresolved imports) with occurrence counts.
    pub external_dependencies: Vec<(String, u64)>,
}

/// `codebase_summary`: aggregate statistics for each scope.
pub struct CodebaseSummaryUseCase {
    structure: Arc<dyn StructureIndex>,
    metadata: Arc<dyn MetadataStore>,
}

impl CodebaseSummaryUseCase {
    pub fn new(structure: Arc<dyn StructureIndex>, metadata: Arc<dyn MetadataStore>) -> Self {
        Self {
            structure,
            metadata,
        }
    }

    pub async fn execute(
        &self,
        scopes: &[CommitScope],
        options: &SummaryOptions,
    ) -> Result<Vec<RepoSummary>, DomainError> {
        let mut summaries = Vec::with_capacity(scopes.len());
        for scope in scopes {
            summaries.push(self.summarize(scope, options).await?);
        }
        Ok(summaries)
    }

    async fn summarize(
        &self,
        scope: &CommitScope,
        options: &SummaryOptions,
    ) -> Result<RepoSummary, DomainError> {
        let commit_id = scope.commit_id();
        let blobs = self.metadata.get_file_blobs(commit_id).await?;
        let symbol_counts = self.structure.symbol_counts_by_file(commit_id).await?;
        let symbols_per_file: HashMap<&str, u64> = symbol_counts
            .iter()
            .map(|(path, count)| (path.as_str(), *count))
            .collect();

        // Per-language stats from the file tree plus symbol counts.
        let mut languages: HashMap<String, LanguageStats> = HashMap::new();
        let mut entry_points = Vec::new();
        for blob in &blobs {
            let path = Path::new(&blob.file_path);
            let language = Language::from_path(path);
            if language.is_known() {
                let stats = languages.entry(language.to_string()).or_default();
                stats.file_count += 1;
                stats.symbol_count += symbols_per_file
                    .get(blob.file_path.as_str())
                    .copied()
                    .unwrap_or(0);
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if ENTRY_POINT_STEMS.contains(&stem) {
                    entry_points.push(blob.file_path.clone());
                }
            }
        }

        let max_modules = options.max_modules.unwrap_or(DEFAULT_MAX_MODULES);
        let top_modules: Vec<(String, u64)> =
            symbol_counts.into_iter().take(max_modules).collect();

        let hotspots = if options.include_hotspots {
            let max_hotspots = options.max_hotspots.unwrap_or(DEFAULT_MAX_HOTSPOTS);
            let mut hotspots = Vec::new();
            for (symbol_id, usage_count) in self
                .structure
                .usage_counts_by_definition(commit_id, max_hotspots)
                .await?
            {
                if let Some(symbol) = self.structure.symbol_by_id(symbol_id).await? {
                    hotspots.push(Hotspot {
                        symbol: symbol.name,
                        qualified_name: symbol.qualified_name,
                        file_path: symbol.file_path,
                        usage_count,
                    });
                }
            }
            hotspots
        } else {
            Vec::new()
        };

        let external_dependencies = if options.include_dependencies {
            let mut deps: Vec<(String, u64)> = self
                .structure
                .external_dependencies(commit_id)
                .await?
                .into_iter()
                .collect();
            deps.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
            deps
        } else {
            Vec::new()
        };

        Ok(RepoSummary {
            repo_name: scope.repo_name().to_string(),
            commit_sha: scope.commit.commit_sha().to_string(),
            total_files: blobs.len() as u64,
            total_symbols: self.structure.count_symbols(commit_id).await?,
            total_usages: self.structure.count_usages(commit_id).await?,
            total_imports: self.structure.count_imports(commit_id).await?,
            languages,
            top_modules,
            entry_points,
            hotspots,
            external_dependencies,
        })
    }
}
