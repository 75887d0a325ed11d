use std::collections::HashMap;

use async_trait::async_trait;

use crate::domain::{
    DomainError, Endpoint, ExtractedEndpoint, ExtractedImport, ExtractedSymbol, ExtractedUsage,
    Import, Symbol, Usage,
};

/// Filters for endpoint lookups. `path_pattern` supports `*` wildcards and is
/// applied by the adapter after the indexed filters.
#[derive(Debug, Clone, Default)]
pub struct EndpointFilter {
    pub method: Option<String>,
    pub path_pattern: Option<String>,
    pub framework: Option<String>,
}

/// Resolved links for one usage row.
#[derive(Debug, Clone, Copy)]
pub struct UsageLink {
    pub usage_id: i64,
    pub enclosing_symbol_id: Option<i64>,
    pub definition_symbol_id: Option<i64>,
}

/// The relational structure index (SQI): symbols, parameters, docstrings,
/// usages, imports, and endpoints, all scoped by (repo_id, commit_id).
#[async_trait]
pub trait StructureIndex: Send + Sync {
    // ── Writes ───────────────────────────────────────────────────────────

    /// Bulk-insert symbols in document order, resolving
    /// `parent_qualified_name` to `parent_symbol_id` within the batch and
    /// the already-stored rows of the same (commit, file). Parameters and
    /// docstrings are inserted alongside. Returns IDs in input order.
    async fn insert_symbols(
        &self,
        repo_id: &str,
        commit_id: i64,
        symbols: &[ExtractedSymbol],
    ) -> Result<Vec<i64>, DomainError>;

    async fn insert_usages(
        &self,
        commit_id: i64,
        usages: &[ExtractedUsage],
    ) -> Result<u64, DomainError>;

    async fn insert_imports(
        &self,
        commit_id: i64,
        imports: &[ExtractedImport],
    ) -> Result<u64, DomainError>;

    /// Insert endpoints, resolving `handler_name` to a symbol in the same
    /// (commit, file) when possible.
    async fn insert_endpoints(
        &self,
        commit_id: i64,
        endpoints: &[ExtractedEndpoint],
    ) -> Result<u64, DomainError>;

    /// Apply linker results. Links are additive: a null in the update never
    /// overwrites an existing non-null link.
    async fn apply_usage_links(&self, links: &[UsageLink]) -> Result<(), DomainError>;

    /// Cascade-delete every SQI row of the given commits.
    async fn delete_commits(&self, commit_ids: &[i64]) -> Result<(), DomainError>;

    // ── Symbol lookups ───────────────────────────────────────────────────

    /// Exact matches on `name` or `qualified_name` across the given commits.
    async fn find_symbols_by_name(
        &self,
        commit_ids: &[i64],
        name: &str,
        kind: Option<&str>,
    ) -> Result<Vec<Symbol>, DomainError>;

    async fn symbol_by_id(&self, id: i64) -> Result<Option<Symbol>, DomainError>;

    async fn symbols_in_file(
        &self,
        commit_id: i64,
        file_path: &str,
    ) -> Result<Vec<Symbol>, DomainError>;

    async fn children_of(&self, symbol_id: i64) -> Result<Vec<Symbol>, DomainError>;

    /// All (name, qualified_name, id) triples of a commit set, for fuzzy
    /// matching.
    async fn symbol_names(&self, commit_ids: &[i64]) -> Result<Vec<(String, String, i64)>, DomainError>;

    async fn symbols_for_commit(&self, commit_id: i64) -> Result<Vec<Symbol>, DomainError>;

    async fn parameters_of(&self, symbol_id: i64)
        -> Result<Vec<crate::domain::SymbolParameter>, DomainError>;

    async fn docstring_of(
        &self,
        symbol_id: i64,
    ) -> Result<Option<crate::domain::SymbolDocstring>, DomainError>;

    // ── Usage lookups ────────────────────────────────────────────────────

    async fn usages_by_name(
        &self,
        commit_ids: &[i64],
        symbol_name: &str,
        file_path: Option<&str>,
    ) -> Result<Vec<Usage>, DomainError>;

    async fn usages_by_definition(
        &self,
        definition_symbol_ids: &[i64],
    ) -> Result<Vec<Usage>, DomainError>;

    async fn usages_for_commit(&self, commit_id: i64) -> Result<Vec<Usage>, DomainError>;

    /// Call-type usages inside a line range of one file (the callee
    /// approximation for the call graph).
    async fn calls_in_range(
        &self,
        commit_id: i64,
        file_path: &str,
        start_line: u32,
        end_line: u32,
    ) -> Result<Vec<Usage>, DomainError>;

    // ── Import lookups ───────────────────────────────────────────────────

    async fn imports_for_file(
        &self,
        commit_id: i64,
        file_path: &str,
    ) -> Result<Vec<Import>, DomainError>;

    async fn importers_of(
        &self,
        commit_ids: &[i64],
        module_specifier: &str,
    ) -> Result<Vec<Import>, DomainError>;

    async fn imports_for_commit(&self, commit_id: i64) -> Result<Vec<Import>, DomainError>;

    // ── Endpoint lookups ─────────────────────────────────────────────────

    async fn find_endpoints(
        &self,
        commit_ids: &[i64],
        filter: &EndpointFilter,
    ) -> Result<Vec<Endpoint>, DomainError>;

    // ── Aggregates ───────────────────────────────────────────────────────

    async fn count_symbols(&self, commit_id: i64) -> Result<u64, DomainError>;

    async fn count_usages(&self, commit_id: i64) -> Result<u64, DomainError>;

    async fn count_imports(&self, commit_id: i64) -> Result<u64, DomainError>;

    /// Symbol counts grouped by file path, descending.
    async fn symbol_counts_by_file(
        &self,
        commit_id: i64,
    ) -> Result<Vec<(String, u64)>, DomainError>;

    /// (symbol_id, incoming usage count) pairs, highest first.
    async fn usage_counts_by_definition(
        &self,
        commit_id: i64,
        limit: usize,
    ) -> Result<Vec<(i64, u64)>, DomainError>;

    /// Symbols no usage row in the commit resolves to. Unlinked usages do
    /// not keep a symbol alive: a bare-name match may belong to an
    /// unrelated symbol or be ambiguous.
    async fn symbols_without_usages(
        &self,
        commit_id: i64,
        exported_only: bool,
        limit: usize,
    ) -> Result<Vec<Symbol>, DomainError>;

    /// External imports (unresolved specifiers) grouped by specifier with
    /// occurrence counts.
    async fn external_dependencies(
        &self,
        commit_id: i64,
    ) -> Result<HashMap<String, u64>, DomainError>;
}
