use std::sync::Arc;

use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{
    CallToolResult, Content, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo,
};
use rmcp::tool;
use rmcp::tool_handler;
use rmcp::tool_router;
use rmcp::ErrorData as McpError;
use rmcp::ServerHandler;
use schemars::JsonSchema;
use serde::Deserialize;

use crate::application::{
    CallDirection, DeadCodeOptions, EndpointFilter, HierarchyDirection, RepoSelection,
    SearchOptions, SummaryOptions, SymbolContextOptions,
};
use crate::connector::container::Container;

/// Server-side cap on result counts.
const MAX_LIMIT: usize = 100;

fn default_limit() -> usize {
    10
}

fn default_commit() -> String {
    "HEAD".to_string()
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ScopeInput {
    /// Repository names to query (all indexed repositories when empty)
    #[serde(default)]
    pub repos: Vec<String>,

    /// Commit ref to query (branch, tag, or SHA; defaults to HEAD)
    #[serde(default = "default_commit")]
    pub commit: String,
}

impl ScopeInput {
    fn selection(&self) -> RepoSelection {
        if self.repos.is_empty() {
            RepoSelection::All
        } else {
            RepoSelection::Named(self.repos.clone())
        }
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SearchToolInput {
    /// Natural language query describing the code you're looking for
    pub query: String,

    /// Maximum number of results (default 10, server cap 100)
    #[serde(default = "default_limit")]
    pub limit: usize,

    /// Filter by language (e.g. "rust", "typescript")
    pub language: Option<String>,

    /// Filter by file path pattern with `*` wildcards
    pub path_pattern: Option<String>,

    #[serde(flatten)]
    pub scope: ScopeInput,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct DefinitionToolInput {
    /// Symbol name or qualified name to locate
    pub symbol: String,

    /// Also return near-miss names ranked by similarity
    #[serde(default)]
    pub fuzzy: bool,

    #[serde(flatten)]
    pub scope: ScopeInput,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct UsagesToolInput {
    /// Symbol name whose usage sites to list
    pub symbol: String,

    /// Restrict to one file path
    pub file: Option<String>,

    #[serde(flatten)]
    pub scope: ScopeInput,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct EndpointsToolInput {
    /// HTTP method filter (GET, POST, ...)
    pub method: Option<String>,

    /// Path pattern with `*` wildcards (e.g. "/users/*")
    pub path: Option<String>,

    /// Framework filter (express, fastapi, rails, ...)
    pub framework: Option<String>,

    #[serde(flatten)]
    pub scope: ScopeInput,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ImpactToolInput {
    /// Symbol whose change impact to analyse
    pub symbol: String,

    /// Maximum BFS depth (default 3)
    pub max_depth: Option<usize>,

    #[serde(flatten)]
    pub scope: ScopeInput,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ContextToolInput {
    /// Symbol to assemble a 360° view for
    pub symbol: String,

    /// Include the symbol's source text
    #[serde(default)]
    pub include_source: bool,

    #[serde(flatten)]
    pub scope: ScopeInput,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct DeadCodeToolInput {
    /// Only report exported symbols
    #[serde(default)]
    pub exported_only: bool,

    /// Skip symbols in conventional test paths
    #[serde(default)]
    pub exclude_tests: bool,

    #[serde(flatten)]
    pub scope: ScopeInput,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct HierarchyToolInput {
    /// Symbol whose parents and children to show
    pub symbol: String,

    /// Direction: "children", "parents", or "both" (default)
    pub direction: Option<String>,

    #[serde(flatten)]
    pub scope: ScopeInput,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ImportsToolInput {
    /// File path whose imports to list
    pub file: String,

    #[serde(flatten)]
    pub scope: ScopeInput,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ImportersToolInput {
    /// Module specifier (or resolved path) to find importers of
    pub module: String,

    #[serde(flatten)]
    pub scope: ScopeInput,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CallGraphToolInput {
    /// Symbol whose callers and callees to show
    pub symbol: String,

    /// Direction: "callers", "callees", or "both" (default)
    pub direction: Option<String>,

    #[serde(flatten)]
    pub scope: ScopeInput,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SummaryToolInput {
    /// Include usage hotspots
    #[serde(default)]
    pub hotspots: bool,

    /// Include external dependencies
    #[serde(default)]
    pub dependencies: bool,

    /// Maximum modules to list by symbol count
    pub max_modules: Option<usize>,

    #[serde(flatten)]
    pub scope: ScopeInput,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct DependencyGraphToolInput {
    /// Maximum edges to emit
    pub max_edges: Option<usize>,

    #[serde(flatten)]
    pub scope: ScopeInput,
}

fn parse_hierarchy_direction(raw: Option<&str>) -> Result<HierarchyDirection, McpError> {
    match raw.unwrap_or("both") {
        "children" => Ok(HierarchyDirection::Children),
        "parents" => Ok(HierarchyDirection::Parents),
        "both" => Ok(HierarchyDirection::Both),
        other => Err(McpError::invalid_params(
            format!("Unknown direction '{}'", other),
            None,
        )),
    }
}

fn parse_call_direction(raw: Option<&str>) -> Result<CallDirection, McpError> {
    match raw.unwrap_or("both") {
        "callers" => Ok(CallDirection::Callers),
        "callees" => Ok(CallDirection::Callees),
        "both" => Ok(CallDirection::Both),
        other => Err(McpError::invalid_params(
            format!("Unknown direction '{}'", other),
            None,
        )),
    }
}

/// MCP server exposing the query engine as tools over stdio.
#[derive(Clone)]
pub struct SourceRackMcpServer {
    container: Arc<Container>,
    tool_router: ToolRouter<Self>,
}

fn to_json_result<T: serde::Serialize>(value: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| McpError::internal_error(format!("Failed to serialize result: {}", e), None))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

fn to_mcp_error(e: crate::domain::DomainError) -> McpError {
    McpError::internal_error(e.to_string(), None)
}

#[tool_router]
impl SourceRackMcpServer {
    pub fn new(container: Arc<Container>) -> Self {
        Self {
            container,
            tool_router: Self::tool_router(),
        }
    }

    async fn resolve_scopes(
        &self,
        scope: &ScopeInput,
    ) -> Result<Vec<crate::application::CommitScope>, McpError> {
        self.container
            .scope_resolver()
            .resolve(&scope.selection(), &scope.commit)
            .await
            .map_err(to_mcp_error)
    }

    /// Search indexed code semantically. Describe what you're looking for in
    /// natural language; returns the most similar code chunks.
    #[tool(name = "search_code")]
    async fn search_code(
        &self,
        params: Parameters<SearchToolInput>,
    ) -> Result<CallToolResult, McpError> {
        let input = params.0;
        let scopes = self.resolve_scopes(&input.scope).await?;
        let options = SearchOptions {
            limit: input.limit.min(MAX_LIMIT),
            language: input.language,
            path_pattern: input.path_pattern,
            ..SearchOptions::default()
        };
        let hits = self
            .container
            .search_use_case()
            .execute(&input.query, &scopes, &options)
            .await
            .map_err(to_mcp_error)?;
        to_json_result(&hits)
    }

    /// Find where a symbol is defined. Exact name or qualified-name match,
    /// optionally with fuzzy fallback.
    #[tool(name = "find_definition")]
    async fn find_definition(
        &self,
        params: Parameters<DefinitionToolInput>,
    ) -> Result<CallToolResult, McpError> {
        let input = params.0;
        let scopes = self.resolve_scopes(&input.scope).await?;
        let matches = self
            .container
            .find_definition()
            .execute(&scopes, &input.symbol, None, input.fuzzy)
            .await
            .map_err(to_mcp_error)?;
        to_json_result(&matches)
    }

    /// List every usage site of a symbol with a one-line source context.
    #[tool(name = "find_usages")]
    async fn find_usages(
        &self,
        params: Parameters<UsagesToolInput>,
    ) -> Result<CallToolResult, McpError> {
        let input = params.0;
        let scopes = self.resolve_scopes(&input.scope).await?;
        let matches = self
            .container
            .find_usages()
            .execute(&scopes, &input.symbol, input.file.as_deref())
            .await
            .map_err(to_mcp_error)?;
        to_json_result(&matches)
    }

    /// List HTTP endpoints and MCP tools discovered in the indexed code.
    #[tool(name = "find_endpoints")]
    async fn find_endpoints(
        &self,
        params: Parameters<EndpointsToolInput>,
    ) -> Result<CallToolResult, McpError> {
        let input = params.0;
        let scopes = self.resolve_scopes(&input.scope).await?;
        let filter = EndpointFilter {
            method: input.method,
            path_pattern: input.path,
            framework: input.framework,
        };
        let matches = self
            .container
            .find_endpoints()
            .execute(&scopes, &filter)
            .await
            .map_err(to_mcp_error)?;
        to_json_result(&matches)
    }

    /// Analyse what would be affected if a symbol changes: direct usages and
    /// the transitive blast radius.
    #[tool(name = "analyze_impact")]
    async fn analyze_impact(
        &self,
        params: Parameters<ImpactToolInput>,
    ) -> Result<CallToolResult, McpError> {
        let input = params.0;
        let scopes = self.resolve_scopes(&input.scope).await?;
        let report = self
            .container
            .impact_analysis()
            .execute(&scopes, &input.symbol, input.max_depth)
            .await
            .map_err(to_mcp_error)?;
        to_json_result(&report)
    }

    /// Assemble a 360° view of a symbol: definition, parameters, docstring,
    /// usages, imports, importers, and siblings.
    #[tool(name = "symbol_context")]
    async fn symbol_context(
        &self,
        params: Parameters<ContextToolInput>,
    ) -> Result<CallToolResult, McpError> {
        let input = params.0;
        let scopes = self.resolve_scopes(&input.scope).await?;
        let context = self
            .container
            .symbol_context()
            .execute(
                &scopes,
                &input.symbol,
                &SymbolContextOptions {
                    include_source: input.include_source,
                    include_usages: true,
                    max_usages: None,
                },
            )
            .await
            .map_err(to_mcp_error)?;
        to_json_result(&context)
    }

    /// Find symbols with no recorded usages.
    #[tool(name = "find_dead_code")]
    async fn find_dead_code(
        &self,
        params: Parameters<DeadCodeToolInput>,
    ) -> Result<CallToolResult, McpError> {
        let input = params.0;
        let scopes = self.resolve_scopes(&input.scope).await?;
        let dead = self
            .container
            .dead_code()
            .execute(
                &scopes,
                &DeadCodeOptions {
                    exported_only: input.exported_only,
                    exclude_tests: input.exclude_tests,
                    limit: None,
                },
            )
            .await
            .map_err(to_mcp_error)?;
        to_json_result(&dead)
    }

    /// Show a symbol's parent chain and children.
    #[tool(name = "find_hierarchy")]
    async fn find_hierarchy(
        &self,
        params: Parameters<HierarchyToolInput>,
    ) -> Result<CallToolResult, McpError> {
        let input = params.0;
        let direction = parse_hierarchy_direction(input.direction.as_deref())?;
        let scopes = self.resolve_scopes(&input.scope).await?;
        let hierarchies = self
            .container
            .find_hierarchy()
            .execute(&scopes, &input.symbol, direction)
            .await
            .map_err(to_mcp_error)?;
        to_json_result(&hierarchies)
    }

    /// List the imports declared by a file.
    #[tool(name = "find_imports")]
    async fn find_imports(
        &self,
        params: Parameters<ImportsToolInput>,
    ) -> Result<CallToolResult, McpError> {
        let input = params.0;
        let scopes = self.resolve_scopes(&input.scope).await?;
        let matches = self
            .container
            .find_imports()
            .imports_of(&scopes, &input.file)
            .await
            .map_err(to_mcp_error)?;
        to_json_result(&matches)
    }

    /// List the files importing a module.
    #[tool(name = "find_importers")]
    async fn find_importers(
        &self,
        params: Parameters<ImportersToolInput>,
    ) -> Result<CallToolResult, McpError> {
        let input = params.0;
        let scopes = self.resolve_scopes(&input.scope).await?;
        let matches = self
            .container
            .find_imports()
            .importers_of(&scopes, &input.module)
            .await
            .map_err(to_mcp_error)?;
        to_json_result(&matches)
    }

    /// Show who calls a symbol and what it calls.
    #[tool(name = "call_graph")]
    async fn call_graph(
        &self,
        params: Parameters<CallGraphToolInput>,
    ) -> Result<CallToolResult, McpError> {
        let input = params.0;
        let direction = parse_call_direction(input.direction.as_deref())?;
        let scopes = self.resolve_scopes(&input.scope).await?;
        let graphs = self
            .container
            .call_graph()
            .execute(&scopes, &input.symbol, direction)
            .await
            .map_err(to_mcp_error)?;
        to_json_result(&graphs)
    }

    /// Aggregate statistics for an indexed commit: totals, per-language
    /// stats, top modules, entry points, hotspots, external dependencies.
    #[tool(name = "codebase_summary")]
    async fn codebase_summary(
        &self,
        params: Parameters<SummaryToolInput>,
    ) -> Result<CallToolResult, McpError> {
        let input = params.0;
        let scopes = self.resolve_scopes(&input.scope).await?;
        let summaries = self
            .container
            .codebase_summary()
            .execute(
                &scopes,
                &SummaryOptions {
                    include_hotspots: input.hotspots,
                    include_dependencies: input.dependencies,
                    max_modules: input.max_modules,
                    max_hotspots: None,
                },
            )
            .await
            .map_err(to_mcp_error)?;
        to_json_result(&summaries)
    }

    /// Module-level dependency graph derived from imports.
    #[tool(name = "dependency_graph")]
    async fn dependency_graph(
        &self,
        params: Parameters<DependencyGraphToolInput>,
    ) -> Result<CallToolResult, McpError> {
        let input = params.0;
        let scopes = self.resolve_scopes(&input.scope).await?;
        let graphs = self
            .container
            .dependency_graph()
            .execute(&scopes, input.max_edges)
            .await
            .map_err(to_mcp_error)?;
        to_json_result(&graphs)
    }
}

#[tool_handler]
impl ServerHandler for SourceRackMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "Code intelligence over indexed Git repositories. Use search_code for \
                 semantic search, find_definition/find_usages for structural lookups, \
                 find_endpoints for routed APIs, and analyze_impact to estimate the blast \
                 radius of a change. All tools accept a commit ref (default HEAD) and an \
                 optional repository list."
                    .into(),
            ),
        }
    }
}
