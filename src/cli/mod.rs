use clap::{Args, Subcommand};

/// Repository scope flags shared by every query command.
#[derive(Args, Debug, Clone, Default)]
pub struct ScopeArgs {
    /// Repository names or paths to query (default: the current directory)
    #[arg(long, value_delimiter = ',')]
    pub repos: Vec<String>,

    /// Query every indexed repository
    #[arg(long)]
    pub all_repos: bool,

    /// Query the repositories of a configured group
    #[arg(long)]
    pub group: Option<String>,

    /// Commit ref to query (branch, tag, or SHA)
    #[arg(long, default_value = "HEAD")]
    pub commit: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Index a repository at a commit
    Index {
        /// Path to the repository (default: current directory)
        #[arg(default_value = ".")]
        path: String,

        /// Commit ref to index
        #[arg(long, default_value = "HEAD")]
        commit: String,

        /// Optional display name for the repository
        #[arg(short, long)]
        name: Option<String>,

        /// Wipe prior records for this commit and re-index
        #[arg(short, long)]
        force: bool,

        /// Structure-index only: skip embeddings and vector storage
        #[arg(long)]
        skip_embeddings: bool,
    },

    /// Semantic code search
    Search {
        query: String,

        #[arg(short, long, default_value = "10")]
        limit: usize,

        /// Minimum similarity score (0.0 to 1.0)
        #[arg(short, long)]
        min_score: Option<f32>,

        /// Filter by language
        #[arg(short = 'L', long)]
        language: Option<String>,

        /// Filter by file path pattern (`*` wildcards)
        #[arg(long)]
        path: Option<String>,

        /// Filter by content type (code, docs, config)
        #[arg(long)]
        content_type: Option<String>,

        #[command(flatten)]
        scope: ScopeArgs,
    },

    /// Find where a symbol is defined
    Def {
        symbol: String,

        /// Filter by symbol kind (function, class, method, ...)
        #[arg(short, long)]
        kind: Option<String>,

        /// Include near-miss names ranked by similarity
        #[arg(long)]
        fuzzy: bool,

        #[command(flatten)]
        scope: ScopeArgs,
    },

    /// Find every usage of a symbol
    Usages {
        symbol: String,

        /// Restrict to one file
        #[arg(long)]
        file: Option<String>,

        #[command(flatten)]
        scope: ScopeArgs,
    },

    /// Show a symbol's parents and children
    Hierarchy {
        symbol: String,

        /// Direction: children, parents, or both
        #[arg(short, long, default_value = "both")]
        direction: String,

        #[command(flatten)]
        scope: ScopeArgs,
    },

    /// List the imports of a file
    Imports {
        file: String,

        #[command(flatten)]
        scope: ScopeArgs,
    },

    /// List the files importing a module
    Importers {
        module: String,

        #[command(flatten)]
        scope: ScopeArgs,
    },

    /// List discovered API endpoints and MCP tools
    Endpoints {
        /// HTTP method filter
        #[arg(short, long)]
        method: Option<String>,

        /// Path pattern with `*` wildcards (e.g. "/users/*")
        #[arg(short, long)]
        path: Option<String>,

        /// Framework filter (express, fastapi, rails, ...)
        #[arg(short, long)]
        framework: Option<String>,

        #[command(flatten)]
        scope: ScopeArgs,
    },

    /// Show callers and callees of a symbol
    Callgraph {
        symbol: String,

        /// Direction: callers, callees, or both
        #[arg(short, long, default_value = "both")]
        direction: String,

        #[command(flatten)]
        scope: ScopeArgs,
    },

    /// Estimate the blast radius of changing a symbol
    Impact {
        symbol: String,

        /// Maximum BFS depth
        #[arg(long, default_value = "3")]
        max_depth: usize,

        #[command(flatten)]
        scope: ScopeArgs,
    },

    /// Find symbols with no recorded usages
    DeadCode {
        /// Only report exported symbols
        #[arg(long)]
        exported_only: bool,

        /// Skip symbols in conventional test paths
        #[arg(long)]
        exclude_tests: bool,

        #[arg(short, long)]
        limit: Option<usize>,

        #[command(flatten)]
        scope: ScopeArgs,
    },

    /// Assemble a 360° context view of a symbol
    Context {
        symbol: String,

        /// Include the symbol's source text
        #[arg(long)]
        source: bool,

        /// Maximum usages to include
        #[arg(long)]
        max_usages: Option<usize>,

        #[command(flatten)]
        scope: ScopeArgs,
    },

    /// Aggregate statistics for an indexed commit
    Summary {
        /// Include usage hotspots
        #[arg(long)]
        hotspots: bool,

        /// Include external dependencies
        #[arg(long)]
        deps: bool,

        #[arg(long)]
        max_modules: Option<usize>,

        #[command(flatten)]
        scope: ScopeArgs,
    },

    /// Module-level dependency graph derived from imports
    Deps {
        /// Maximum edges to emit
        #[arg(long)]
        max_edges: Option<usize>,

        #[command(flatten)]
        scope: ScopeArgs,
    },

    /// Collect aged-out commits and orphaned chunks
    Gc {
        /// Report what would be deleted without deleting
        #[arg(long)]
        dry_run: bool,
    },

    /// List indexed repositories and their commits
    List,

    /// Delete an indexed repository
    Delete {
        /// Repository ID, name, or path
        id_or_name: String,
    },

    /// Start the MCP (Model Context Protocol) server on stdio
    Mcp,
}

/// Process exit codes for scripted callers.
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL_ERROR: i32 = 1;
    pub const INVALID_ARGS: i32 = 2;
    pub const NOT_INDEXED: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
}

/// Map a domain error onto the exit code contract.
pub fn exit_code_for(error: &crate::domain::DomainError) -> i32 {
    if error.is_invalid_argument() {
        exit_codes::INVALID_ARGS
    } else if error.is_not_indexed() {
        exit_codes::NOT_INDEXED
    } else if error.is_not_found() {
        exit_codes::NOT_FOUND
    } else {
        exit_codes::GENERAL_ERROR
    }
}
