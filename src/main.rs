//! SourceRack CLI - commit-scoped code intelligence over Git repositories.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::Level;
use tracing_subscriber::EnvFilter;

use sourcerack::cli::{exit_code_for, exit_codes, Commands, ScopeArgs};
use sourcerack::{
    AppConfig, CallDirection, CommitScope, Container, DeadCodeOptions, DomainError,
    EndpointFilter, HierarchyDirection, IndexOptions, ProgressEvent, RepoSelection, SearchOptions,
    SourceRackMcpServer, SummaryOptions, SymbolContextOptions,
};

/// SourceRack - semantic search and structural queries over Git commits
#[derive(Parser)]
#[command(name = "sourcerack")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit structured JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    /// Path to the configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Serialize)]
struct ErrorOutput<'a> {
    success: bool,
    error: &'a str,
}

fn print_output<T: Serialize>(json: bool, value: &T, text: String) {
    if json {
        match serde_json::to_string_pretty(value) {
            Ok(rendered) => println!("{}", rendered),
            Err(e) => eprintln!("Failed to serialize output: {}", e),
        }
    } else {
        println!("{}", text);
    }
}

fn report_error(json: bool, error: &DomainError) -> i32 {
    if json {
        let output = ErrorOutput {
            success: false,
            error: &error.to_string(),
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&output).unwrap_or_default()
        );
    } else {
        eprintln!("Error: {}", error);
    }
    exit_code_for(error)
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::WARN };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("sourcerack={}", level)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let code = run(cli).await;
    std::process::exit(code);
}

async fn run(cli: Cli) -> i32 {
    let config = match AppConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => return report_error(cli.json, &e),
    };

    // Query commands open the database read-only so they can run next to an
    // indexer; mutating commands take the write lock.
    let read_only = !matches!(
        cli.command,
        Commands::Index { .. } | Commands::Gc { .. } | Commands::Delete { .. }
    );
    let container = match Container::new(config, read_only).await {
        Ok(container) => Arc::new(container),
        Err(e) => {
            eprintln!("Error: {}", e);
            return exit_codes::GENERAL_ERROR;
        }
    };

    match dispatch(cli.command, cli.json, container).await {
        Ok(code) => code,
        Err(e) => report_error(cli.json, &e),
    }
}

fn selection(scope: &ScopeArgs, config: &AppConfig) -> Result<RepoSelection, DomainError> {
    if scope.all_repos {
        return Ok(RepoSelection::All);
    }
    if let Some(group) = &scope.group {
        let members = config.group(group)?.repos.clone();
        if members.is_empty() {
            return Err(DomainError::invalid_argument(format!(
                "Group '{}' has no repositories",
                group
            )));
        }
        return Ok(RepoSelection::Named(members));
    }
    if !scope.repos.is_empty() {
        return Ok(RepoSelection::Named(scope.repos.clone()));
    }
    match &config.default_group {
        Some(group) => Ok(RepoSelection::Named(config.group(group)?.repos.clone())),
        None => Ok(RepoSelection::Path(".".to_string())),
    }
}

async fn resolve_scopes(
    container: &Container,
    scope: &ScopeArgs,
) -> Result<Vec<CommitScope>, DomainError> {
    let selection = selection(scope, container.config())?;
    container
        .scope_resolver()
        .resolve(&selection, &scope.commit)
        .await
}

fn index_progress_observer() -> (ProgressBar, sourcerack::ProgressObserver) {
    let bar = ProgressBar::hidden();
    bar.set_style(
        ProgressStyle::default_bar()
            .template("  {spinner:.green} {bar:40.green/dim} {pos}/{len} {msg:.dim}")
            .expect("Invalid progress bar template")
            .progress_chars("━━─"),
    );
    let observer_bar = bar.clone();
    let observer: sourcerack::ProgressObserver = Arc::new(move |event| match event {
        ProgressEvent::FilesListed { to_parse, .. } => {
            observer_bar.set_draw_target(indicatif::ProgressDrawTarget::stderr());
            observer_bar.set_length(to_parse as u64);
        }
        ProgressEvent::FileParsed { path, .. } => {
            observer_bar.set_message(path);
            observer_bar.inc(1);
        }
        ProgressEvent::Completed { .. } | ProgressEvent::Failed { .. } => {
            observer_bar.finish_and_clear();
        }
        _ => {}
    });
    (bar, observer)
}

async fn dispatch(
    command: Commands,
    json: bool,
    container: Arc<Container>,
) -> Result<i32, DomainError> {
    match command {
        Commands::Index {
            path,
            commit,
            name,
            force,
            skip_embeddings,
        } => {
            if !skip_embeddings {
                if let Err(e) = container.ensure_embedding_ready().await {
                    return Err(DomainError::embedding(e.to_string()));
                }
            }
            let (_bar, observer) = index_progress_observer();
            let report = container
                .index_use_case()
                .execute(
                    &path,
                    IndexOptions {
                        commit_ref: commit,
                        force,
                        skip_embeddings,
                        name,
                    },
                    observer,
                )
                .await?;
            let text = if report.already_indexed {
                format!(
                    "{} at {} already indexed ({} chunks)",
                    report.repo_name,
                    &report.commit_sha[..12],
                    report.chunks_reused
                )
            } else {
                format!(
                    "Indexed {} at {}: {} files ({} reused), {} new chunks, {} reused, \
                     {} symbols, {} usages, {} imports, {} endpoints in {:.2}s",
                    report.repo_name,
                    &report.commit_sha[..12],
                    report.files_total,
                    report.files_reused,
                    report.chunks_created,
                    report.chunks_reused,
                    report.symbols,
                    report.usages,
                    report.imports,
                    report.endpoints,
                    report.duration_secs
                )
            };
            print_output(json, &report, text);
            Ok(exit_codes::SUCCESS)
        }

        Commands::Search {
            query,
            limit,
            min_score,
            language,
            path,
            content_type,
            scope,
        } => {
            container
                .ensure_embedding_ready()
                .await
                .map_err(|e| DomainError::embedding(e.to_string()))?;
            let scopes = resolve_scopes(&container, &scope).await?;
            let options = SearchOptions {
                limit,
                min_score,
                language,
                path_pattern: path,
                content_type: content_type.as_deref().map(sourcerack::ContentType::parse),
            };
            let hits = container
                .search_use_case()
                .execute(&query, &scopes, &options)
                .await?;
            let mut text = String::new();
            if hits.is_empty() {
                text.push_str("No results found.");
            } else {
                for (i, hit) in hits.iter().enumerate() {
                    text.push_str(&format!(
                        "{}. [{}] {}:{}-{} (score: {:.3})\n",
                        i + 1,
                        hit.repo_name,
                        hit.file_path,
                        hit.start_line,
                        hit.end_line,
                        hit.score
                    ));
                    for line in hit.content.lines().take(3) {
                        text.push_str(&format!("   | {}\n", line));
                    }
                }
            }
            print_output(json, &hits, text);
            Ok(exit_codes::SUCCESS)
        }

        Commands::Def {
            symbol,
            kind,
            fuzzy,
            scope,
        } => {
            let scopes = resolve_scopes(&container, &scope).await?;
            let matches = container
                .find_definition()
                .execute(&scopes, &symbol, kind.as_deref(), fuzzy)
                .await?;
            let text = matches
                .iter()
                .map(|m| {
                    let score = m
                        .score
                        .map(|s| format!(" (similarity {:.2})", s))
                        .unwrap_or_default();
                    format!(
                        "[{}] {} {} at {}{}",
                        m.repo_name,
                        m.symbol.kind,
                        m.symbol.qualified_name,
                        m.symbol.location(),
                        score
                    )
                })
                .collect::<Vec<_>>()
                .join("\n");
            let empty = matches.is_empty();
            print_output(
                json,
                &matches,
                if empty {
                    format!("No definition found for '{}'", symbol)
                } else {
                    text
                },
            );
            Ok(if empty {
                exit_codes::NOT_FOUND
            } else {
                exit_codes::SUCCESS
            })
        }

        Commands::Usages {
            symbol,
            file,
            scope,
        } => {
            let scopes = resolve_scopes(&container, &scope).await?;
            let matches = container
                .find_usages()
                .execute(&scopes, &symbol, file.as_deref())
                .await?;
            let text = matches
                .iter()
                .map(|m| {
                    let context = m
                        .context
                        .as_deref()
                        .map(|c| format!("  {}", c.trim()))
                        .unwrap_or_default();
                    format!(
                        "[{}] {} ({}){}",
                        m.repo_name,
                        m.usage.location(),
                        m.usage.usage_type,
                        context
                    )
                })
                .collect::<Vec<_>>()
                .join("\n");
            let empty = matches.is_empty();
            print_output(
                json,
                &matches,
                if empty {
                    format!("No usages found for '{}'", symbol)
                } else {
                    text
                },
            );
            Ok(if empty {
                exit_codes::NOT_FOUND
            } else {
                exit_codes::SUCCESS
            })
        }

        Commands::Hierarchy {
            symbol,
            direction,
            scope,
        } => {
            let direction = match direction.as_str() {
                "children" => HierarchyDirection::Children,
                "parents" => HierarchyDirection::Parents,
                "both" => HierarchyDirection::Both,
                other => {
                    return Err(DomainError::invalid_argument(format!(
                        "Unknown direction '{}'",
                        other
                    )))
                }
            };
            let scopes = resolve_scopes(&container, &scope).await?;
            let hierarchies = container
                .find_hierarchy()
                .execute(&scopes, &symbol, direction)
                .await?;
            let mut text = String::new();
            for h in &hierarchies {
                text.push_str(&format!(
                    "[{}] {} at {}\n",
                    h.repo_name,
                    h.symbol.qualified_name,
                    h.symbol.location()
                ));
                for parent in &h.parents {
                    text.push_str(&format!("  parent: {}\n", parent.qualified_name));
                }
                for child in &h.children {
                    text.push_str(&format!("  child:  {}\n", child.qualified_name));
                }
            }
            let empty = hierarchies.is_empty();
            print_output(json, &hierarchies, text);
            Ok(if empty {
                exit_codes::NOT_FOUND
            } else {
                exit_codes::SUCCESS
            })
        }

        Commands::Imports { file, scope } => {
            let scopes = resolve_scopes(&container, &scope).await?;
            let matches = container.find_imports().imports_of(&scopes, &file).await?;
            let text = matches
                .iter()
                .map(|m| {
                    format!(
                        "[{}] {}:{} {} -> {}",
                        m.repo_name,
                        m.import.file_path,
                        m.import.line,
                        m.import.module_specifier,
                        m.import.resolved_path.as_deref().unwrap_or("(external)")
                    )
                })
                .collect::<Vec<_>>()
                .join("\n");
            print_output(json, &matches, text);
            Ok(exit_codes::SUCCESS)
        }

        Commands::Importers { module, scope } => {
            let scopes = resolve_scopes(&container, &scope).await?;
            let matches = container
                .find_imports()
                .importers_of(&scopes, &module)
                .await?;
            let text = matches
                .iter()
                .map(|m| {
                    format!(
                        "[{}] {}:{} imports {}",
                        m.repo_name, m.import.file_path, m.import.line, m.import.module_specifier
                    )
                })
                .collect::<Vec<_>>()
                .join("\n");
            print_output(json, &matches, text);
            Ok(exit_codes::SUCCESS)
        }

        Commands::Endpoints {
            method,
            path,
            framework,
            scope,
        } => {
            let scopes = resolve_scopes(&container, &scope).await?;
            let filter = EndpointFilter {
                method,
                path_pattern: path,
                framework,
            };
            let matches = container.find_endpoints().execute(&scopes, &filter).await?;
            let text = matches
                .iter()
                .map(|m| {
                    format!(
                        "[{}] {:6} {} ({}) at {}:{} handler={}",
                        m.repo_name,
                        m.endpoint.http_method,
                        m.endpoint.path,
                        m.endpoint.framework,
                        m.endpoint.file_path,
                        m.endpoint.start_line,
                        m.endpoint.handler_name.as_deref().unwrap_or("(inline)")
                    )
                })
                .collect::<Vec<_>>()
                .join("\n");
            print_output(json, &matches, text);
            Ok(exit_codes::SUCCESS)
        }

        Commands::Callgraph {
            symbol,
            direction,
            scope,
        } => {
            let direction = match direction.as_str() {
                "callers" => CallDirection::Callers,
                "callees" => CallDirection::Callees,
                "both" => CallDirection::Both,
                other => {
                    return Err(DomainError::invalid_argument(format!(
                        "Unknown direction '{}'",
                        other
                    )))
                }
            };
            let scopes = resolve_scopes(&container, &scope).await?;
            let graphs = container
                .call_graph()
                .execute(&scopes, &symbol, direction)
                .await?;
            let mut text = String::new();
            for graph in &graphs {
                text.push_str(&format!(
                    "[{}] {} at {}\n",
                    graph.repo_name,
                    graph.target.qualified_name,
                    graph.target.location()
                ));
                for caller in &graph.callers {
                    text.push_str(&format!(
                        "  <- {} ({}:{})\n",
                        caller.symbol_name, caller.file_path, caller.line
                    ));
                }
                for callee in &graph.callees {
                    text.push_str(&format!(
                        "  -> {} ({}:{})\n",
                        callee.symbol_name, callee.file_path, callee.line
                    ));
                }
            }
            let empty = graphs.is_empty();
            print_output(json, &graphs, text);
            Ok(if empty {
                exit_codes::NOT_FOUND
            } else {
                exit_codes::SUCCESS
            })
        }

        Commands::Impact {
            symbol,
            max_depth,
            scope,
        } => {
            let scopes = resolve_scopes(&container, &scope).await?;
            let report = container
                .impact_analysis()
                .execute(&scopes, &symbol, Some(max_depth))
                .await?;
            let mut text = format!(
                "{}: {} direct usages, {} affected symbols (max depth {})\n",
                report.root_symbol,
                report.direct_usages.len(),
                report.total_affected,
                report.max_depth_reached
            );
            for usage in &report.direct_usages {
                text.push_str(&format!(
                    "  use [{}] {}:{}\n",
                    usage.repo_name, usage.file_path, usage.line
                ));
            }
            for impacted in &report.transitive_impact {
                text.push_str(&format!(
                    "  d{} [{}] {} ({})\n",
                    impacted.depth, impacted.repo_name, impacted.qualified_name, impacted.file_path
                ));
            }
            print_output(json, &report, text);
            Ok(exit_codes::SUCCESS)
        }

        Commands::DeadCode {
            exported_only,
            exclude_tests,
            limit,
            scope,
        } => {
            let scopes = resolve_scopes(&container, &scope).await?;
            let dead = container
                .dead_code()
                .execute(
                    &scopes,
                    &DeadCodeOptions {
                        exported_only,
                        exclude_tests,
                        limit,
                    },
                )
                .await?;
            let text = dead
                .iter()
                .map(|d| {
                    format!(
                        "[{}] {} {} at {}",
                        d.repo_name,
                        d.symbol.kind,
                        d.symbol.qualified_name,
                        d.symbol.location()
                    )
                })
                .collect::<Vec<_>>()
                .join("\n");
            print_output(
                json,
                &dead,
                if dead.is_empty() {
                    "No dead code found.".to_string()
                } else {
                    text
                },
            );
            Ok(exit_codes::SUCCESS)
        }

        Commands::Context {
            symbol,
            source,
            max_usages,
            scope,
        } => {
            let scopes = resolve_scopes(&container, &scope).await?;
            let context = container
                .symbol_context()
                .execute(
                    &scopes,
                    &symbol,
                    &SymbolContextOptions {
                        include_source: source,
                        include_usages: true,
                        max_usages,
                    },
                )
                .await?;
            let mut text = format!(
                "[{}] {} {} at {}\n",
                context.repo_name,
                context.symbol.kind,
                context.symbol.qualified_name,
                context.symbol.location()
            );
            if let Some(doc) = &context.docstring {
                if let Some(description) = &doc.description {
                    text.push_str(&format!("  doc: {}\n", description));
                }
            }
            text.push_str(&format!(
                "  {} usages, {} file imports, {} importers, {} siblings\n",
                context.usages.len(),
                context.file_imports.len(),
                context.importers.len(),
                context.siblings.len()
            ));
            if let Some(source_text) = &context.source {
                for line in source_text.lines() {
                    text.push_str(&format!("  | {}\n", line));
                }
            }
            print_output(json, &context, text);
            Ok(exit_codes::SUCCESS)
        }

        Commands::Summary {
            hotspots,
            deps,
            max_modules,
            scope,
        } => {
            let scopes = resolve_scopes(&container, &scope).await?;
            let summaries = container
                .codebase_summary()
                .execute(
                    &scopes,
                    &SummaryOptions {
                        include_hotspots: hotspots,
                        include_dependencies: deps,
                        max_modules,
                        max_hotspots: None,
                    },
                )
                .await?;
            let mut text = String::new();
            for summary in &summaries {
                text.push_str(&format!(
                    "{} @ {}: {} files, {} symbols, {} usages, {} imports\n",
                    summary.repo_name,
                    &summary.commit_sha[..12],
                    summary.total_files,
                    summary.total_symbols,
                    summary.total_usages,
                    summary.total_imports
                ));
                for (language, stats) in &summary.languages {
                    text.push_str(&format!(
                        "  {}: {} files, {} symbols\n",
                        language, stats.file_count, stats.symbol_count
                    ));
                }
                if !summary.entry_points.is_empty() {
                    text.push_str(&format!(
                        "  entry points: {}\n",
                        summary.entry_points.join(", ")
                    ));
                }
                for hotspot in &summary.hotspots {
                    text.push_str(&format!(
                        "  hotspot: {} ({} usages)\n",
                        hotspot.qualified_name, hotspot.usage_count
                    ));
                }
                for (dependency, count) in &summary.external_dependencies {
                    text.push_str(&format!("  dep: {} ({})\n", dependency, count));
                }
            }
            print_output(json, &summaries, text);
            Ok(exit_codes::SUCCESS)
        }

        Commands::Deps { max_edges, scope } => {
            let scopes = resolve_scopes(&container, &scope).await?;
            let graphs = container
                .dependency_graph()
                .execute(&scopes, max_edges)
                .await?;
            let mut text = String::new();
            for graph in &graphs {
                text.push_str(&format!(
                    "{}: {} modules, {} edges{}\n",
                    graph.repo_name,
                    graph.nodes.len(),
                    graph.edges.len(),
                    if graph.truncated { " (truncated)" } else { "" }
                ));
                for edge in &graph.edges {
                    text.push_str(&format!(
                        "  {} -> {} ({})\n",
                        edge.from, edge.to, edge.weight
                    ));
                }
            }
            print_output(json, &graphs, text);
            Ok(exit_codes::SUCCESS)
        }

        Commands::Gc { dry_run } => {
            let report = container.gc().execute(dry_run).await?;
            let text = format!(
                "{}{} commits, {} chunks",
                if report.dry_run { "Would delete " } else { "Deleted " },
                report.commits_deleted,
                report.chunks_deleted
            );
            print_output(json, &report, text);
            Ok(exit_codes::SUCCESS)
        }

        Commands::List => {
            let listings = container.list_repositories().execute().await?;
            let mut text = String::new();
            if listings.is_empty() {
                text.push_str("No repositories indexed.");
            }
            for listing in &listings {
                text.push_str(&format!(
                    "{} ({})\n  path: {}\n",
                    listing.repository.name(),
                    listing.repository.id(),
                    listing.repository.path()
                ));
                for commit in &listing.commits {
                    text.push_str(&format!(
                        "  {} {} ({} chunks, embeddings {})\n",
                        commit.short_sha(),
                        commit.status().as_str(),
                        commit.chunk_count(),
                        commit.embedding_status().as_str()
                    ));
                }
            }
            print_output(json, &listings, text);
            Ok(exit_codes::SUCCESS)
        }

        Commands::Delete { id_or_name } => {
            let name = container.delete_repository().execute(&id_or_name).await?;
            print_output(
                json,
                &serde_json::json!({"success": true, "deleted": name}),
                format!("Deleted repository {}", name),
            );
            Ok(exit_codes::SUCCESS)
        }

        Commands::Mcp => {
            use rmcp::ServiceExt;
            let server = SourceRackMcpServer::new(container);
            let service = server
                .serve(rmcp::transport::stdio())
                .await
                .map_err(|e| DomainError::internal(format!("MCP server failed: {}", e)))?;
            service
                .waiting()
                .await
                .map_err(|e| DomainError::internal(format!("MCP server failed: {}", e)))?;
            Ok(exit_codes::SUCCESS)
        }
    }
}
