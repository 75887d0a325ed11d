use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use duckdb::{params, Connection};
use tokio::sync::Mutex;
use tracing::debug;

use crate::application::{EndpointFilter, StructureIndex, UsageLink};
use crate::domain::{
    wildcard_match, DocType, DomainError, Endpoint, EndpointParam, ExtractedEndpoint,
    ExtractedImport, ExtractedSymbol, ExtractedUsage, Framework, HandlerType, Import,
    ImportBinding, ParamLocation, Symbol, SymbolDocstring, SymbolKind, SymbolParameter, Usage,
    UsageType,
};

fn id_list(ids: &[i64]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// DuckDB-backed structure index (SQI): symbols, parameters, docstrings,
/// usages, imports, and endpoints, scoped by (repo_id, commit_id). Shares the
/// metadata store's connection — DuckDB allows one writer per file.
pub struct DuckdbStructureIndex {
    conn: Arc<Mutex<Connection>>,
    next_symbol_id: AtomicI64,
    next_usage_id: AtomicI64,
    next_import_id: AtomicI64,
    next_endpoint_id: AtomicI64,
}

impl DuckdbStructureIndex {
    pub async fn with_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, DomainError> {
        {
            let guard = conn.lock().await;
            Self::initialize_schema(&guard)?;
        }
        Self::seed_ids(conn).await
    }

    /// For read-only connections: skip DDL.
    pub async fn with_connection_no_init(
        conn: Arc<Mutex<Connection>>,
    ) -> Result<Self, DomainError> {
        Self::seed_ids(conn).await
    }

    /// Open a standalone store on its own connection (tests, tooling).
    pub async fn open(db_path: &Path) -> Result<Self, DomainError> {
        let conn = Connection::open(db_path)
            .map_err(|e| DomainError::storage(format!("Failed to open DuckDB database: {}", e)))?;
        let conn = Arc::new(Mutex::new(conn));
        Self::with_connection(conn).await
    }

    async fn seed_ids(conn: Arc<Mutex<Connection>>) -> Result<Self, DomainError> {
        let (symbol_max, usage_max, import_max, endpoint_max) = {
            let guard = conn.lock().await;
            let read_max = |table: &str| -> i64 {
                guard
                    .query_row(
                        &format!("SELECT COALESCE(MAX(id), 0) FROM {}", table),
                        [],
                        |row| row.get(0),
                    )
                    .unwrap_or(0)
            };
            (
                read_max("symbols"),
                read_max("usages"),
                read_max("imports"),
                read_max("endpoints"),
            )
        };
        Ok(Self {
            conn,
            next_symbol_id: AtomicI64::new(symbol_max + 1),
            next_usage_id: AtomicI64::new(usage_max + 1),
            next_import_id: AtomicI64::new(import_max + 1),
            next_endpoint_id: AtomicI64::new(endpoint_max + 1),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), DomainError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS symbols (
                id BIGINT PRIMARY KEY,
                repo_id TEXT NOT NULL,
                commit_id BIGINT NOT NULL,
                name TEXT NOT NULL,
                qualified_name TEXT NOT NULL,
                kind TEXT NOT NULL,
                file_path TEXT NOT NULL,
                start_line INTEGER NOT NULL,
                end_line INTEGER NOT NULL,
                visibility TEXT,
                is_async BOOLEAN DEFAULT FALSE,
                is_static BOOLEAN DEFAULT FALSE,
                is_exported BOOLEAN DEFAULT FALSE,
                return_type TEXT,
                parent_symbol_id BIGINT,
                content_hash TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS symbols_name_idx ON symbols (name);
            CREATE INDEX IF NOT EXISTS symbols_qualified_idx ON symbols (qualified_name);
            CREATE INDEX IF NOT EXISTS symbols_file_idx ON symbols (file_path);
            CREATE INDEX IF NOT EXISTS symbols_commit_name_idx ON symbols (commit_id, name);

            CREATE TABLE IF NOT EXISTS symbol_parameters (
                symbol_id BIGINT NOT NULL,
                position INTEGER NOT NULL,
                name TEXT NOT NULL,
                type_annotation TEXT,
                is_optional BOOLEAN DEFAULT FALSE
            );
            CREATE INDEX IF NOT EXISTS symbol_parameters_idx ON symbol_parameters (symbol_id);

            CREATE TABLE IF NOT EXISTS symbol_docstrings (
                symbol_id BIGINT NOT NULL,
                doc_type TEXT NOT NULL,
                raw_text TEXT NOT NULL,
                description TEXT
            );
            CREATE INDEX IF NOT EXISTS symbol_docstrings_idx ON symbol_docstrings (symbol_id);

            CREATE TABLE IF NOT EXISTS usages (
                id BIGINT PRIMARY KEY,
                commit_id BIGINT NOT NULL,
                symbol_name TEXT NOT NULL,
                file_path TEXT NOT NULL,
                line INTEGER NOT NULL,
                col INTEGER NOT NULL,
                usage_type TEXT NOT NULL,
                enclosing_hint TEXT,
                enclosing_symbol_id BIGINT,
                definition_symbol_id BIGINT
            );
            CREATE INDEX IF NOT EXISTS usages_commit_name_idx ON usages (commit_id, symbol_name);
            CREATE INDEX IF NOT EXISTS usages_definition_idx ON usages (definition_symbol_id);

            CREATE TABLE IF NOT EXISTS imports (
                id BIGINT PRIMARY KEY,
                commit_id BIGINT NOT NULL,
                file_path TEXT NOT NULL,
                line INTEGER NOT NULL,
                import_type TEXT NOT NULL,
                module_specifier TEXT NOT NULL,
                resolved_path TEXT
            );
            CREATE INDEX IF NOT EXISTS imports_commit_idx ON imports (commit_id, file_path);
            CREATE INDEX IF NOT EXISTS imports_specifier_idx ON imports (module_specifier);

            CREATE TABLE IF NOT EXISTS import_bindings (
                import_id BIGINT NOT NULL,
                imported_name TEXT NOT NULL,
                local_name TEXT NOT NULL,
                is_type_only BOOLEAN DEFAULT FALSE
            );
            CREATE INDEX IF NOT EXISTS import_bindings_idx ON import_bindings (import_id);

            CREATE TABLE IF NOT EXISTS endpoints (
                id BIGINT PRIMARY KEY,
                commit_id BIGINT NOT NULL,
                http_method TEXT NOT NULL,
                path TEXT NOT NULL,
                file_path TEXT NOT NULL,
                start_line INTEGER NOT NULL,
                end_line INTEGER NOT NULL,
                framework TEXT NOT NULL,
                handler_name TEXT,
                handler_symbol_id BIGINT,
                handler_type TEXT NOT NULL,
                middleware TEXT,
                dependencies TEXT,
                summary TEXT,
                tags TEXT,
                response_model TEXT,
                body_schema TEXT,
                mcp_tool_name TEXT,
                mcp_input_schema TEXT
            );
            CREATE INDEX IF NOT EXISTS endpoints_commit_idx ON endpoints (commit_id);

            CREATE TABLE IF NOT EXISTS endpoint_params (
                endpoint_id BIGINT NOT NULL,
                name TEXT NOT NULL,
                location TEXT NOT NULL,
                type_annotation TEXT,
                required BOOLEAN DEFAULT TRUE,
                default_value TEXT
            );
            CREATE INDEX IF NOT EXISTS endpoint_params_idx ON endpoint_params (endpoint_id);
            "#,
        )
        .map_err(|e| {
            DomainError::storage(format!("Failed to initialize structure schema: {}", e))
        })?;
        debug!("DuckDB structure schema initialized");
        Ok(())
    }

    const SYMBOL_COLUMNS: &'static str = "id, repo_id, commit_id, name, qualified_name, kind, \
         file_path, start_line, end_line, visibility, is_async, is_static, is_exported, \
         return_type, parent_symbol_id, content_hash";

    fn row_to_symbol(row: &duckdb::Row) -> Result<Symbol, duckdb::Error> {
        Ok(Symbol {
            id: row.get(0)?,
            repo_id: row.get(1)?,
            commit_id: row.get(2)?,
            name: row.get(3)?,
            qualified_name: row.get(4)?,
            kind: SymbolKind::parse(&row.get::<_, String>(5)?).unwrap_or(SymbolKind::Function),
            file_path: row.get(6)?,
            start_line: row.get::<_, i32>(7)? as u32,
            end_line: row.get::<_, i32>(8)? as u32,
            visibility: row.get(9)?,
            is_async: row.get(10)?,
            is_static: row.get(11)?,
            is_exported: row.get(12)?,
            return_type: row.get(13)?,
            parent_symbol_id: row.get(14)?,
            content_hash: row.get(15)?,
        })
    }

    const USAGE_COLUMNS: &'static str = "id, commit_id, symbol_name, file_path, line, col, \
         usage_type, enclosing_hint, enclosing_symbol_id, definition_symbol_id";

    fn row_to_usage(row: &duckdb::Row) -> Result<Usage, duckdb::Error> {
        Ok(Usage {
            id: row.get(0)?,
            commit_id: row.get(1)?,
            symbol_name: row.get(2)?,
            file_path: row.get(3)?,
            line: row.get::<_, i32>(4)? as u32,
            column: row.get::<_, i32>(5)? as u32,
            usage_type: UsageType::parse(&row.get::<_, String>(6)?),
            enclosing_hint: row.get(7)?,
            enclosing_symbol_id: row.get(8)?,
            definition_symbol_id: row.get(9)?,
        })
    }

    fn row_to_import(row: &duckdb::Row) -> Result<Import, duckdb::Error> {
        Ok(Import {
            id: row.get(0)?,
            commit_id: row.get(1)?,
            file_path: row.get(2)?,
            line: row.get::<_, i32>(3)? as u32,
            import_type: ImportBindingHelper::parse_type(&row.get::<_, String>(4)?),
            module_specifier: row.get(5)?,
            resolved_path: row.get(6)?,
            bindings: Vec::new(),
        })
    }

    async fn attach_bindings(&self, imports: &mut [Import]) -> Result<(), DomainError> {
        if imports.is_empty() {
            return Ok(());
        }
        let ids: Vec<i64> = imports.iter().map(|i| i.id).collect();
        let sql = format!(
            "SELECT import_id, imported_name, local_name, is_type_only \
             FROM import_bindings WHERE import_id IN ({})",
            id_list(&ids)
        );
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| DomainError::storage(format!("Failed to prepare statement: {}", e)))?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    ImportBinding {
                        imported_name: row.get(1)?,
                        local_name: row.get(2)?,
                        is_type_only: row.get(3)?,
                    },
                ))
            })
            .map_err(|e| DomainError::storage(format!("Failed to query bindings: {}", e)))?;
        let mut by_import: HashMap<i64, Vec<ImportBinding>> = HashMap::new();
        for row in rows {
            let (import_id, binding) =
                row.map_err(|e| DomainError::storage(format!("Failed to read row: {}", e)))?;
            by_import.entry(import_id).or_default().push(binding);
        }
        for import in imports.iter_mut() {
            if let Some(bindings) = by_import.remove(&import.id) {
                import.bindings = bindings;
            }
        }
        Ok(())
    }

    const ENDPOINT_COLUMNS: &'static str = "id, commit_id, http_method, path, file_path, \
         start_line, end_line, framework, handler_name, handler_symbol_id, handler_type, \
         middleware, dependencies, summary, tags, response_model, body_schema, mcp_tool_name, \
         mcp_input_schema";

    fn row_to_endpoint(row: &duckdb::Row) -> Result<Endpoint, duckdb::Error> {
        let list = |value: Option<String>| -> Vec<String> {
            value
                .and_then(|v| serde_json::from_str(&v).ok())
                .unwrap_or_default()
        };
        Ok(Endpoint {
            id: row.get(0)?,
            commit_id: row.get(1)?,
            http_method: row.get(2)?,
            path: row.get(3)?,
            file_path: row.get(4)?,
            start_line: row.get::<_, i32>(5)? as u32,
            end_line: row.get::<_, i32>(6)? as u32,
            framework: Framework::parse(&row.get::<_, String>(7)?),
            handler_name: row.get(8)?,
            handler_symbol_id: row.get(9)?,
            handler_type: HandlerType::parse(&row.get::<_, String>(10)?),
            middleware: list(row.get(11)?),
            dependencies: list(row.get(12)?),
            summary: row.get(13)?,
            tags: list(row.get(14)?),
            response_model: row.get(15)?,
            body_schema: row.get(16)?,
            mcp_tool_name: row.get(17)?,
            mcp_input_schema: row.get(18)?,
            params: Vec::new(),
        })
    }

    async fn attach_endpoint_params(&self, endpoints: &mut [Endpoint]) -> Result<(), DomainError> {
        if endpoints.is_empty() {
            return Ok(());
        }
        let ids: Vec<i64> = endpoints.iter().map(|e| e.id).collect();
        let sql = format!(
            "SELECT endpoint_id, name, location, type_annotation, required, default_value \
             FROM endpoint_params WHERE endpoint_id IN ({})",
            id_list(&ids)
        );
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| DomainError::storage(format!("Failed to prepare statement: {}", e)))?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    EndpointParam {
                        name: row.get(1)?,
                        location: ParamLocation::parse(&row.get::<_, String>(2)?),
                        type_annotation: row.get(3)?,
                        required: row.get(4)?,
                        default_value: row.get(5)?,
                    },
                ))
            })
            .map_err(|e| DomainError::storage(format!("Failed to query params: {}", e)))?;
        let mut by_endpoint: HashMap<i64, Vec<EndpointParam>> = HashMap::new();
        for row in rows {
            let (endpoint_id, param) =
                row.map_err(|e| DomainError::storage(format!("Failed to read row: {}", e)))?;
            by_endpoint.entry(endpoint_id).or_default().push(param);
        }
        for endpoint in endpoints.iter_mut() {
            if let Some(params) = by_endpoint.remove(&endpoint.id) {
                endpoint.params = params;
            }
        }
        Ok(())
    }

    async fn query_symbols(&self, sql: &str) -> Result<Vec<Symbol>, DomainError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| DomainError::storage(format!("Failed to prepare statement: {}", e)))?;
        let rows = stmt
            .query_map([], Self::row_to_symbol)
            .map_err(|e| DomainError::storage(format!("Failed to query symbols: {}", e)))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| DomainError::storage(format!("Failed to read row: {}", e)))
    }

    async fn query_usages(&self, sql: &str) -> Result<Vec<Usage>, DomainError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| DomainError::storage(format!("Failed to prepare statement: {}", e)))?;
        let rows = stmt
            .query_map([], Self::row_to_usage)
            .map_err(|e| DomainError::storage(format!("Failed to query usages: {}", e)))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| DomainError::storage(format!("Failed to read row: {}", e)))
    }

    fn quote(value: &str) -> String {
        format!("'{}'", value.replace('\'', "''"))
    }
}

/// Import type parsing kept beside the row mapper.
struct ImportBindingHelper;

impl ImportBindingHelper {
    fn parse_type(s: &str) -> crate::domain::ImportType {
        crate::domain::ImportType::parse(s).unwrap_or(crate::domain::ImportType::EsImport)
    }
}

#[async_trait]
impl StructureIndex for DuckdbStructureIndex {
    async fn insert_symbols(
        &self,
        repo_id: &str,
        commit_id: i64,
        symbols: &[ExtractedSymbol],
    ) -> Result<Vec<i64>, DomainError> {
        if symbols.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.conn.lock().await;
        let mut insert = conn
            .prepare(
                "INSERT INTO symbols (id, repo_id, commit_id, name, qualified_name, kind, \
                 file_path, start_line, end_line, visibility, is_async, is_static, is_exported, \
                 return_type, parent_symbol_id, content_hash) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
            )
            .map_err(|e| DomainError::storage(format!("Failed to prepare insert: {}", e)))?;
        let mut insert_param = conn
            .prepare(
                "INSERT INTO symbol_parameters (symbol_id, position, name, type_annotation, is_optional) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )
            .map_err(|e| DomainError::storage(format!("Failed to prepare insert: {}", e)))?;
        let mut insert_doc = conn
            .prepare(
                "INSERT INTO symbol_docstrings (symbol_id, doc_type, raw_text, description) \
                 VALUES (?1, ?2, ?3, ?4)",
            )
            .map_err(|e| DomainError::storage(format!("Failed to prepare insert: {}", e)))?;

        // Document order guarantees parents precede children within a file.
        let mut ids = Vec::with_capacity(symbols.len());
        let mut by_qualified: HashMap<(String, String), i64> = HashMap::new();
        for symbol in symbols {
            let id = self.next_symbol_id.fetch_add(1, Ordering::SeqCst);
            let parent_symbol_id = symbol.parent_qualified_name.as_ref().and_then(|parent| {
                by_qualified
                    .get(&(symbol.file_path.clone(), parent.clone()))
                    .copied()
            });
            insert
                .execute(params![
                    id,
                    repo_id,
                    commit_id,
                    symbol.name,
                    symbol.qualified_name,
                    symbol.kind.as_str(),
                    symbol.file_path,
                    symbol.start_line as i32,
                    symbol.end_line as i32,
                    symbol.visibility,
                    symbol.is_async,
                    symbol.is_static,
                    symbol.is_exported,
                    symbol.return_type,
                    parent_symbol_id,
                    symbol.content_hash,
                ])
                .map_err(|e| DomainError::storage(format!("Failed to insert symbol: {}", e)))?;

            for param in &symbol.parameters {
                insert_param
                    .execute(params![
                        id,
                        param.position as i32,
                        param.name,
                        param.type_annotation,
                        param.is_optional,
                    ])
                    .map_err(|e| {
                        DomainError::storage(format!("Failed to insert parameter: {}", e))
                    })?;
            }
            if let Some(doc) = &symbol.docstring {
                insert_doc
                    .execute(params![
                        id,
                        doc.doc_type.as_str(),
                        doc.raw_text,
                        doc.description,
                    ])
                    .map_err(|e| {
                        DomainError::storage(format!("Failed to insert docstring: {}", e))
                    })?;
            }

            by_qualified.insert(
                (symbol.file_path.clone(), symbol.qualified_name.clone()),
                id,
            );
            ids.push(id);
        }
        Ok(ids)
    }

    async fn insert_usages(
        &self,
        commit_id: i64,
        usages: &[ExtractedUsage],
    ) -> Result<u64, DomainError> {
        if usages.is_empty() {
            return Ok(0);
        }
        let conn = self.conn.lock().await;
        let mut insert = conn
            .prepare(
                "INSERT INTO usages (id, commit_id, symbol_name, file_path, line, col, usage_type, enclosing_hint) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )
            .map_err(|e| DomainError::storage(format!("Failed to prepare insert: {}", e)))?;
        for usage in usages {
            let id = self.next_usage_id.fetch_add(1, Ordering::SeqCst);
            insert
                .execute(params![
                    id,
                    commit_id,
                    usage.symbol_name,
                    usage.file_path,
                    usage.line as i32,
                    usage.column as i32,
                    usage.usage_type.as_str(),
                    usage.enclosing_hint,
                ])
                .map_err(|e| DomainError::storage(format!("Failed to insert usage: {}", e)))?;
        }
        Ok(usages.len() as u64)
    }

    async fn insert_imports(
        &self,
        commit_id: i64,
        imports: &[ExtractedImport],
    ) -> Result<u64, DomainError> {
        if imports.is_empty() {
            return Ok(0);
        }
        let conn = self.conn.lock().await;
        let mut insert = conn
            .prepare(
                "INSERT INTO imports (id, commit_id, file_path, line, import_type, \
                 module_specifier, resolved_path) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )
            .map_err(|e| DomainError::storage(format!("Failed to prepare insert: {}", e)))?;
        let mut insert_binding = conn
            .prepare(
                "INSERT INTO import_bindings (import_id, imported_name, local_name, is_type_only) \
                 VALUES (?1, ?2, ?3, ?4)",
            )
            .map_err(|e| DomainError::storage(format!("Failed to prepare insert: {}", e)))?;
        for import in imports {
            let id = self.next_import_id.fetch_add(1, Ordering::SeqCst);
            insert
                .execute(params![
                    id,
                    commit_id,
                    import.file_path,
                    import.line as i32,
                    import.import_type.as_str(),
                    import.module_specifier,
                    import.resolved_path,
                ])
                .map_err(|e| DomainError::storage(format!("Failed to insert import: {}", e)))?;
            for binding in &import.bindings {
                insert_binding
                    .execute(params![
                        id,
                        binding.imported_name,
                        binding.local_name,
                        binding.is_type_only,
                    ])
                    .map_err(|e| {
                        DomainError::storage(format!("Failed to insert binding: {}", e))
                    })?;
            }
        }
        Ok(imports.len() as u64)
    }

    async fn insert_endpoints(
        &self,
        commit_id: i64,
        endpoints: &[ExtractedEndpoint],
    ) -> Result<u64, DomainError> {
        if endpoints.is_empty() {
            return Ok(0);
        }
        let conn = self.conn.lock().await;
        let mut insert = conn
            .prepare(
                "INSERT INTO endpoints (id, commit_id, http_method, path, file_path, start_line, \
                 end_line, framework, handler_name, handler_symbol_id, handler_type, middleware, \
                 dependencies, summary, tags, response_model, body_schema, mcp_tool_name, \
                 mcp_input_schema) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)",
            )
            .map_err(|e| DomainError::storage(format!("Failed to prepare insert: {}", e)))?;
        let mut insert_param = conn
            .prepare(
                "INSERT INTO endpoint_params (endpoint_id, name, location, type_annotation, \
                 required, default_value) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )
            .map_err(|e| DomainError::storage(format!("Failed to prepare insert: {}", e)))?;
        let mut find_handler = conn
            .prepare(
                "SELECT id FROM symbols WHERE commit_id = ?1 AND name = ?2 AND file_path = ?3 LIMIT 1",
            )
            .map_err(|e| DomainError::storage(format!("Failed to prepare lookup: {}", e)))?;
        let mut find_handler_any = conn
            .prepare("SELECT id FROM symbols WHERE commit_id = ?1 AND name = ?2 LIMIT 2")
            .map_err(|e| DomainError::storage(format!("Failed to prepare lookup: {}", e)))?;

        for endpoint in endpoints {
            let id = self.next_endpoint_id.fetch_add(1, Ordering::SeqCst);

            // Resolve the handler to a symbol: same file first, then a
            // unique match anywhere in the commit.
            let handler_symbol_id: Option<i64> = match &endpoint.handler_name {
                Some(name) => {
                    let bare = name.rsplit('.').next().unwrap_or(name);
                    let same_file: Option<i64> = find_handler
                        .query_row(params![commit_id, bare, endpoint.file_path], |row| {
                            row.get(0)
                        })
                        .ok();
                    match same_file {
                        Some(found) => Some(found),
                        None => {
                            let candidates: Vec<i64> = find_handler_any
                                .query_map(params![commit_id, bare], |row| row.get(0))
                                .map_err(|e| {
                                    DomainError::storage(format!("Handler lookup failed: {}", e))
                                })?
                                .filter_map(|r| r.ok())
                                .collect();
                            if candidates.len() == 1 {
                                Some(candidates[0])
                            } else {
                                None
                            }
                        }
                    }
                }
                None => None,
            };

            let to_json = |values: &[String]| -> Option<String> {
                if values.is_empty() {
                    None
                } else {
                    serde_json::to_string(values).ok()
                }
            };

            insert
                .execute(params![
                    id,
                    commit_id,
                    endpoint.http_method,
                    endpoint.path,
                    endpoint.file_path,
                    endpoint.start_line as i32,
                    endpoint.end_line as i32,
                    endpoint.framework.as_str(),
                    endpoint.handler_name,
                    handler_symbol_id,
                    endpoint.handler_type.as_str(),
                    to_json(&endpoint.middleware),
                    to_json(&endpoint.dependencies),
                    endpoint.summary,
                    to_json(&endpoint.tags),
                    endpoint.response_model,
                    endpoint.body_schema,
                    endpoint.mcp_tool_name,
                    endpoint.mcp_input_schema,
                ])
                .map_err(|e| DomainError::storage(format!("Failed to insert endpoint: {}", e)))?;

            for param in &endpoint.params {
                insert_param
                    .execute(params![
                        id,
                        param.name,
                        param.location.as_str(),
                        param.type_annotation,
                        param.required,
                        param.default_value,
                    ])
                    .map_err(|e| {
                        DomainError::storage(format!("Failed to insert endpoint param: {}", e))
                    })?;
            }
        }
        Ok(endpoints.len() as u64)
    }

    async fn apply_usage_links(&self, links: &[UsageLink]) -> Result<(), DomainError> {
        if links.is_empty() {
            return Ok(());
        }
        let conn = self.conn.lock().await;
        let mut update = conn
            .prepare(
                "UPDATE usages SET \
                 enclosing_symbol_id = COALESCE(?1, enclosing_symbol_id), \
                 definition_symbol_id = COALESCE(?2, definition_symbol_id) \
                 WHERE id = ?3",
            )
            .map_err(|e| DomainError::storage(format!("Failed to prepare update: {}", e)))?;
        for link in links {
            update
                .execute(params![
                    link.enclosing_symbol_id,
                    link.definition_symbol_id,
                    link.usage_id,
                ])
                .map_err(|e| DomainError::storage(format!("Failed to apply link: {}", e)))?;
        }
        Ok(())
    }

    async fn delete_commits(&self, commit_ids: &[i64]) -> Result<(), DomainError> {
        if commit_ids.is_empty() {
            return Ok(());
        }
        let list = id_list(commit_ids);
        let conn = self.conn.lock().await;
        conn.execute_batch(&format!(
            "DELETE FROM symbol_parameters WHERE symbol_id IN (SELECT id FROM symbols WHERE commit_id IN ({list})); \
             DELETE FROM symbol_docstrings WHERE symbol_id IN (SELECT id FROM symbols WHERE commit_id IN ({list})); \
             DELETE FROM import_bindings WHERE import_id IN (SELECT id FROM imports WHERE commit_id IN ({list})); \
             DELETE FROM endpoint_params WHERE endpoint_id IN (SELECT id FROM endpoints WHERE commit_id IN ({list})); \
             DELETE FROM symbols WHERE commit_id IN ({list}); \
             DELETE FROM usages WHERE commit_id IN ({list}); \
             DELETE FROM imports WHERE commit_id IN ({list}); \
             DELETE FROM endpoints WHERE commit_id IN ({list});",
        ))
        .map_err(|e| DomainError::storage(format!("Failed to delete commit rows: {}", e)))?;
        Ok(())
    }

    async fn find_symbols_by_name(
        &self,
        commit_ids: &[i64],
        name: &str,
        kind: Option<&str>,
    ) -> Result<Vec<Symbol>, DomainError> {
        if commit_ids.is_empty() {
            return Ok(Vec::new());
        }
        let quoted = Self::quote(name);
        let mut sql = format!(
            "SELECT {} FROM symbols WHERE commit_id IN ({}) \
             AND (name = {} OR qualified_name = {})",
            Self::SYMBOL_COLUMNS,
            id_list(commit_ids),
            quoted,
            quoted,
        );
        if let Some(kind) = kind {
            sql.push_str(&format!(" AND kind = {}", Self::quote(kind)));
        }
        sql.push_str(" ORDER BY file_path, start_line");
        self.query_symbols(&sql).await
    }

    async fn symbol_by_id(&self, id: i64) -> Result<Option<Symbol>, DomainError> {
        let sql = format!(
            "SELECT {} FROM symbols WHERE id = {}",
            Self::SYMBOL_COLUMNS,
            id
        );
        Ok(self.query_symbols(&sql).await?.into_iter().next())
    }

    async fn symbols_in_file(
        &self,
        commit_id: i64,
        file_path: &str,
    ) -> Result<Vec<Symbol>, DomainError> {
        let sql = format!(
            "SELECT {} FROM symbols WHERE commit_id = {} AND file_path = {} ORDER BY start_line",
            Self::SYMBOL_COLUMNS,
            commit_id,
            Self::quote(file_path),
        );
        self.query_symbols(&sql).await
    }

    async fn children_of(&self, symbol_id: i64) -> Result<Vec<Symbol>, DomainError> {
        let sql = format!(
            "SELECT {} FROM symbols WHERE parent_symbol_id = {} ORDER BY start_line",
            Self::SYMBOL_COLUMNS,
            symbol_id
        );
        self.query_symbols(&sql).await
    }

    async fn symbol_names(
        &self,
        commit_ids: &[i64],
    ) -> Result<Vec<(String, String, i64)>, DomainError> {
        if commit_ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT name, qualified_name, id FROM symbols WHERE commit_id IN ({})",
            id_list(commit_ids)
        );
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| DomainError::storage(format!("Failed to prepare statement: {}", e)))?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            })
            .map_err(|e| DomainError::storage(format!("Failed to query names: {}", e)))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| DomainError::storage(format!("Failed to read row: {}", e)))
    }

    async fn symbols_for_commit(&self, commit_id: i64) -> Result<Vec<Symbol>, DomainError> {
        let sql = format!(
            "SELECT {} FROM symbols WHERE commit_id = {} ORDER BY file_path, start_line",
            Self::SYMBOL_COLUMNS,
            commit_id
        );
        self.query_symbols(&sql).await
    }

    async fn parameters_of(&self, symbol_id: i64) -> Result<Vec<SymbolParameter>, DomainError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(
                "SELECT position, name, type_annotation, is_optional FROM symbol_parameters \
                 WHERE symbol_id = ?1 ORDER BY position",
            )
            .map_err(|e| DomainError::storage(format!("Failed to prepare statement: {}", e)))?;
        let rows = stmt
            .query_map(params![symbol_id], |row| {
                Ok(SymbolParameter {
                    position: row.get::<_, i32>(0)? as u32,
                    name: row.get(1)?,
                    type_annotation: row.get(2)?,
                    is_optional: row.get(3)?,
                })
            })
            .map_err(|e| DomainError::storage(format!("Failed to query parameters: {}", e)))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| DomainError::storage(format!("Failed to read row: {}", e)))
    }

    async fn docstring_of(
        &self,
        symbol_id: i64,
    ) -> Result<Option<SymbolDocstring>, DomainError> {
        let conn = self.conn.lock().await;
        match conn.query_row(
            "SELECT doc_type, raw_text, description FROM symbol_docstrings WHERE symbol_id = ?1",
            params![symbol_id],
            |row| {
                Ok(SymbolDocstring {
                    doc_type: DocType::parse(&row.get::<_, String>(0)?),
                    raw_text: row.get(1)?,
                    description: row.get(2)?,
                })
            },
        ) {
            Ok(doc) => Ok(Some(doc)),
            Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(DomainError::storage(format!(
                "Failed to query docstring: {}",
                e
            ))),
        }
    }

    async fn usages_by_name(
        &self,
        commit_ids: &[i64],
        symbol_name: &str,
        file_path: Option<&str>,
    ) -> Result<Vec<Usage>, DomainError> {
        if commit_ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut sql = format!(
            "SELECT {} FROM usages WHERE commit_id IN ({}) AND symbol_name = {}",
            Self::USAGE_COLUMNS,
            id_list(commit_ids),
            Self::quote(symbol_name),
        );
        if let Some(file_path) = file_path {
            sql.push_str(&format!(" AND file_path = {}", Self::quote(file_path)));
        }
        sql.push_str(" ORDER BY file_path, line");
        self.query_usages(&sql).await
    }

    async fn usages_by_definition(
        &self,
        definition_symbol_ids: &[i64],
    ) -> Result<Vec<Usage>, DomainError> {
        if definition_symbol_ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT {} FROM usages WHERE definition_symbol_id IN ({}) ORDER BY file_path, line",
            Self::USAGE_COLUMNS,
            id_list(definition_symbol_ids),
        );
        self.query_usages(&sql).await
    }

    async fn usages_for_commit(&self, commit_id: i64) -> Result<Vec<Usage>, DomainError> {
        let sql = format!(
            "SELECT {} FROM usages WHERE commit_id = {} ORDER BY file_path, line",
            Self::USAGE_COLUMNS,
            commit_id
        );
        self.query_usages(&sql).await
    }

    async fn calls_in_range(
        &self,
        commit_id: i64,
        file_path: &str,
        start_line: u32,
        end_line: u32,
    ) -> Result<Vec<Usage>, DomainError> {
        let sql = format!(
            "SELECT {} FROM usages WHERE commit_id = {} AND file_path = {} \
             AND usage_type = 'call' AND line >= {} AND line <= {} ORDER BY line",
            Self::USAGE_COLUMNS,
            commit_id,
            Self::quote(file_path),
            start_line,
            end_line,
        );
        self.query_usages(&sql).await
    }

    async fn imports_for_file(
        &self,
        commit_id: i64,
        file_path: &str,
    ) -> Result<Vec<Import>, DomainError> {
        let sql = format!(
            "SELECT id, commit_id, file_path, line, import_type, module_specifier, resolved_path \
             FROM imports WHERE commit_id = {} AND file_path = {} ORDER BY line",
            commit_id,
            Self::quote(file_path),
        );
        let mut imports = {
            let conn = self.conn.lock().await;
            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| DomainError::storage(format!("Failed to prepare statement: {}", e)))?;
            let rows = stmt
                .query_map([], Self::row_to_import)
                .map_err(|e| DomainError::storage(format!("Failed to query imports: {}", e)))?;
            rows.collect::<Result<Vec<_>, _>>()
                .map_err(|e| DomainError::storage(format!("Failed to read row: {}", e)))?
        };
        self.attach_bindings(&mut imports).await?;
        Ok(imports)
    }

    async fn importers_of(
        &self,
        commit_ids: &[i64],
        module_specifier: &str,
    ) -> Result<Vec<Import>, DomainError> {
        if commit_ids.is_empty() {
            return Ok(Vec::new());
        }
        let quoted = Self::quote(module_specifier);
        let sql = format!(
            "SELECT id, commit_id, file_path, line, import_type, module_specifier, resolved_path \
             FROM imports WHERE commit_id IN ({}) \
             AND (module_specifier = {} OR resolved_path = {}) ORDER BY file_path, line",
            id_list(commit_ids),
            quoted,
            quoted,
        );
        let mut imports = {
            let conn = self.conn.lock().await;
            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| DomainError::storage(format!("Failed to prepare statement: {}", e)))?;
            let rows = stmt
                .query_map([], Self::row_to_import)
                .map_err(|e| DomainError::storage(format!("Failed to query importers: {}", e)))?;
            rows.collect::<Result<Vec<_>, _>>()
                .map_err(|e| DomainError::storage(format!("Failed to read row: {}", e)))?
        };
        self.attach_bindings(&mut imports).await?;
        Ok(imports)
    }

    async fn imports_for_commit(&self, commit_id: i64) -> Result<Vec<Import>, DomainError> {
        let sql = format!(
            "SELECT id, commit_id, file_path, line, import_type, module_specifier, resolved_path \
             FROM imports WHERE commit_id = {} ORDER BY file_path, line",
            commit_id
        );
        let mut imports = {
            let conn = self.conn.lock().await;
            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| DomainError::storage(format!("Failed to prepare statement: {}", e)))?;
            let rows = stmt
                .query_map([], Self::row_to_import)
                .map_err(|e| DomainError::storage(format!("Failed to query imports: {}", e)))?;
            rows.collect::<Result<Vec<_>, _>>()
                .map_err(|e| DomainError::storage(format!("Failed to read row: {}", e)))?
        };
        self.attach_bindings(&mut imports).await?;
        Ok(imports)
    }

    async fn find_endpoints(
        &self,
        commit_ids: &[i64],
        filter: &EndpointFilter,
    ) -> Result<Vec<Endpoint>, DomainError> {
        if commit_ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut sql = format!(
            "SELECT {} FROM endpoints WHERE commit_id IN ({})",
            Self::ENDPOINT_COLUMNS,
            id_list(commit_ids)
        );
        if let Some(method) = &filter.method {
            sql.push_str(&format!(
                " AND (http_method = {} OR http_method = 'ALL')",
                Self::quote(&method.to_uppercase())
            ));
        }
        if let Some(framework) = &filter.framework {
            sql.push_str(&format!(" AND framework = {}", Self::quote(framework)));
        }
        sql.push_str(" ORDER BY file_path, start_line");

        let mut endpoints = {
            let conn = self.conn.lock().await;
            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| DomainError::storage(format!("Failed to prepare statement: {}", e)))?;
            let rows = stmt
                .query_map([], Self::row_to_endpoint)
                .map_err(|e| DomainError::storage(format!("Failed to query endpoints: {}", e)))?;
            rows.collect::<Result<Vec<_>, _>>()
                .map_err(|e| DomainError::storage(format!("Failed to read row: {}", e)))?
        };

        if let Some(pattern) = &filter.path_pattern {
            endpoints.retain(|e| wildcard_match(pattern, &e.path));
        }
        self.attach_endpoint_params(&mut endpoints).await?;
        Ok(endpoints)
    }

    async fn count_symbols(&self, commit_id: i64) -> Result<u64, DomainError> {
        let conn = self.conn.lock().await;
        conn.query_row(
            "SELECT COUNT(*) FROM symbols WHERE commit_id = ?1",
            params![commit_id],
            |row| row.get::<_, i64>(0),
        )
        .map(|count| count as u64)
        .map_err(|e| DomainError::storage(format!("Failed to count symbols: {}", e)))
    }

    async fn count_usages(&self, commit_id: i64) -> Result<u64, DomainError> {
        let conn = self.conn.lock().await;
        conn.query_row(
            "SELECT COUNT(*) FROM usages WHERE commit_id = ?1",
            params![commit_id],
            |row| row.get::<_, i64>(0),
        )
        .map(|count| count as u64)
        .map_err(|e| DomainError::storage(format!("Failed to count usages: {}", e)))
    }

    async fn count_imports(&self, commit_id: i64) -> Result<u64, DomainError> {
        let conn = self.conn.lock().await;
        conn.query_row(
            "SELECT COUNT(*) FROM imports WHERE commit_id = ?1",
            params![commit_id],
            |row| row.get::<_, i64>(0),
        )
        .map(|count| count as u64)
        .map_err(|e| DomainError::storage(format!("Failed to count imports: {}", e)))
    }

    async fn symbol_counts_by_file(
        &self,
        commit_id: i64,
    ) -> Result<Vec<(String, u64)>, DomainError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(
                "SELECT file_path, COUNT(*) AS n FROM symbols WHERE commit_id = ?1 \
                 GROUP BY file_path ORDER BY n DESC, file_path",
            )
            .map_err(|e| DomainError::storage(format!("Failed to prepare statement: {}", e)))?;
        let rows = stmt
            .query_map(params![commit_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
            })
            .map_err(|e| DomainError::storage(format!("Failed to query counts: {}", e)))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| DomainError::storage(format!("Failed to read row: {}", e)))
    }

    async fn usage_counts_by_definition(
        &self,
        commit_id: i64,
        limit: usize,
    ) -> Result<Vec<(i64, u64)>, DomainError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(
                "SELECT definition_symbol_id, COUNT(*) AS n FROM usages \
                 WHERE commit_id = ?1 AND definition_symbol_id IS NOT NULL \
                 GROUP BY definition_symbol_id ORDER BY n DESC LIMIT ?2",
            )
            .map_err(|e| DomainError::storage(format!("Failed to prepare statement: {}", e)))?;
        let rows = stmt
            .query_map(params![commit_id, limit as i64], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)? as u64))
            })
            .map_err(|e| DomainError::storage(format!("Failed to query hotspots: {}", e)))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| DomainError::storage(format!("Failed to read row: {}", e)))
    }

    async fn symbols_without_usages(
        &self,
        commit_id: i64,
        exported_only: bool,
        limit: usize,
    ) -> Result<Vec<Symbol>, DomainError> {
        // Only usages that actually resolve to the symbol count; a bare-name
        // match may belong to an unrelated symbol or stay unlinked when the
        // name is ambiguous.
        let mut sql = format!(
            "SELECT {} FROM symbols s WHERE s.commit_id = {} \
             AND NOT EXISTS (SELECT 1 FROM usages u WHERE u.commit_id = s.commit_id \
                 AND u.definition_symbol_id = s.id)",
            Self::SYMBOL_COLUMNS
                .split(", ")
                .map(|col| format!("s.{}", col))
                .collect::<Vec<_>>()
                .join(", "),
            commit_id,
        );
        if exported_only {
            sql.push_str(" AND s.is_exported");
        }
        sql.push_str(&format!(
            " ORDER BY s.file_path, s.start_line LIMIT {}",
            limit
        ));
        self.query_symbols(&sql).await
    }

    async fn external_dependencies(
        &self,
        commit_id: i64,
    ) -> Result<HashMap<String, u64>, DomainError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(
                "SELECT module_specifier, COUNT(*) FROM imports \
                 WHERE commit_id = ?1 AND resolved_path IS NULL \
                 GROUP BY module_specifier",
            )
            .map_err(|e| DomainError::storage(format!("Failed to prepare statement: {}", e)))?;
        let rows = stmt
            .query_map(params![commit_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
            })
            .map_err(|e| DomainError::storage(format!("Failed to query dependencies: {}", e)))?;
        let mut map = HashMap::new();
        for row in rows {
            let (specifier, count) =
                row.map_err(|e| DomainError::storage(format!("Failed to read row: {}", e)))?;
            map.insert(specifier, count);
        }
        Ok(map)
    }
}
