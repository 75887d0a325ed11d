use std::sync::Arc;

use async_trait::async_trait;
use duckdb::{params, Connection};
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::application::{ChunkHit, ChunkPayload, SearchFilter, VectorRepository, VectorStats};
use crate::domain::{wildcard_match, DomainError};

/// Embedded vector store: chunk payloads and embeddings in the same DuckDB
/// file as the metadata, similarity search through the VSS extension's HNSW
/// index.
pub struct DuckdbVectorStore {
    conn: Arc<Mutex<Connection>>,
    dimensions: usize,
    read_only: bool,
}

impl DuckdbVectorStore {
    pub fn new(conn: Arc<Mutex<Connection>>, dimensions: usize) -> Self {
        Self {
            conn,
            dimensions,
            read_only: false,
        }
    }

    /// Read-only mode skips DDL in `initialize` (the extension load is still
    /// required for HNSW search).
    pub fn new_read_only(conn: Arc<Mutex<Connection>>, dimensions: usize) -> Self {
        Self {
            conn,
            dimensions,
            read_only: true,
        }
    }

    fn vector_to_array_literal(&self, vector: &[f32]) -> Result<String, DomainError> {
        if vector.len() != self.dimensions {
            return Err(DomainError::invalid_argument(format!(
                "Expected embedding dimension {}, got {}",
                self.dimensions,
                vector.len()
            )));
        }
        let mut literal = String::with_capacity(vector.len() * 8);
        literal.push('[');
        for (i, value) in vector.iter().enumerate() {
            if i > 0 {
                literal.push_str(", ");
            }
            literal.push_str(&format!("{}", value));
        }
        literal.push(']');
        literal.push_str(&format!("::FLOAT[{}]", self.dimensions));
        Ok(literal)
    }

    fn quote(value: &str) -> String {
        format!("'{}'", value.replace('\'', "''"))
    }

    fn commits_json(commits: &[String]) -> String {
        serde_json::to_string(commits).unwrap_or_else(|_| "[]".to_string())
    }

    fn row_to_hit(row: &duckdb::Row, score: f32) -> Result<ChunkHit, duckdb::Error> {
        Ok(ChunkHit {
            chunk_id: Uuid::parse_str(&row.get::<_, String>(0)?).unwrap_or_default(),
            repo_id: row.get(1)?,
            repo_name: row.get(2)?,
            file_path: row.get(3)?,
            symbol: row.get(4)?,
            symbol_type: row.get(5)?,
            language: row.get(6)?,
            content_type: row.get(7)?,
            start_line: row.get::<_, i32>(8)? as u32,
            end_line: row.get::<_, i32>(9)? as u32,
            content: row.get(10)?,
            score,
        })
    }

    const HIT_COLUMNS: &'static str = "id, repo_id, repo_name, file_path, symbol, symbol_type, \
         language, content_type, start_line, end_line, content";
}

#[async_trait]
impl VectorRepository for DuckdbVectorStore {
    async fn initialize(&self) -> Result<(), DomainError> {
        let conn = self.conn.lock().await;
        conn.execute_batch(
            "INSTALL vss; LOAD vss; SET hnsw_enable_experimental_persistence = true;",
        )
        .map_err(|e| DomainError::storage(format!("Failed to initialize VSS extension: {}", e)))?;

        if self.read_only {
            debug!("Vector store opened read-only; skipping schema DDL");
            return Ok(());
        }

        let schema_sql = format!(
            r#"
            CREATE TABLE IF NOT EXISTS vector_chunks (
                id TEXT PRIMARY KEY,
                repo_id TEXT NOT NULL,
                repo_name TEXT NOT NULL,
                file_path TEXT NOT NULL,
                symbol TEXT NOT NULL,
                symbol_type TEXT NOT NULL,
                language TEXT NOT NULL,
                content_type TEXT NOT NULL,
                start_line INTEGER NOT NULL,
                end_line INTEGER NOT NULL,
                content TEXT NOT NULL,
                commits TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS vector_embeddings (
                chunk_id TEXT PRIMARY KEY,
                vector FLOAT[{dims}] NOT NULL
            );

            CREATE INDEX IF NOT EXISTS vector_chunks_repo_idx ON vector_chunks (repo_id);
            CREATE INDEX IF NOT EXISTS vector_embedding_hnsw_idx
                ON vector_embeddings USING HNSW (vector) WITH (metric = 'cosine');
            "#,
            dims = self.dimensions,
        );
        conn.execute_batch(&schema_sql)
            .map_err(|e| DomainError::storage(format!("Failed to initialize vector schema: {}", e)))?;
        debug!("DuckDB vector schema initialized ({} dims)", self.dimensions);
        Ok(())
    }

    async fn upsert_chunks(&self, payloads: &[ChunkPayload]) -> Result<(), DomainError> {
        if payloads.is_empty() {
            return Ok(());
        }
        let conn = self.conn.lock().await;
        let mut upsert = conn
            .prepare(
                "INSERT INTO vector_chunks (id, repo_id, repo_name, file_path, symbol, \
                 symbol_type, language, content_type, start_line, end_line, content, commits) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12) \
                 ON CONFLICT (id) DO UPDATE SET commits = excluded.commits",
            )
            .map_err(|e| DomainError::storage(format!("Failed to prepare upsert: {}", e)))?;

        for payload in payloads {
            // Merge the new commit into any previously stored commit list.
            let existing: Option<String> = conn
                .query_row(
                    "SELECT commits FROM vector_chunks WHERE id = ?1",
                    params![payload.chunk_id.to_string()],
                    |row| row.get(0),
                )
                .ok();
            let mut commits: Vec<String> = existing
                .and_then(|raw| serde_json::from_str(&raw).ok())
                .unwrap_or_default();
            if !commits.contains(&payload.commit_sha) {
                commits.push(payload.commit_sha.clone());
            }

            upsert
                .execute(params![
                    payload.chunk_id.to_string(),
                    payload.repo_id,
                    payload.repo_name,
                    payload.chunk.file_path(),
                    payload.chunk.symbol(),
                    payload.chunk.symbol_type().as_str(),
                    payload.chunk.language().as_str(),
                    payload.content_type.as_str(),
                    payload.chunk.start_line() as i32,
                    payload.chunk.end_line() as i32,
                    payload.chunk.content(),
                    Self::commits_json(&commits),
                ])
                .map_err(|e| DomainError::storage(format!("Failed to upsert chunk: {}", e)))?;

            let array_literal = self.vector_to_array_literal(&payload.vector)?;
            conn.execute(
                &format!(
                    "INSERT INTO vector_embeddings (chunk_id, vector) VALUES (?1, {array_literal}) \
                     ON CONFLICT (chunk_id) DO NOTHING",
                ),
                params![payload.chunk_id.to_string()],
            )
            .map_err(|e| DomainError::storage(format!("Failed to upsert embedding: {}", e)))?;
        }
        debug!("Upserted {} chunks into vector store", payloads.len());
        Ok(())
    }

    async fn add_commit_to_chunk(
        &self,
        chunk_id: Uuid,
        commit_sha: &str,
    ) -> Result<(), DomainError> {
        let conn = self.conn.lock().await;
        let existing: String = conn
            .query_row(
                "SELECT commits FROM vector_chunks WHERE id = ?1",
                params![chunk_id.to_string()],
                |row| row.get(0),
            )
            .map_err(|e| DomainError::storage(format!("Chunk {} not found: {}", chunk_id, e)))?;
        let mut commits: Vec<String> = serde_json::from_str(&existing).unwrap_or_default();
        if !commits.contains(&commit_sha.to_string()) {
            commits.push(commit_sha.to_string());
            conn.execute(
                "UPDATE vector_chunks SET commits = ?1 WHERE id = ?2",
                params![Self::commits_json(&commits), chunk_id.to_string()],
            )
            .map_err(|e| DomainError::storage(format!("Failed to tag chunk commit: {}", e)))?;
        }
        Ok(())
    }

    async fn search(
        &self,
        query_vector: &[f32],
        filter: &SearchFilter,
        limit: usize,
    ) -> Result<Vec<ChunkHit>, DomainError> {
        let array_literal = self.vector_to_array_literal(query_vector)?;
        let mut where_clauses: Vec<String> = Vec::new();
        if let Some(repo_id) = &filter.repo_id {
            where_clauses.push(format!("c.repo_id = {}", Self::quote(repo_id)));
        }
        if let Some(commit_sha) = &filter.commit_sha {
            // Commit SHAs are stored as a JSON array of quoted 40-hex strings.
            where_clauses.push(format!(
                "c.commits LIKE {}",
                Self::quote(&format!("%\"{}\"%", commit_sha))
            ));
        }
        if let Some(language) = &filter.language {
            where_clauses.push(format!("c.language = {}", Self::quote(language)));
        }
        if let Some(content_type) = &filter.content_type {
            where_clauses.push(format!(
                "c.content_type = {}",
                Self::quote(content_type.as_str())
            ));
        }

        let mut sql = format!(
            "SELECT {}, 1.0 - array_cosine_distance(e.vector, {array_literal}) AS score \
             FROM vector_embeddings e JOIN vector_chunks c ON c.id = e.chunk_id",
            Self::HIT_COLUMNS
                .split(", ")
                .map(|col| format!("c.{}", col))
                .collect::<Vec<_>>()
                .join(", "),
        );
        if !where_clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&where_clauses.join(" AND "));
        }
        sql.push_str(&format!(
            " ORDER BY array_cosine_distance(e.vector, {array_literal}) LIMIT {}",
            // Path patterns filter after the scan; over-fetch to compensate.
            if filter.path_pattern.is_some() {
                limit * 4
            } else {
                limit
            }
        ));

        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| DomainError::storage(format!("Failed to prepare search: {}", e)))?;
        let mut rows = stmt
            .query([])
            .map_err(|e| DomainError::storage(format!("Failed to run search: {}", e)))?;

        let mut hits = Vec::new();
        while let Some(row) = rows
            .next()
            .map_err(|e| DomainError::storage(format!("Failed to read search row: {}", e)))?
        {
            let score: f32 = row
                .get(11)
                .map_err(|e| DomainError::storage(format!("Failed to read score: {}", e)))?;
            let hit = Self::row_to_hit(row, score)
                .map_err(|e| DomainError::storage(format!("Failed to parse hit: {}", e)))?;
            if let Some(pattern) = &filter.path_pattern {
                if !wildcard_match(pattern, &hit.file_path) {
                    continue;
                }
            }
            hits.push(hit);
            if hits.len() >= limit {
                break;
            }
        }
        Ok(hits)
    }

    async fn get_chunks(&self, chunk_ids: &[Uuid]) -> Result<Vec<ChunkHit>, DomainError> {
        if chunk_ids.is_empty() {
            return Ok(Vec::new());
        }
        let list = chunk_ids
            .iter()
            .map(|id| Self::quote(&id.to_string()))
            .collect::<Vec<_>>()
            .join(",");
        let sql = format!(
            "SELECT {} FROM vector_chunks c WHERE c.id IN ({list})",
            Self::HIT_COLUMNS
                .split(", ")
                .map(|col| format!("c.{}", col))
                .collect::<Vec<_>>()
                .join(", "),
        );
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| DomainError::storage(format!("Failed to prepare statement: {}", e)))?;
        let mut rows = stmt
            .query([])
            .map_err(|e| DomainError::storage(format!("Failed to query chunks: {}", e)))?;
        let mut hits = Vec::new();
        while let Some(row) = rows
            .next()
            .map_err(|e| DomainError::storage(format!("Failed to read row: {}", e)))?
        {
            hits.push(
                Self::row_to_hit(row, 1.0)
                    .map_err(|e| DomainError::storage(format!("Failed to parse hit: {}", e)))?,
            );
        }
        Ok(hits)
    }

    async fn chunks_exist(&self, chunk_ids: &[Uuid]) -> Result<Vec<Uuid>, DomainError> {
        if chunk_ids.is_empty() {
            return Ok(Vec::new());
        }
        let list = chunk_ids
            .iter()
            .map(|id| Self::quote(&id.to_string()))
            .collect::<Vec<_>>()
            .join(",");
        let sql = format!("SELECT id FROM vector_chunks WHERE id IN ({list})");
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| DomainError::storage(format!("Failed to prepare statement: {}", e)))?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| DomainError::storage(format!("Failed to query existence: {}", e)))?;
        let mut found = Vec::new();
        for row in rows {
            let raw = row.map_err(|e| DomainError::storage(format!("Failed to read row: {}", e)))?;
            if let Ok(id) = Uuid::parse_str(&raw) {
                found.push(id);
            }
        }
        Ok(found)
    }

    async fn delete_chunks(&self, chunk_ids: &[Uuid]) -> Result<u64, DomainError> {
        if chunk_ids.is_empty() {
            return Ok(0);
        }
        let list = chunk_ids
            .iter()
            .map(|id| Self::quote(&id.to_string()))
            .collect::<Vec<_>>()
            .join(",");
        let conn = self.conn.lock().await;
        conn.execute(
            &format!("DELETE FROM vector_embeddings WHERE chunk_id IN ({list})"),
            [],
        )
        .map_err(|e| DomainError::storage(format!("Failed to delete embeddings: {}", e)))?;
        let deleted = conn
            .execute(&format!("DELETE FROM vector_chunks WHERE id IN ({list})"), [])
            .map_err(|e| DomainError::storage(format!("Failed to delete chunks: {}", e)))?;
        Ok(deleted as u64)
    }

    async fn delete_by_repo_id(&self, repo_id: &str) -> Result<u64, DomainError> {
        let conn = self.conn.lock().await;
        conn.execute(
            "DELETE FROM vector_embeddings WHERE chunk_id IN \
             (SELECT id FROM vector_chunks WHERE repo_id = ?1)",
            params![repo_id],
        )
        .map_err(|e| DomainError::storage(format!("Failed to delete embeddings: {}", e)))?;
        let deleted = conn
            .execute(
                "DELETE FROM vector_chunks WHERE repo_id = ?1",
                params![repo_id],
            )
            .map_err(|e| DomainError::storage(format!("Failed to delete chunks: {}", e)))?;
        Ok(deleted as u64)
    }

    async fn get_stats(&self) -> Result<VectorStats, DomainError> {
        let conn = self.conn.lock().await;
        let total_chunks: i64 = conn
            .query_row("SELECT COUNT(*) FROM vector_chunks", [], |row| row.get(0))
            .map_err(|e| DomainError::storage(format!("Failed to count chunks: {}", e)))?;
        let total_embeddings: i64 = conn
            .query_row("SELECT COUNT(*) FROM vector_embeddings", [], |row| row.get(0))
            .map_err(|e| DomainError::storage(format!("Failed to count embeddings: {}", e)))?;
        Ok(VectorStats {
            total_chunks: total_chunks as u64,
            total_embeddings: total_embeddings as u64,
        })
    }

    async fn close(&self) -> Result<(), DomainError> {
        Ok(())
    }
}
