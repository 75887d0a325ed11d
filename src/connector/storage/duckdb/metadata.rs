use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use duckdb::{params, Connection};
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::application::MetadataStore;
use crate::domain::{
    models::current_timestamp, CommitStatus, DomainError, EmbeddingStatus, FileBlob,
    IndexedCommit, Repository,
};

/// Quote a string literal for an IN list. Parameters cover the common
/// cases; variable-length ID sets are inlined.
fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn id_list(ids: &[i64]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

pub struct DuckdbMetadataStore {
    conn: Arc<Mutex<Connection>>,
    next_commit_id: AtomicI64,
}

impl DuckdbMetadataStore {
    pub fn new(db_path: &Path) -> Result<Self, DomainError> {
        let conn = Connection::open(db_path)
            .map_err(|e| DomainError::storage(format!("Failed to open DuckDB database: {}", e)))?;
        Self::initialize_schema(&conn)?;
        Self::from_connection(conn)
    }

    pub fn in_memory() -> Result<Self, DomainError> {
        let conn = Connection::open_in_memory().map_err(|e| {
            DomainError::storage(format!("Failed to open DuckDB in-memory DB: {}", e))
        })?;
        Self::initialize_schema(&conn)?;
        Self::from_connection(conn)
    }

    /// Open read-only: no DDL is run and no write lock is taken, so query
    /// commands can run next to an indexer.
    pub fn new_read_only(db_path: &Path) -> Result<Self, DomainError> {
        let config = duckdb::Config::default()
            .access_mode(duckdb::AccessMode::ReadOnly)
            .map_err(|e| DomainError::storage(format!("Failed to configure DuckDB: {}", e)))?;
        let conn = Connection::open_with_flags(db_path, config).map_err(|e| {
            DomainError::storage(format!("Failed to open DuckDB read-only: {}", e))
        })?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            next_commit_id: AtomicI64::new(0),
        })
    }

    fn from_connection(conn: Connection) -> Result<Self, DomainError> {
        let max_id: i64 = conn
            .query_row(
                "SELECT COALESCE(MAX(id), 0) FROM indexed_commits",
                [],
                |row| row.get(0),
            )
            .unwrap_or(0);
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            next_commit_id: AtomicI64::new(max_id + 1),
        })
    }

    /// Shared connection for the structure index and embedded vector store
    /// (DuckDB allows one write connection per file).
    pub fn shared_connection(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.conn)
    }

    fn initialize_schema(conn: &Connection) -> Result<(), DomainError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS repositories (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                path TEXT NOT NULL UNIQUE,
                created_at BIGINT NOT NULL,
                updated_at BIGINT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS indexed_commits (
                id BIGINT PRIMARY KEY,
                repo_id TEXT NOT NULL,
                commit_sha TEXT NOT NULL,
                status TEXT NOT NULL,
                embedding_status TEXT NOT NULL,
                indexed_at BIGINT NOT NULL,
                chunk_count BIGINT DEFAULT 0,
                UNIQUE (repo_id, commit_sha)
            );

            CREATE TABLE IF NOT EXISTS chunk_refs (
                chunk_id TEXT NOT NULL,
                commit_id BIGINT NOT NULL,
                UNIQUE (chunk_id, commit_id)
            );
            CREATE INDEX IF NOT EXISTS chunk_refs_commit_idx ON chunk_refs (commit_id);

            CREATE TABLE IF NOT EXISTS file_blobs (
                commit_id BIGINT NOT NULL,
                file_path TEXT NOT NULL,
                blob_sha TEXT NOT NULL,
                UNIQUE (commit_id, file_path)
            );
            CREATE INDEX IF NOT EXISTS file_blobs_sha_idx ON file_blobs (blob_sha);

            CREATE TABLE IF NOT EXISTS blob_chunks (
                blob_sha TEXT NOT NULL,
                chunk_id TEXT NOT NULL,
                UNIQUE (blob_sha, chunk_id)
            );

            CREATE TABLE IF NOT EXISTS gc_candidates (
                commit_id BIGINT PRIMARY KEY,
                orphaned_at BIGINT NOT NULL,
                eligible_for_gc_at BIGINT NOT NULL
            );
            "#,
        )
        .map_err(|e| DomainError::storage(format!("Failed to initialize metadata schema: {}", e)))?;

        debug!("DuckDB metadata schema initialized");
        Ok(())
    }

    fn row_to_commit(row: &duckdb::Row) -> Result<IndexedCommit, duckdb::Error> {
        Ok(IndexedCommit::reconstitute(
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            CommitStatus::parse(&row.get::<_, String>(3)?),
            EmbeddingStatus::parse(&row.get::<_, String>(4)?),
            row.get(5)?,
            row.get::<_, i64>(6)? as u64,
        ))
    }

    fn row_to_repository(row: &duckdb::Row) -> Result<Repository, duckdb::Error> {
        Ok(Repository::reconstitute(
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
        ))
    }

    const COMMIT_COLUMNS: &'static str =
        "id, repo_id, commit_sha, status, embedding_status, indexed_at, chunk_count";
    const REPO_COLUMNS: &'static str = "id, name, path, created_at, updated_at";
}

#[async_trait]
impl MetadataStore for DuckdbMetadataStore {
    async fn get_or_create_repository(
        &self,
        path: &str,
        name: &str,
    ) -> Result<Repository, DomainError> {
        if let Some(existing) = self.find_repository_by_path(path).await? {
            return Ok(existing);
        }
        let repository = Repository::new(name.to_string(), path.to_string());
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO repositories (id, name, path, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                repository.id(),
                repository.name(),
                repository.path(),
                repository.created_at(),
                repository.updated_at(),
            ],
        )
        .map_err(|e| DomainError::storage(format!("Failed to create repository: {}", e)))?;
        Ok(repository)
    }

    async fn find_repository_by_path(&self, path: &str) -> Result<Option<Repository>, DomainError> {
        let conn = self.conn.lock().await;
        let sql = format!(
            "SELECT {} FROM repositories WHERE path = ?1",
            Self::REPO_COLUMNS
        );
        match conn.query_row(&sql, params![path], Self::row_to_repository) {
            Ok(repo) => Ok(Some(repo)),
            Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(DomainError::storage(format!(
                "Failed to query repository: {}",
                e
            ))),
        }
    }

    async fn find_repository_by_name(&self, name: &str) -> Result<Vec<Repository>, DomainError> {
        let conn = self.conn.lock().await;
        let sql = format!(
            "SELECT {} FROM repositories WHERE name = ?1 ORDER BY path",
            Self::REPO_COLUMNS
        );
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| DomainError::storage(format!("Failed to prepare statement: {}", e)))?;
        let rows = stmt
            .query_map(params![name], Self::row_to_repository)
            .map_err(|e| DomainError::storage(format!("Failed to query repositories: {}", e)))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| DomainError::storage(format!("Failed to read row: {}", e)))
    }

    async fn find_repository_by_id(&self, id: &str) -> Result<Option<Repository>, DomainError> {
        let conn = self.conn.lock().await;
        let sql = format!(
            "SELECT {} FROM repositories WHERE id = ?1",
            Self::REPO_COLUMNS
        );
        match conn.query_row(&sql, params![id], Self::row_to_repository) {
            Ok(repo) => Ok(Some(repo)),
            Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(DomainError::storage(format!(
                "Failed to query repository: {}",
                e
            ))),
        }
    }

    async fn list_repositories(&self) -> Result<Vec<Repository>, DomainError> {
        let conn = self.conn.lock().await;
        let sql = format!(
            "SELECT {} FROM repositories ORDER BY name",
            Self::REPO_COLUMNS
        );
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| DomainError::storage(format!("Failed to prepare statement: {}", e)))?;
        let rows = stmt
            .query_map([], Self::row_to_repository)
            .map_err(|e| DomainError::storage(format!("Failed to query repositories: {}", e)))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| DomainError::storage(format!("Failed to read row: {}", e)))
    }

    async fn delete_repository(&self, id: &str) -> Result<(), DomainError> {
        let conn = self.conn.lock().await;
        conn.execute("DELETE FROM repositories WHERE id = ?1", params![id])
            .map_err(|e| DomainError::storage(format!("Failed to delete repository: {}", e)))?;
        Ok(())
    }

    async fn start_indexing(
        &self,
        repo_id: &str,
        commit_sha: &str,
        embedding_status: EmbeddingStatus,
    ) -> Result<IndexedCommit, DomainError> {
        let id = self.next_commit_id.fetch_add(1, Ordering::SeqCst);
        let now = current_timestamp();
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO indexed_commits (id, repo_id, commit_sha, status, embedding_status, indexed_at, chunk_count) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0)",
            params![
                id,
                repo_id,
                commit_sha,
                CommitStatus::InProgress.as_str(),
                embedding_status.as_str(),
                now,
            ],
        )
        .map_err(|e| DomainError::storage(format!("Failed to start indexing: {}", e)))?;
        Ok(IndexedCommit::reconstitute(
            id,
            repo_id.to_string(),
            commit_sha.to_string(),
            CommitStatus::InProgress,
            embedding_status,
            now,
            0,
        ))
    }

    async fn complete_indexing(
        &self,
        commit_id: i64,
        chunk_count: u64,
    ) -> Result<(), DomainError> {
        let conn = self.conn.lock().await;
        let updated = conn
            .execute(
                "UPDATE indexed_commits SET status = 'complete', chunk_count = ?1, \
                 embedding_status = CASE embedding_status WHEN 'pending' THEN 'complete' ELSE embedding_status END \
                 WHERE id = ?2 AND status = 'in_progress'",
                params![chunk_count as i64, commit_id],
            )
            .map_err(|e| DomainError::storage(format!("Failed to complete indexing: {}", e)))?;
        if updated == 0 {
            return Err(DomainError::storage(format!(
                "Commit {} is not in progress",
                commit_id
            )));
        }
        Ok(())
    }

    async fn fail_indexing(&self, commit_id: i64) -> Result<(), DomainError> {
        let conn = self.conn.lock().await;
        conn.execute(
            "UPDATE indexed_commits SET status = 'failed' WHERE id = ?1 AND status = 'in_progress'",
            params![commit_id],
        )
        .map_err(|e| DomainError::storage(format!("Failed to mark commit failed: {}", e)))?;
        Ok(())
    }

    async fn find_commit(
        &self,
        repo_id: &str,
        commit_sha: &str,
    ) -> Result<Option<IndexedCommit>, DomainError> {
        let conn = self.conn.lock().await;
        let sql = format!(
            "SELECT {} FROM indexed_commits WHERE repo_id = ?1 AND commit_sha = ?2",
            Self::COMMIT_COLUMNS
        );
        match conn.query_row(&sql, params![repo_id, commit_sha], Self::row_to_commit) {
            Ok(commit) => Ok(Some(commit)),
            Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(DomainError::storage(format!(
                "Failed to query commit: {}",
                e
            ))),
        }
    }

    async fn commits_for_repo(&self, repo_id: &str) -> Result<Vec<IndexedCommit>, DomainError> {
        let conn = self.conn.lock().await;
        let sql = format!(
            "SELECT {} FROM indexed_commits WHERE repo_id = ?1 ORDER BY indexed_at DESC",
            Self::COMMIT_COLUMNS
        );
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| DomainError::storage(format!("Failed to prepare statement: {}", e)))?;
        let rows = stmt
            .query_map(params![repo_id], Self::row_to_commit)
            .map_err(|e| DomainError::storage(format!("Failed to query commits: {}", e)))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| DomainError::storage(format!("Failed to read row: {}", e)))
    }

    async fn add_chunk_refs(&self, commit_id: i64, chunk_ids: &[Uuid]) -> Result<(), DomainError> {
        if chunk_ids.is_empty() {
            return Ok(());
        }
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare("INSERT OR IGNORE INTO chunk_refs (chunk_id, commit_id) VALUES (?1, ?2)")
            .map_err(|e| DomainError::storage(format!("Failed to prepare insert: {}", e)))?;
        for chunk_id in chunk_ids {
            stmt.execute(params![chunk_id.to_string(), commit_id])
                .map_err(|e| DomainError::storage(format!("Failed to add chunk ref: {}", e)))?;
        }
        Ok(())
    }

    async fn chunk_refs_for_commit(&self, commit_id: i64) -> Result<Vec<Uuid>, DomainError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare("SELECT chunk_id FROM chunk_refs WHERE commit_id = ?1")
            .map_err(|e| DomainError::storage(format!("Failed to prepare statement: {}", e)))?;
        let rows = stmt
            .query_map(params![commit_id], |row| row.get::<_, String>(0))
            .map_err(|e| DomainError::storage(format!("Failed to query chunk refs: {}", e)))?;
        let mut ids = Vec::new();
        for row in rows {
            let raw = row.map_err(|e| DomainError::storage(format!("Failed to read row: {}", e)))?;
            ids.push(
                Uuid::parse_str(&raw)
                    .map_err(|e| DomainError::storage(format!("Bad chunk id {}: {}", raw, e)))?,
            );
        }
        Ok(ids)
    }

    async fn chunks_only_in(&self, commit_ids: &[i64]) -> Result<Vec<Uuid>, DomainError> {
        if commit_ids.is_empty() {
            return Ok(Vec::new());
        }
        let list = id_list(commit_ids);
        let sql = format!(
            "SELECT chunk_id FROM chunk_refs GROUP BY chunk_id \
             HAVING SUM(CASE WHEN commit_id IN ({list}) THEN 1 ELSE 0 END) > 0 \
                AND SUM(CASE WHEN commit_id NOT IN ({list}) THEN 1 ELSE 0 END) = 0",
        );
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| DomainError::storage(format!("Failed to prepare statement: {}", e)))?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| DomainError::storage(format!("Failed to query orphan chunks: {}", e)))?;
        let mut ids = Vec::new();
        for row in rows {
            let raw = row.map_err(|e| DomainError::storage(format!("Failed to read row: {}", e)))?;
            ids.push(
                Uuid::parse_str(&raw)
                    .map_err(|e| DomainError::storage(format!("Bad chunk id {}: {}", raw, e)))?,
            );
        }
        Ok(ids)
    }

    async fn store_file_blobs(
        &self,
        commit_id: i64,
        blobs: &[(String, String)],
    ) -> Result<(), DomainError> {
        if blobs.is_empty() {
            return Ok(());
        }
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(
                "INSERT INTO file_blobs (commit_id, file_path, blob_sha) VALUES (?1, ?2, ?3) \
                 ON CONFLICT (commit_id, file_path) DO UPDATE SET blob_sha = excluded.blob_sha",
            )
            .map_err(|e| DomainError::storage(format!("Failed to prepare insert: {}", e)))?;
        for (file_path, blob_sha) in blobs {
            stmt.execute(params![commit_id, file_path, blob_sha])
                .map_err(|e| DomainError::storage(format!("Failed to store file blob: {}", e)))?;
        }
        Ok(())
    }

    async fn get_file_blobs(&self, commit_id: i64) -> Result<Vec<FileBlob>, DomainError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(
                "SELECT commit_id, file_path, blob_sha FROM file_blobs WHERE commit_id = ?1 ORDER BY file_path",
            )
            .map_err(|e| DomainError::storage(format!("Failed to prepare statement: {}", e)))?;
        let rows = stmt
            .query_map(params![commit_id], |row| {
                Ok(FileBlob {
                    commit_id: row.get(0)?,
                    file_path: row.get(1)?,
                    blob_sha: row.get(2)?,
                })
            })
            .map_err(|e| DomainError::storage(format!("Failed to query file blobs: {}", e)))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| DomainError::storage(format!("Failed to read row: {}", e)))
    }

    async fn store_blob_chunks(
        &self,
        blob_sha: &str,
        chunk_ids: &[Uuid],
    ) -> Result<(), DomainError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare("INSERT OR IGNORE INTO blob_chunks (blob_sha, chunk_id) VALUES (?1, ?2)")
            .map_err(|e| DomainError::storage(format!("Failed to prepare insert: {}", e)))?;
        for chunk_id in chunk_ids {
            stmt.execute(params![blob_sha, chunk_id.to_string()])
                .map_err(|e| DomainError::storage(format!("Failed to store blob chunk: {}", e)))?;
        }
        Ok(())
    }

    async fn get_indexed_blobs(
        &self,
        blob_shas: &[String],
    ) -> Result<HashSet<String>, DomainError> {
        if blob_shas.is_empty() {
            return Ok(HashSet::new());
        }
        let list = blob_shas.iter().map(|s| quote(s)).collect::<Vec<_>>().join(",");
        let sql = format!("SELECT DISTINCT blob_sha FROM blob_chunks WHERE blob_sha IN ({list})");
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| DomainError::storage(format!("Failed to prepare statement: {}", e)))?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| DomainError::storage(format!("Failed to query indexed blobs: {}", e)))?;
        let mut found = HashSet::new();
        for row in rows {
            found.insert(
                row.map_err(|e| DomainError::storage(format!("Failed to read row: {}", e)))?,
            );
        }
        Ok(found)
    }

    async fn get_chunks_for_blobs(
        &self,
        blob_shas: &[String],
    ) -> Result<HashMap<String, Vec<Uuid>>, DomainError> {
        if blob_shas.is_empty() {
            return Ok(HashMap::new());
        }
        let list = blob_shas.iter().map(|s| quote(s)).collect::<Vec<_>>().join(",");
        let sql =
            format!("SELECT blob_sha, chunk_id FROM blob_chunks WHERE blob_sha IN ({list})");
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| DomainError::storage(format!("Failed to prepare statement: {}", e)))?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(|e| DomainError::storage(format!("Failed to query blob chunks: {}", e)))?;
        let mut map: HashMap<String, Vec<Uuid>> = HashMap::new();
        for row in rows {
            let (blob_sha, raw) =
                row.map_err(|e| DomainError::storage(format!("Failed to read row: {}", e)))?;
            let chunk_id = Uuid::parse_str(&raw)
                .map_err(|e| DomainError::storage(format!("Bad chunk id {}: {}", raw, e)))?;
            map.entry(blob_sha).or_default().push(chunk_id);
        }
        Ok(map)
    }

    async fn mark_superseded(
        &self,
        repo_id: &str,
        keep_commit_id: i64,
        eligible_at: i64,
    ) -> Result<usize, DomainError> {
        let now = current_timestamp();
        let conn = self.conn.lock().await;
        let inserted = conn
            .execute(
                "INSERT INTO gc_candidates (commit_id, orphaned_at, eligible_for_gc_at) \
                 SELECT id, ?1, ?2 FROM indexed_commits \
                 WHERE repo_id = ?3 AND id != ?4 \
                   AND id NOT IN (SELECT commit_id FROM gc_candidates)",
                params![now, eligible_at, repo_id, keep_commit_id],
            )
            .map_err(|e| DomainError::storage(format!("Failed to mark GC candidates: {}", e)))?;
        Ok(inserted)
    }

    async fn get_eligible_for_gc(&self, now: i64) -> Result<Vec<IndexedCommit>, DomainError> {
        let sql = format!(
            "SELECT {} FROM indexed_commits c \
             JOIN gc_candidates g ON g.commit_id = c.id \
             WHERE g.eligible_for_gc_at <= ?1",
            Self::COMMIT_COLUMNS
                .split(", ")
                .map(|col| format!("c.{}", col))
                .collect::<Vec<_>>()
                .join(", ")
        );
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| DomainError::storage(format!("Failed to prepare statement: {}", e)))?;
        let rows = stmt
            .query_map(params![now], Self::row_to_commit)
            .map_err(|e| DomainError::storage(format!("Failed to query GC candidates: {}", e)))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| DomainError::storage(format!("Failed to read row: {}", e)))
    }

    async fn delete_commits(&self, commit_ids: &[i64]) -> Result<(), DomainError> {
        if commit_ids.is_empty() {
            return Ok(());
        }
        let list = id_list(commit_ids);
        let conn = self.conn.lock().await;
        conn.execute_batch(&format!(
            "DELETE FROM chunk_refs WHERE commit_id IN ({list}); \
             DELETE FROM file_blobs WHERE commit_id IN ({list}); \
             DELETE FROM gc_candidates WHERE commit_id IN ({list}); \
             DELETE FROM indexed_commits WHERE id IN ({list}); \
             DELETE FROM blob_chunks WHERE blob_sha NOT IN (SELECT DISTINCT blob_sha FROM file_blobs);",
        ))
        .map_err(|e| DomainError::storage(format!("Failed to delete commits: {}", e)))?;
        Ok(())
    }

    async fn delete_all_commits_for_repo(&self, repo_id: &str) -> Result<Vec<i64>, DomainError> {
        let commit_ids: Vec<i64> = {
            let conn = self.conn.lock().await;
            let mut stmt = conn
                .prepare("SELECT id FROM indexed_commits WHERE repo_id = ?1")
                .map_err(|e| DomainError::storage(format!("Failed to prepare statement: {}", e)))?;
            let rows = stmt
                .query_map(params![repo_id], |row| row.get(0))
                .map_err(|e| DomainError::storage(format!("Failed to query commits: {}", e)))?;
            rows.collect::<Result<Vec<_>, _>>()
                .map_err(|e| DomainError::storage(format!("Failed to read row: {}", e)))?
        };
        self.delete_commits(&commit_ids).await?;
        Ok(commit_ids)
    }
}
