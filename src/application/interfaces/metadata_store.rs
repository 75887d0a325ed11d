use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{DomainError, EmbeddingStatus, FileBlob, IndexedCommit, Repository};

/// Persistence for repositories, indexed commits, chunk references, file/blob
/// tracking, and GC candidates. Single-writer; all writes for one commit go
/// through one connection.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    // ── Repositories ─────────────────────────────────────────────────────

    async fn get_or_create_repository(
        &self,
        path: &str,
        name: &str,
    ) -> Result<Repository, DomainError>;

    async fn find_repository_by_path(&self, path: &str) -> Result<Option<Repository>, DomainError>;

    async fn find_repository_by_name(&self, name: &str) -> Result<Vec<Repository>, DomainError>;

    async fn find_repository_by_id(&self, id: &str) -> Result<Option<Repository>, DomainError>;

    async fn list_repositories(&self) -> Result<Vec<Repository>, DomainError>;

    async fn delete_repository(&self, id: &str) -> Result<(), DomainError>;

    // ── Indexed commits ──────────────────────────────────────────────────

    /// Insert a new `in_progress` commit record. Fails on a duplicate
    /// (repo_id, commit_sha) pair.
    async fn start_indexing(
        &self,
        repo_id: &str,
        commit_sha: &str,
        embedding_status: EmbeddingStatus,
    ) -> Result<IndexedCommit, DomainError>;

    /// Atomic `in_progress → complete` flip together with the chunk count.
    async fn complete_indexing(&self, commit_id: i64, chunk_count: u64)
        -> Result<(), DomainError>;

    async fn fail_indexing(&self, commit_id: i64) -> Result<(), DomainError>;

    async fn find_commit(
        &self,
        repo_id: &str,
        commit_sha: &str,
    ) -> Result<Option<IndexedCommit>, DomainError>;

    async fn commits_for_repo(&self, repo_id: &str) -> Result<Vec<IndexedCommit>, DomainError>;

    // ── Chunk references ─────────────────────────────────────────────────

    async fn add_chunk_refs(&self, commit_id: i64, chunk_ids: &[Uuid]) -> Result<(), DomainError>;

    async fn chunk_refs_for_commit(&self, commit_id: i64) -> Result<Vec<Uuid>, DomainError>;

    /// Chunks referenced exclusively by the given commits (the GC orphan
    /// candidates once those commits go away).
    async fn chunks_only_in(&self, commit_ids: &[i64]) -> Result<Vec<Uuid>, DomainError>;

    // ── File / blob tracking ─────────────────────────────────────────────

    /// Upsert on (commit_id, file_path): re-storing replaces prior mappings.
    async fn store_file_blobs(
        &self,
        commit_id: i64,
        blobs: &[(String, String)],
    ) -> Result<(), DomainError>;

    async fn get_file_blobs(&self, commit_id: i64) -> Result<Vec<FileBlob>, DomainError>;

    /// Idempotent: repeated calls for the same blob do not duplicate rows.
    async fn store_blob_chunks(&self, blob_sha: &str, chunk_ids: &[Uuid])
        -> Result<(), DomainError>;

    /// The subset of `blob_shas` already decomposed into chunks.
    async fn get_indexed_blobs(
        &self,
        blob_shas: &[String],
    ) -> Result<HashSet<String>, DomainError>;

    async fn get_chunks_for_blobs(
        &self,
        blob_shas: &[String],
    ) -> Result<HashMap<String, Vec<Uuid>>, DomainError>;

    // ── Garbage collection ───────────────────────────────────────────────

    /// Mark every other complete commit of `repo_id` as superseded,
    /// eligible for GC at `eligible_at`. Already-marked commits keep their
    /// original eligibility time.
    async fn mark_superseded(
        &self,
        repo_id: &str,
        keep_commit_id: i64,
        eligible_at: i64,
    ) -> Result<usize, DomainError>;

    async fn get_eligible_for_gc(&self, now: i64) -> Result<Vec<IndexedCommit>, DomainError>;

    /// Delete commit records and their chunk refs, file blobs, and GC
    /// candidate rows. Blob→chunk mappings with no surviving file blob are
    /// dropped too.
    async fn delete_commits(&self, commit_ids: &[i64]) -> Result<(), DomainError>;

    /// Delete every commit of a repository; returns the deleted commit IDs
    /// so the caller can cascade structure-index rows.
    async fn delete_all_commits_for_repo(&self, repo_id: &str) -> Result<Vec<i64>, DomainError>;
}
