use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A filesystem repository known to the index. Created lazily on first
/// indexing of a path, never auto-deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repository {
    id: String,
    name: String,
    path: String,
    created_at: i64,
    updated_at: i64,
}

impl Repository {
    pub fn new(name: String, path: String) -> Self {
        let now = current_timestamp();
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            path,
            created_at: now,
            updated_at: now,
        }
    }

    /// Reconstitutes from persisted data (used by adapters).
    pub fn reconstitute(
        id: String,
        name: String,
        path: String,
        created_at: i64,
        updated_at: i64,
    ) -> Self {
        Self {
            id,
            name,
            path,
            created_at,
            updated_at,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn created_at(&self) -> i64 {
        self.created_at
    }

    pub fn updated_at(&self) -> i64 {
        self.updated_at
    }
}

/// The indexing status of one (repository, commit) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitStatus {
    InProgress,
    Complete,
    Failed,
}

impl CommitStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommitStatus::InProgress => "in_progress",
            CommitStatus::Complete => "complete",
            CommitStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "complete" => CommitStatus::Complete,
            "failed" => CommitStatus::Failed,
            _ => CommitStatus::InProgress,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, CommitStatus::Complete)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingStatus {
    None,
    Pending,
    Complete,
}

impl EmbeddingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmbeddingStatus::None => "none",
            EmbeddingStatus::Pending => "pending",
            EmbeddingStatus::Complete => "complete",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "pending" => EmbeddingStatus::Pending,
            "complete" => EmbeddingStatus::Complete,
            _ => EmbeddingStatus::None,
        }
    }
}

/// One indexed commit of a repository. Unique per (repo_id, commit_sha).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedCommit {
    id: i64,
    repo_id: String,
    commit_sha: String,
    status: CommitStatus,
    embedding_status: EmbeddingStatus,
    indexed_at: i64,
    chunk_count: u64,
}

impl IndexedCommit {
    pub fn reconstitute(
        id: i64,
        repo_id: String,
        commit_sha: String,
        status: CommitStatus,
        embedding_status: EmbeddingStatus,
        indexed_at: i64,
        chunk_count: u64,
    ) -> Self {
        Self {
            id,
            repo_id,
            commit_sha,
            status,
            embedding_status,
            indexed_at,
            chunk_count,
        }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn repo_id(&self) -> &str {
        &self.repo_id
    }

    pub fn commit_sha(&self) -> &str {
        &self.commit_sha
    }

    pub fn short_sha(&self) -> &str {
        &self.commit_sha[..self.commit_sha.len().min(12)]
    }

    pub fn status(&self) -> CommitStatus {
        self.status
    }

    pub fn embedding_status(&self) -> EmbeddingStatus {
        self.embedding_status
    }

    pub fn indexed_at(&self) -> i64 {
        self.indexed_at
    }

    pub fn chunk_count(&self) -> u64 {
        self.chunk_count
    }
}

/// Snapshot of one tracked file at a commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileBlob {
    pub commit_id: i64,
    pub file_path: String,
    pub blob_sha: String,
}

pub(crate) fn current_timestamp() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_creation() {
        let repo = Repository::new("my-repo".to_string(), "/path/to/repo".to_string());
        assert_eq!(repo.name(), "my-repo");
        assert_eq!(repo.path(), "/path/to/repo");
        assert!(!repo.id().is_empty());
    }

    #[test]
    fn test_commit_status_roundtrip() {
        for status in [
            CommitStatus::InProgress,
            CommitStatus::Complete,
            CommitStatus::Failed,
        ] {
            assert_eq!(CommitStatus::parse(status.as_str()), status);
        }
    }

    #[test]
    fn test_embedding_status_roundtrip() {
        for status in [
            EmbeddingStatus::None,
            EmbeddingStatus::Pending,
            EmbeddingStatus::Complete,
        ] {
            assert_eq!(EmbeddingStatus::parse(status.as_str()), status);
        }
    }

    #[test]
    fn test_short_sha() {
        let commit = IndexedCommit::reconstitute(
            1,
            "repo".to_string(),
            "0123456789abcdef0123456789abcdef01234567".to_string(),
            CommitStatus::Complete,
            EmbeddingStatus::Complete,
            0,
            10,
        );
        assert_eq!(commit.short_sha(), "0123456789ab");
    }
}
