use std::path::Path;

use async_trait::async_trait;

use crate::domain::{DomainError, RepoIdentity, TreeEntry};

/// Read-only access to a Git repository at specific commits. Implementations
/// never mutate the working tree or refs.
#[async_trait]
pub trait GitView: Send + Sync {
    /// Resolve the repository identity for a path. Worktrees resolve to the
    /// main repository's path while reads still hit the worktree checkout.
    async fn repository_identity(&self, path: &Path) -> Result<RepoIdentity, DomainError>;

    /// Resolve any ref-like string (`HEAD`, branch, tag, short SHA) to a
    /// full 40-hex commit SHA.
    async fn resolve_ref(&self, repo_path: &Path, refname: &str) -> Result<String, DomainError>;

    /// List files tracked at a commit with their blob identities.
    async fn list_files(
        &self,
        repo_path: &Path,
        commit_sha: &str,
    ) -> Result<Vec<TreeEntry>, DomainError>;

    /// Read a blob's raw bytes.
    async fn read_blob(&self, repo_path: &Path, blob_sha: &str) -> Result<Vec<u8>, DomainError>;
}
