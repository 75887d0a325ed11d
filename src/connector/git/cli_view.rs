use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::application::GitView;
use crate::domain::{DomainError, RepoIdentity, TreeEntry};

/// Read-only Git access by invoking the `git` binary. Every operation is a
/// plumbing command against a resolved repository path; nothing ever writes
/// to the working tree or refs.
pub struct GitCliView;

impl GitCliView {
    pub fn new() -> Self {
        Self
    }

    async fn run_git(repo_path: &Path, args: &[&str]) -> Result<Vec<u8>, DomainError> {
        let output = Command::new("git")
            .arg("-C")
            .arg(repo_path)
            .args(args)
            .output()
            .await
            .map_err(|e| DomainError::internal(format!("Failed to spawn git: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Self::classify_failure(repo_path, args, stderr.trim()));
        }
        Ok(output.stdout)
    }

    fn classify_failure(repo_path: &Path, args: &[&str], stderr: &str) -> DomainError {
        if stderr.contains("not a git repository") {
            return DomainError::not_a_git_repository(repo_path.display().to_string());
        }
        match args.first().copied() {
            Some("rev-parse") => DomainError::unknown_ref(format!(
                "{} in {}: {}",
                args.last().copied().unwrap_or(""),
                repo_path.display(),
                stderr
            )),
            Some("cat-file") => DomainError::blob_read(format!(
                "{} in {}: {}",
                args.last().copied().unwrap_or(""),
                repo_path.display(),
                stderr
            )),
            _ => DomainError::internal(format!("git {:?} failed: {}", args, stderr)),
        }
    }

    fn parse_ls_tree(stdout: &[u8]) -> Vec<TreeEntry> {
        // -z output: `<mode> <type> <sha>\t<path>\0`
        let text = String::from_utf8_lossy(stdout);
        let mut entries = Vec::new();
        for record in text.split('\0') {
            if record.is_empty() {
                continue;
            }
            let Some((meta, path)) = record.split_once('\t') else {
                continue;
            };
            let mut fields = meta.split_whitespace();
            let (Some(mode), Some(kind), Some(sha)) =
                (fields.next(), fields.next(), fields.next())
            else {
                continue;
            };
            if kind != "blob" {
                continue;
            }
            entries.push(TreeEntry::new(path, sha, mode));
        }
        entries
    }
}

impl Default for GitCliView {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GitView for GitCliView {
    async fn repository_identity(&self, path: &Path) -> Result<RepoIdentity, DomainError> {
        let toplevel = Self::run_git(path, &["rev-parse", "--show-toplevel"]).await?;
        let root = String::from_utf8_lossy(&toplevel).trim().to_string();

        // In a linked worktree the common dir points back at the main
        // repository; its parent is the identity path all worktrees share.
        let common = Self::run_git(path, &["rev-parse", "--path-format=absolute", "--git-common-dir"])
            .await?;
        let common_dir = String::from_utf8_lossy(&common).trim().to_string();
        let identity_path = Path::new(&common_dir)
            .parent()
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_else(|| root.clone());

        debug!("Resolved repository {} (identity {})", root, identity_path);
        Ok(RepoIdentity {
            root,
            identity_path,
        })
    }

    async fn resolve_ref(&self, repo_path: &Path, refname: &str) -> Result<String, DomainError> {
        if refname.is_empty() {
            return Err(DomainError::invalid_argument("Empty ref"));
        }
        // `^{commit}` peels tags; --verify rejects ambiguous output.
        let spec = format!("{}^{{commit}}", refname);
        let stdout = Self::run_git(repo_path, &["rev-parse", "--verify", "--quiet", &spec])
            .await
            .map_err(|e| match e {
                DomainError::NotAGitRepository(_) => e,
                _ => DomainError::unknown_ref(format!("{} in {}", refname, repo_path.display())),
            })?;
        let sha = String::from_utf8_lossy(&stdout).trim().to_string();
        if sha.len() != 40 || !sha.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(DomainError::unknown_ref(format!(
                "{} resolved to unexpected output",
                refname
            )));
        }
        Ok(sha)
    }

    async fn list_files(
        &self,
        repo_path: &Path,
        commit_sha: &str,
    ) -> Result<Vec<TreeEntry>, DomainError> {
        let stdout = Self::run_git(repo_path, &["ls-tree", "-r", "-z", commit_sha]).await?;
        Ok(Self::parse_ls_tree(&stdout))
    }

    async fn read_blob(&self, repo_path: &Path, blob_sha: &str) -> Result<Vec<u8>, DomainError> {
        Self::run_git(repo_path, &["cat-file", "blob", blob_sha]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ls_tree_records() {
        let raw = b"100644 blob aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa\tsrc/main.rs\0\
100755 blob bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb\tscripts/run.sh\0\
160000 commit cccccccccccccccccccccccccccccccccccccccc\tvendor/sub\0";
        let entries = GitCliView::parse_ls_tree(raw);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].path, "src/main.rs");
        assert_eq!(entries[0].mode, "100644");
        assert_eq!(entries[1].path, "scripts/run.sh");
    }

    #[test]
    fn test_parse_ls_tree_path_with_spaces() {
        let raw = b"100644 blob aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa\tdocs/getting started.md\0";
        let entries = GitCliView::parse_ls_tree(raw);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path, "docs/getting started.md");
    }
}
