use std::path::Path;
use std::sync::Arc;

use crate::application::{GitView, MetadataStore};
use crate::domain::{DomainError, IndexedCommit, Repository};

/// The (repository, indexed commit) pair every query runs against.
#[derive(Debug, Clone)]
pub struct CommitScope {
    pub repo: Repository,
    pub commit: IndexedCommit,
}

impl CommitScope {
    pub fn commit_id(&self) -> i64 {
        self.commit.id()
    }

    pub fn repo_name(&self) -> &str {
        self.repo.name()
    }
}

/// Which repositories a query targets.
#[derive(Debug, Clone)]
pub enum RepoSelection {
    /// A single repository by filesystem path (the CLI default: cwd).
    Path(String),
    /// Repositories by name or path (`--repos`, or a group's members).
    Named(Vec<String>),
    /// Every indexed repository.
    All,
}

/// Resolves a repo selection plus a commit ref into concrete scopes. The ref
/// is resolved through the Git view before any index read, so `HEAD` always
/// means the repository's current head.
pub struct ScopeResolver {
    git: Arc<dyn GitView>,
    metadata: Arc<dyn MetadataStore>,
}

impl ScopeResolver {
    pub fn new(git: Arc<dyn GitView>, metadata: Arc<dyn MetadataStore>) -> Self {
        Self { git, metadata }
    }

    pub async fn resolve(
        &self,
        selection: &RepoSelection,
        commit_ref: &str,
    ) -> Result<Vec<CommitScope>, DomainError> {
        let repos = match selection {
            RepoSelection::Path(path) => {
                let identity = self.git.repository_identity(Path::new(path)).await?;
                let repo = self
                    .metadata
                    .find_repository_by_path(&identity.identity_path)
                    .await?
                    .ok_or_else(|| {
                        DomainError::not_indexed(format!(
                            "{} has not been indexed yet",
                            identity.identity_path
                        ))
                    })?;
                vec![repo]
            }
            RepoSelection::Named(names) => {
                let mut repos = Vec::new();
                for name in names {
                    repos.push(self.resolve_named(name).await?);
                }
                repos
            }
            RepoSelection::All => {
                let repos = self.metadata.list_repositories().await?;
                if repos.is_empty() {
                    return Err(DomainError::not_indexed(
                        "No repositories have been indexed",
                    ));
                }
                repos
            }
        };

        let mut scopes = Vec::with_capacity(repos.len());
        for repo in repos {
            let sha = self
                .git
                .resolve_ref(Path::new(repo.path()), commit_ref)
                .await?;
            let commit = self
                .metadata
                .find_commit(repo.id(), &sha)
                .await?
                .filter(|c| c.status().is_complete())
                .ok_or_else(|| {
                    DomainError::not_indexed(format!(
                        "Commit {} of {} is not indexed",
                        &sha[..12.min(sha.len())],
                        repo.name()
                    ))
                })?;
            scopes.push(CommitScope { repo, commit });
        }
        Ok(scopes)
    }

    /// A `--repos` entry may be a path or a repository name. Names must be
    /// unambiguous.
    async fn resolve_named(&self, name: &str) -> Result<Repository, DomainError> {
        if name.contains('/') || name.starts_with('.') {
            let identity = self.git.repository_identity(Path::new(name)).await?;
            return self
                .metadata
                .find_repository_by_path(&identity.identity_path)
                .await?
                .ok_or_else(|| {
                    DomainError::not_indexed(format!("{} has not been indexed yet", name))
                });
        }
        let matches = self.metadata.find_repository_by_name(name).await?;
        match matches.len() {
            0 => Err(DomainError::not_indexed(format!(
                "No indexed repository named '{}'",
                name
            ))),
            1 => Ok(matches.into_iter().next().unwrap()),
            n => Err(DomainError::invalid_argument(format!(
                "Repository name '{}' is ambiguous ({} matches); use a path",
                name, n
            ))),
        }
    }
}

/// Commit IDs for a resolved scope list.
pub fn commit_ids(scopes: &[CommitScope]) -> Vec<i64> {
    scopes.iter().map(|s| s.commit_id()).collect()
}

/// The scope owning a commit ID, for stamping results with a repo name.
pub fn scope_for_commit(scopes: &[CommitScope], commit_id: i64) -> Option<&CommitScope> {
    scopes.iter().find(|s| s.commit_id() == commit_id)
}
