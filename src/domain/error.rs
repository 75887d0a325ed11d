use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Not a git repository: {0}")]
    NotAGitRepository(String),

    #[error("Unknown ref: {0}")]
    UnknownRef(String),

    #[error("Blob read failed: {0}")]
    BlobReadFailed(String),

    #[error("Grammar unavailable: {0}")]
    GrammarUnavailable(String),

    #[error("Parse failed: {0}")]
    ParseFailed(String),

    #[error("Extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("Embedding failed: {0}")]
    EmbeddingFailed(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Repository not indexed: {0}")]
    RepoNotIndexed(String),

    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DomainError {
    pub fn not_a_git_repository(msg: impl Into<String>) -> Self {
        Self::NotAGitRepository(msg.into())
    }

    pub fn unknown_ref(msg: impl Into<String>) -> Self {
        Self::UnknownRef(msg.into())
    }

    pub fn blob_read(msg: impl Into<String>) -> Self {
        Self::BlobReadFailed(msg.into())
    }

    pub fn grammar(msg: impl Into<String>) -> Self {
        Self::GrammarUnavailable(msg.into())
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::ParseFailed(msg.into())
    }

    pub fn extraction(msg: impl Into<String>) -> Self {
        Self::ExtractionFailed(msg.into())
    }

    pub fn embedding(msg: impl Into<String>) -> Self {
        Self::EmbeddingFailed(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::StorageError(msg.into())
    }

    pub fn not_indexed(msg: impl Into<String>) -> Self {
        Self::RepoNotIndexed(msg.into())
    }

    pub fn symbol_not_found(msg: impl Into<String>) -> Self {
        Self::SymbolNotFound(msg.into())
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Errors that abort the whole commit rather than a single file.
    pub fn is_commit_fatal(&self) -> bool {
        matches!(
            self,
            Self::EmbeddingFailed(_) | Self::StorageError(_) | Self::IoError(_)
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::UnknownRef(_) | Self::NotAGitRepository(_) | Self::SymbolNotFound(_)
        )
    }

    pub fn is_not_indexed(&self) -> bool {
        matches!(self, Self::RepoNotIndexed(_))
    }

    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_fatal_classification() {
        assert!(DomainError::embedding("exhausted").is_commit_fatal());
        assert!(DomainError::storage("constraint").is_commit_fatal());
        assert!(!DomainError::parse("bad syntax").is_commit_fatal());
        assert!(!DomainError::grammar("no grammar").is_commit_fatal());
    }

    #[test]
    fn test_not_found_classification() {
        assert!(DomainError::unknown_ref("nope").is_not_found());
        assert!(DomainError::symbol_not_found("helper").is_not_found());
        assert!(!DomainError::invalid_argument("bad").is_not_found());
        assert!(DomainError::invalid_argument("bad").is_invalid_argument());
    }
}
