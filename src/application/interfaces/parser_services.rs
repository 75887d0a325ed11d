use async_trait::async_trait;

use crate::domain::{Chunk, DomainError, ExtractedEndpoint, FileExtraction, Language};

/// Result of chunking one file. `success = false` means the parse failed and
/// the chunks are the whole-file fallback.
#[derive(Debug, Clone)]
pub struct ChunkResult {
    pub chunks: Vec<Chunk>,
    pub success: bool,
    pub error: Option<String>,
}

impl ChunkResult {
    pub fn ok(chunks: Vec<Chunk>) -> Self {
        Self {
            chunks,
            success: true,
            error: None,
        }
    }

    pub fn fallback(chunk: Chunk, error: impl Into<String>) -> Self {
        Self {
            chunks: vec![chunk],
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Splits a source text into named chunks (C3).
#[async_trait]
pub trait CodeParser: Send + Sync {
    async fn chunk_file(&self, path: &str, content: &str) -> Result<ChunkResult, DomainError>;

    fn language_for(&self, path: &str) -> Language;
}

/// Walks a parse tree and emits symbols, usages, and imports (C4).
#[async_trait]
pub trait SymbolExtraction: Send + Sync {
    /// Never fails the commit: extractor errors come back inside
    /// [`FileExtraction::error`].
    async fn extract(&self, path: &str, content: &str) -> FileExtraction;

    fn supports(&self, language: Language) -> bool;
}

/// Recognises framework route declarations and MCP tools (C5).
#[async_trait]
pub trait EndpointDetection: Send + Sync {
    /// `import_specifiers` are the file's module specifiers, used for
    /// import-pattern framework detection.
    async fn detect(
        &self,
        path: &str,
        content: &str,
        import_specifiers: &[String],
    ) -> Vec<ExtractedEndpoint>;
}
