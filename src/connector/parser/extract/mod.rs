mod go;
mod helpers;
mod javascript;
mod python;
mod rust;
mod typescript;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;
use tree_sitter::{Parser, Tree};

use crate::application::SymbolExtraction;
use crate::connector::parser::registry::LanguageRegistry;
use crate::domain::{DomainError, FileExtraction, Language};

pub use go::GoExtractor;
pub use javascript::JavaScriptExtractor;
pub use python::PythonExtractor;
pub use rust::RustExtractor;
pub use typescript::TypeScriptExtractor;

/// One extractor per language: a single tree traversal emitting symbols,
/// usages, and imports.
pub trait LanguageExtractor: Send + Sync {
    fn language(&self) -> Language;

    fn extract(
        &self,
        path: &str,
        content: &str,
        tree: &Tree,
        grammar: &tree_sitter::Language,
    ) -> Result<FileExtraction, DomainError>;
}

/// Registry of language extractors (C4). `tsx` files reuse the TypeScript
/// extractor through path→language resolution.
pub struct ExtractorRegistry {
    registry: Arc<LanguageRegistry>,
    extractors: HashMap<Language, Arc<dyn LanguageExtractor>>,
}

impl ExtractorRegistry {
    pub fn new(registry: Arc<LanguageRegistry>) -> Self {
        let mut extractors: HashMap<Language, Arc<dyn LanguageExtractor>> = HashMap::new();
        for extractor in [
            Arc::new(RustExtractor::new()) as Arc<dyn LanguageExtractor>,
            Arc::new(PythonExtractor::new()),
            Arc::new(JavaScriptExtractor::new()),
            Arc::new(TypeScriptExtractor::new()),
            Arc::new(GoExtractor::new()),
        ] {
            extractors.insert(extractor.language(), extractor);
        }
        Self {
            registry,
            extractors,
        }
    }
}

#[async_trait]
impl SymbolExtraction for ExtractorRegistry {
    async fn extract(&self, path: &str, content: &str) -> FileExtraction {
        let language = self.registry.language_for(path);
        let Some(extractor) = self.extractors.get(&language) else {
            return FileExtraction::empty();
        };

        if let Err(e) = self.registry.ensure_grammar(language).await {
            return FileExtraction::failed(e.to_string());
        }
        let Some(grammar) = self.registry.loaded_grammar(language).await else {
            return FileExtraction::failed(format!("grammar for {} not loaded", language));
        };

        let mut parser = Parser::new();
        if let Err(e) = parser.set_language(&grammar) {
            return FileExtraction::failed(format!("failed to set language: {}", e));
        }
        let Some(tree) = parser.parse(content, None) else {
            return FileExtraction::failed("parser returned no tree");
        };

        match extractor.extract(path, content, &tree, &grammar) {
            Ok(extraction) => {
                debug!(
                    "Extracted {} symbols, {} usages, {} imports from {}",
                    extraction.symbols.len(),
                    extraction.usages.len(),
                    extraction.imports.len(),
                    path
                );
                extraction
            }
            Err(e) => FileExtraction::failed(e.to_string()),
        }
    }

    fn supports(&self, language: Language) -> bool {
        self.extractors.contains_key(&language)
    }
}
