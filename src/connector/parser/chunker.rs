use std::sync::Arc;

use async_trait::async_trait;
use streaming_iterator::StreamingIterator;
use tracing::debug;
use tree_sitter::{Parser, Query, QueryCursor};

use crate::application::{ChunkResult, CodeParser};
use crate::connector::parser::registry::LanguageRegistry;
use crate::domain::{Chunk, ChunkKind, DomainError, Language};

/// Chunk size bounds from `indexing.chunkSize` configuration.
#[derive(Debug, Clone, Copy)]
pub struct ChunkLimits {
    pub min_chars: usize,
    pub max_chars: usize,
}

impl Default for ChunkLimits {
    fn default() -> Self {
        Self {
            min_chars: 10,
            max_chars: 20_000,
        }
    }
}

/// Tree-sitter based chunker: one chunk per named definition, with a
/// whole-file fallback for unsupported languages and parse failures.
pub struct TreeSitterChunker {
    registry: Arc<LanguageRegistry>,
    limits: ChunkLimits,
}

impl TreeSitterChunker {
    pub fn new(registry: Arc<LanguageRegistry>, limits: ChunkLimits) -> Self {
        Self { registry, limits }
    }

    fn definition_query(language: Language) -> &'static str {
        match language {
            Language::Rust => {
                r#"
                (function_item name: (identifier) @name) @function
                (struct_item name: (type_identifier) @name) @struct
                (enum_item name: (type_identifier) @name) @enum
                (trait_item name: (type_identifier) @name) @trait
                (mod_item name: (identifier) @name) @module
                (const_item name: (identifier) @name) @constant
                (static_item name: (identifier) @name) @constant
                (type_item name: (type_identifier) @name) @type_alias
                "#
            }
            Language::Python => {
                r#"
                (function_definition name: (identifier) @name) @function
                (class_definition name: (identifier) @name) @class
                "#
            }
            Language::JavaScript => {
                r#"
                (function_declaration name: (identifier) @name) @function
                (class_declaration name: (identifier) @name) @class
                (method_definition name: (property_identifier) @name) @method
                (lexical_declaration
                    (variable_declarator
                        name: (identifier) @name
                        value: (arrow_function))) @function
                (lexical_declaration
                    (variable_declarator
                        name: (identifier) @name
                        value: (function_expression))) @function
                "#
            }
            Language::TypeScript => {
                r#"
                (function_declaration name: (identifier) @name) @function
                (class_declaration name: (type_identifier) @name) @class
                (method_definition name: (property_identifier) @name) @method
                (interface_declaration name: (type_identifier) @name) @interface
                (type_alias_declaration name: (type_identifier) @name) @type_alias
                (enum_declaration name: (identifier) @name) @enum
                (lexical_declaration
                    (variable_declarator
                        name: (identifier) @name
                        value: (arrow_function))) @function
                (lexical_declaration
                    (variable_declarator
                        name: (identifier) @name
                        value: (function_expression))) @function
                "#
            }
            Language::Go => {
                r#"
                (function_declaration name: (identifier) @name) @function
                (method_declaration name: (field_identifier) @name) @method
                (type_declaration (type_spec name: (type_identifier) @name)) @struct
                (const_declaration (const_spec name: (identifier) @name)) @constant
                "#
            }
            _ => "",
        }
    }

    fn capture_to_kind(capture_name: &str) -> ChunkKind {
        match capture_name {
            "function" => ChunkKind::Function,
            "class" => ChunkKind::Class,
            "method" => ChunkKind::Method,
            "interface" => ChunkKind::Interface,
            "struct" => ChunkKind::Struct,
            "enum" => ChunkKind::Enum,
            "trait" => ChunkKind::Trait,
            "type_alias" => ChunkKind::TypeAlias,
            "constant" => ChunkKind::Constant,
            "module" => ChunkKind::Module,
            _ => ChunkKind::File,
        }
    }

    fn fallback(&self, path: &str, content: &str, language: Language, error: String) -> ChunkResult {
        let chunk = Chunk::whole_file(path.to_string(), language, content.to_string())
            .truncated(self.limits.max_chars);
        ChunkResult::fallback(chunk, error)
    }

    fn chunk_parsed(
        &self,
        path: &str,
        content: &str,
        language: Language,
        grammar: &tree_sitter::Language,
    ) -> Result<Vec<Chunk>, DomainError> {
        let mut parser = Parser::new();
        parser
            .set_language(grammar)
            .map_err(|e| DomainError::parse(format!("Failed to set language: {}", e)))?;

        let tree = parser
            .parse(content, None)
            .ok_or_else(|| DomainError::parse("Parser returned no tree"))?;

        let query_source = Self::definition_query(language);
        let query = Query::new(grammar, query_source)
            .map_err(|e| DomainError::parse(format!("Failed to compile chunk query: {}", e)))?;

        let capture_names: Vec<&str> = query.capture_names().to_vec();
        let mut cursor = QueryCursor::new();
        let mut matches_iter = cursor.matches(&query, tree.root_node(), content.as_bytes());

        // (start_byte, end_byte) of class-like captures, for method detection.
        let mut chunks: Vec<(Chunk, usize, usize, ChunkKind)> = Vec::new();

        while let Some(query_match) = matches_iter.next() {
            let mut symbol_name: Option<String> = None;
            let mut main_node = None;
            let mut kind = ChunkKind::File;

            for capture in query_match.captures {
                let capture_name = capture_names
                    .get(capture.index as usize)
                    .copied()
                    .unwrap_or("");
                if capture_name == "name" {
                    symbol_name = Some(content[capture.node.byte_range()].to_string());
                } else {
                    main_node = Some(capture.node);
                    kind = Self::capture_to_kind(capture_name);
                }
            }

            let (Some(node), Some(name)) = (main_node, symbol_name) else {
                continue;
            };
            let node_content = content[node.byte_range()].to_string();
            if node_content.trim().len() < self.limits.min_chars {
                continue;
            }

            let chunk = Chunk::new(
                path.to_string(),
                name,
                kind,
                language,
                node.start_position().row as u32 + 1,
                node.end_position().row as u32 + 1,
                node_content,
            )
            .truncated(self.limits.max_chars);
            chunks.push((chunk, node.start_byte(), node.end_byte(), kind));
        }

        // A function nested inside a class-like chunk is a method.
        let class_ranges: Vec<(usize, usize)> = chunks
            .iter()
            .filter(|(_, _, _, kind)| {
                matches!(kind, ChunkKind::Class | ChunkKind::Struct | ChunkKind::Trait)
            })
            .map(|(_, start, end, _)| (*start, *end))
            .collect();

        Ok(chunks
            .into_iter()
            .map(|(chunk, start, end, kind)| {
                if kind == ChunkKind::Function
                    && class_ranges.iter().any(|(cs, ce)| *cs < start && end < *ce)
                {
                    Chunk::new(
                        chunk.file_path().to_string(),
                        chunk.symbol().to_string(),
                        ChunkKind::Method,
                        chunk.language(),
                        chunk.start_line(),
                        chunk.end_line(),
                        chunk.content().to_string(),
                    )
                } else {
                    chunk
                }
            })
            .collect())
    }
}

#[async_trait]
impl CodeParser for TreeSitterChunker {
    async fn chunk_file(&self, path: &str, content: &str) -> Result<ChunkResult, DomainError> {
        let language = self.registry.language_for(path);

        if !language.has_grammar() {
            // Docs, config, and grammarless languages index as one chunk.
            if content.trim().is_empty() {
                return Ok(ChunkResult::ok(Vec::new()));
            }
            let chunk = Chunk::whole_file(path.to_string(), language, content.to_string())
                .truncated(self.limits.max_chars);
            return Ok(ChunkResult::ok(vec![chunk]));
        }

        if let Err(e) = self.registry.ensure_grammar(language).await {
            return Ok(self.fallback(path, content, language, e.to_string()));
        }
        let Some(grammar) = self.registry.loaded_grammar(language).await else {
            return Ok(self.fallback(path, content, language, "grammar not loaded".to_string()));
        };

        match self.chunk_parsed(path, content, language, &grammar) {
            Ok(chunks) if chunks.is_empty() && !content.trim().is_empty() => {
                // Parsed fine but nothing named: keep the file searchable.
                let chunk = Chunk::whole_file(path.to_string(), language, content.to_string())
                    .truncated(self.limits.max_chars);
                Ok(ChunkResult::ok(vec![chunk]))
            }
            Ok(chunks) => {
                debug!("Chunked {} into {} chunks", path, chunks.len());
                Ok(ChunkResult::ok(chunks))
            }
            Err(e) => Ok(self.fallback(path, content, language, e.to_string())),
        }
    }

    fn language_for(&self, path: &str) -> Language {
        self.registry.language_for(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunker() -> TreeSitterChunker {
        TreeSitterChunker::new(LanguageRegistry::new().unwrap(), ChunkLimits::default())
    }

    #[tokio::test]
    async fn test_chunk_rust_definitions() {
        let content = r#"
pub fn hello_world() {
    println!("hello");
}

pub struct Config {
    pub name: String,
}
"#;
        let result = chunker().chunk_file("src/lib.rs", content).await.unwrap();
        assert!(result.success);
        let symbols: Vec<&str> = result.chunks.iter().map(|c| c.symbol()).collect();
        assert!(symbols.contains(&"hello_world"));
        assert!(symbols.contains(&"Config"));
    }

    #[tokio::test]
    async fn test_chunk_typescript_class_methods() {
        let content = r#"
export class Greeter {
    greet(name: string): string {
        return `hello ${name}`;
    }
}

export function helper(name: string) {
    return name.trim();
}
"#;
        let result = chunker().chunk_file("src/greeter.ts", content).await.unwrap();
        let greet = result
            .chunks
            .iter()
            .find(|c| c.symbol() == "greet")
            .expect("method chunk");
        assert_eq!(greet.symbol_type(), ChunkKind::Method);
        let helper = result
            .chunks
            .iter()
            .find(|c| c.symbol() == "helper")
            .expect("function chunk");
        assert_eq!(helper.symbol_type(), ChunkKind::Function);
    }

    #[tokio::test]
    async fn test_whole_file_fallback_for_markdown() {
        let result = chunker()
            .chunk_file("README.md", "# Title\n\nSome prose.\n")
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.chunks.len(), 1);
        assert_eq!(result.chunks[0].symbol_type(), ChunkKind::File);
        assert_eq!(result.chunks[0].start_line(), 1);
    }

    #[tokio::test]
    async fn test_empty_unsupported_file_yields_no_chunks() {
        let result = chunker().chunk_file("empty.txt", "   \n").await.unwrap();
        assert!(result.chunks.is_empty());
    }

    #[tokio::test]
    async fn test_line_numbers_one_based_inclusive() {
        let content = "fn one() {\n    let x = 1;\n}\n";
        let result = chunker().chunk_file("a.rs", content).await.unwrap();
        let chunk = &result.chunks[0];
        assert_eq!(chunk.start_line(), 1);
        assert_eq!(chunk.end_line(), 3);
    }
}
