use streaming_iterator::StreamingIterator;
use tree_sitter::{Node, Query, QueryCursor, Tree};

use crate::domain::{
    DocType, DomainError, ExtractedImport, ExtractedSymbol, ExtractedUsage, FileExtraction,
    ImportBinding, ImportType, Language, SymbolDocstring, SymbolKind, SymbolParameter, UsageType,
};

use super::helpers::{
    collect_scopes, content_hash, doc_description, enclosing_scope, is_noise_name,
    preceding_comment_block, tightest_containing,
};
use super::LanguageExtractor;

const DEFINITION_QUERY: &str = r#"
(function_item name: (identifier) @name) @function
(struct_item name: (type_identifier) @name) @class
(enum_item name: (type_identifier) @name) @enum
(trait_item name: (type_identifier) @name) @trait
(mod_item name: (identifier) @name) @module
(const_item name: (identifier) @name) @constant
(static_item name: (identifier) @name) @constant
(type_item name: (type_identifier) @name) @type_alias
"#;

const SCOPE_QUERY: &str = r#"
(function_item name: (identifier) @name) @function
(impl_item type: (type_identifier) @name) @impl
(trait_item name: (type_identifier) @name) @trait
(mod_item name: (identifier) @name) @module
"#;

const USAGE_QUERY: &str = r#"
(call_expression function: (identifier) @callee) @call
(call_expression
    function: (field_expression field: (field_identifier) @callee)) @call
(call_expression
    function: (scoped_identifier name: (identifier) @callee)) @call
(macro_invocation macro: (identifier) @callee) @other
(struct_expression name: (type_identifier) @callee) @instantiate
(impl_item trait: (type_identifier) @callee) @implement
(let_declaration type: (type_identifier) @callee) @type_ref
(parameter type: (type_identifier) @callee) @type_ref
"#;

pub struct RustExtractor;

impl RustExtractor {
    pub fn new() -> Self {
        Self
    }

    fn visibility_of(node: Node, content: &str) -> Option<String> {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.kind() == "visibility_modifier" {
                return Some(content[child.byte_range()].to_string());
            }
        }
        None
    }

    fn is_async_fn(node: Node, content: &str) -> bool {
        node.child_by_field_name("name")
            .map(|name| content[node.start_byte()..name.start_byte()].contains("async"))
            .unwrap_or(false)
    }

    fn parameters_of(node: Node, content: &str) -> (Vec<SymbolParameter>, bool) {
        let mut params = Vec::new();
        let mut has_self = false;
        let Some(list) = node.child_by_field_name("parameters") else {
            return (params, has_self);
        };
        let mut cursor = list.walk();
        let mut position = 0u32;
        for child in list.children(&mut cursor) {
            match child.kind() {
                "self_parameter" => has_self = true,
                "parameter" => {
                    let name = child
                        .child_by_field_name("pattern")
                        .map(|p| content[p.byte_range()].to_string())
                        .unwrap_or_default();
                    let type_annotation = child
                        .child_by_field_name("type")
                        .map(|t| content[t.byte_range()].to_string());
                    params.push(SymbolParameter {
                        position,
                        name,
                        type_annotation,
                        is_optional: false,
                    });
                    position += 1;
                }
                _ => {}
            }
        }
        (params, has_self)
    }

    fn docstring_of(node: Node, content: &str) -> Option<SymbolDocstring> {
        let raw = preceding_comment_block(node, content)?;
        if !raw.contains("///") && !raw.contains("/**") && !raw.contains("//!") {
            return None;
        }
        Some(SymbolDocstring {
            doc_type: DocType::Rustdoc,
            description: doc_description(&raw),
            raw_text: raw,
        })
    }

    /// Parse a `use` declaration's argument into (specifier, bindings).
    /// `a::b::{c, d as e}` → ("a::b", [c, d→e]); `a::b` → ("a::b", [b]).
    fn parse_use_argument(text: &str) -> (String, Vec<ImportBinding>) {
        let text = text.trim();
        if let Some(open) = text.find('{') {
            let prefix = text[..open].trim_end_matches("::").trim().to_string();
            let inner = text[open + 1..text.rfind('}').unwrap_or(text.len())].trim();
            let bindings = inner
                .split(',')
                .map(|part| part.trim())
                .filter(|part| !part.is_empty() && *part != "self")
                .map(|part| match part.split_once(" as ") {
                    Some((imported, local)) => {
                        ImportBinding::aliased(imported.trim(), local.trim())
                    }
                    None => ImportBinding::plain(part),
                })
                .collect();
            (prefix, bindings)
        } else if let Some((path, local)) = text.split_once(" as ") {
            let imported = path.rsplit("::").next().unwrap_or(path).trim();
            (
                path.trim().to_string(),
                vec![ImportBinding::aliased(imported, local.trim())],
            )
        } else if let Some(stripped) = text.strip_suffix("::*") {
            (stripped.to_string(), Vec::new())
        } else {
            let imported = text.rsplit("::").next().unwrap_or(text);
            (text.to_string(), vec![ImportBinding::plain(imported)])
        }
    }
}

impl Default for RustExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageExtractor for RustExtractor {
    fn language(&self) -> Language {
        Language::Rust
    }

    fn extract(
        &self,
        path: &str,
        content: &str,
        tree: &Tree,
        grammar: &tree_sitter::Language,
    ) -> Result<FileExtraction, DomainError> {
        let scope_query = Query::new(grammar, SCOPE_QUERY)
            .map_err(|e| DomainError::extraction(format!("scope query: {}", e)))?;
        let scopes = collect_scopes(tree, content, &scope_query);

        let mut extraction = FileExtraction::empty();

        // ── Symbols ──────────────────────────────────────────────────────
        let def_query = Query::new(grammar, DEFINITION_QUERY)
            .map_err(|e| DomainError::extraction(format!("definition query: {}", e)))?;
        let capture_names: Vec<&str> = def_query.capture_names().to_vec();
        let mut cursor = QueryCursor::new();
        let mut matches_iter = cursor.matches(&def_query, tree.root_node(), content.as_bytes());

        while let Some(query_match) = matches_iter.next() {
            let mut name: Option<String> = None;
            let mut main_node: Option<Node> = None;
            let mut kind = SymbolKind::Function;
            for capture in query_match.captures {
                let capture_name = capture_names
                    .get(capture.index as usize)
                    .copied()
                    .unwrap_or("");
                match capture_name {
                    "name" => name = Some(content[capture.node.byte_range()].to_string()),
                    other => {
                        main_node = Some(capture.node);
                        kind = match other {
                            "class" => SymbolKind::Class,
                            "enum" => SymbolKind::Enum,
                            "trait" => SymbolKind::Trait,
                            "module" => SymbolKind::Module,
                            "constant" => SymbolKind::Constant,
                            "type_alias" => SymbolKind::TypeAlias,
                            _ => SymbolKind::Function,
                        };
                    }
                }
            }
            let (Some(node), Some(name)) = (main_node, name) else {
                continue;
            };

            let parent = tightest_containing(&scopes, node.start_byte(), node.end_byte());
            let mut kind = kind;
            if kind == SymbolKind::Function {
                if let Some(scope) = parent {
                    if scope.kind == "impl" || scope.kind == "trait" {
                        kind = SymbolKind::Method;
                    }
                }
            }

            let qualified_name = match parent {
                Some(scope) => format!("{}.{}", scope.qualified, name),
                None => name.clone(),
            };
            let visibility = Self::visibility_of(node, content);
            let (parameters, has_self) = Self::parameters_of(node, content);

            let mut symbol = ExtractedSymbol::new(
                name,
                qualified_name,
                kind,
                path,
                node.start_position().row as u32 + 1,
                node.end_position().row as u32 + 1,
            );
            symbol.is_exported = visibility
                .as_deref()
                .map(|v| v.starts_with("pub"))
                .unwrap_or(false);
            symbol.visibility = visibility;
            symbol.is_async = Self::is_async_fn(node, content);
            symbol.is_static = kind == SymbolKind::Method && !has_self;
            symbol.return_type = node
                .child_by_field_name("return_type")
                .map(|t| content[t.byte_range()].to_string());
            symbol.parent_qualified_name = parent.map(|s| s.qualified.clone());
            symbol.content_hash = content_hash(&content[node.byte_range()]);
            symbol.parameters = parameters;
            symbol.docstring = Self::docstring_of(node, content);
            extraction.symbols.push(symbol);
        }

        // ── Usages ───────────────────────────────────────────────────────
        let usage_query = Query::new(grammar, USAGE_QUERY)
            .map_err(|e| DomainError::extraction(format!("usage query: {}", e)))?;
        let usage_captures: Vec<&str> = usage_query.capture_names().to_vec();
        let mut cursor = QueryCursor::new();
        let mut matches_iter = cursor.matches(&usage_query, tree.root_node(), content.as_bytes());

        while let Some(query_match) = matches_iter.next() {
            let mut callee: Option<Node> = None;
            let mut usage_type = UsageType::Other;
            for capture in query_match.captures {
                let capture_name = usage_captures
                    .get(capture.index as usize)
                    .copied()
                    .unwrap_or("");
                match capture_name {
                    "callee" => callee = Some(capture.node),
                    other => usage_type = UsageType::parse(other),
                }
            }
            let Some(node) = callee else { continue };
            let name = content[node.byte_range()].to_string();
            if is_noise_name(&name) {
                continue;
            }
            let line = node.start_position().row as u32 + 1;
            let mut usage = ExtractedUsage::new(
                name,
                path,
                line,
                node.start_position().column as u32 + 1,
                usage_type,
            );
            if let Some(scope) = enclosing_scope(&scopes, line) {
                usage = usage.with_enclosing_hint(scope.qualified.clone());
            }
            extraction.usages.push(usage);
        }

        // ── Imports ──────────────────────────────────────────────────────
        let import_query = Query::new(grammar, "(use_declaration argument: (_) @arg) @use")
            .map_err(|e| DomainError::extraction(format!("import query: {}", e)))?;
        let import_captures: Vec<&str> = import_query.capture_names().to_vec();
        let mut cursor = QueryCursor::new();
        let mut matches_iter = cursor.matches(&import_query, tree.root_node(), content.as_bytes());

        while let Some(query_match) = matches_iter.next() {
            let mut arg: Option<Node> = None;
            let mut line = 0u32;
            for capture in query_match.captures {
                let capture_name = import_captures
                    .get(capture.index as usize)
                    .copied()
                    .unwrap_or("");
                if capture_name == "arg" {
                    arg = Some(capture.node);
                } else {
                    line = capture.node.start_position().row as u32 + 1;
                }
            }
            let Some(node) = arg else { continue };
            let (specifier, bindings) =
                Self::parse_use_argument(&content[node.byte_range()]);
            if specifier.is_empty() {
                continue;
            }
            extraction.imports.push(
                ExtractedImport::new(path, line, ImportType::Rust, specifier)
                    .with_bindings(bindings),
            );
        }

        Ok(extraction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tree_sitter::Parser;

    fn extract(content: &str) -> FileExtraction {
        let grammar: tree_sitter::Language = tree_sitter_rust::LANGUAGE.into();
        let mut parser = Parser::new();
        parser.set_language(&grammar).unwrap();
        let tree = parser.parse(content, None).unwrap();
        RustExtractor::new()
            .extract("src/lib.rs", content, &tree, &grammar)
            .unwrap()
    }

    #[test]
    fn test_extracts_function_with_docs_and_params() {
        let extraction = extract(
            r#"
/// Adds two numbers.
pub fn add(a: i32, b: i32) -> i32 {
    a + b
}
"#,
        );
        let symbol = &extraction.symbols[0];
        assert_eq!(symbol.name, "add");
        assert_eq!(symbol.kind, SymbolKind::Function);
        assert!(symbol.is_exported);
        assert_eq!(symbol.visibility.as_deref(), Some("pub"));
        assert_eq!(symbol.return_type.as_deref(), Some("i32"));
        assert_eq!(symbol.parameters.len(), 2);
        assert_eq!(symbol.parameters[0].name, "a");
        let doc = symbol.docstring.as_ref().expect("rustdoc");
        assert_eq!(doc.doc_type, DocType::Rustdoc);
        assert_eq!(doc.description.as_deref(), Some("Adds two numbers."));
    }

    #[test]
    fn test_methods_get_impl_qualified_names() {
        let extraction = extract(
            r#"
struct Engine;

impl Engine {
    pub fn start(&self) -> bool {
        true
    }

    fn build() -> Self {
        Engine
    }
}
"#,
        );
        let start = extraction
            .symbols
            .iter()
            .find(|s| s.name == "start")
            .unwrap();
        assert_eq!(start.kind, SymbolKind::Method);
        assert_eq!(start.qualified_name, "Engine.start");
        assert!(!start.is_static);
        let build = extraction
            .symbols
            .iter()
            .find(|s| s.name == "build")
            .unwrap();
        assert!(build.is_static);
    }

    #[test]
    fn test_usages_with_enclosing_hint() {
        let extraction = extract(
            r#"
fn caller() {
    helper();
}
"#,
        );
        let usage = extraction
            .usages
            .iter()
            .find(|u| u.symbol_name == "helper")
            .unwrap();
        assert_eq!(usage.usage_type, UsageType::Call);
        assert_eq!(usage.enclosing_hint.as_deref(), Some("caller"));
    }

    #[test]
    fn test_use_declarations_become_imports() {
        let extraction = extract(
            r#"
use std::collections::{HashMap, HashSet};
use serde::Serialize as Ser;
"#,
        );
        assert_eq!(extraction.imports.len(), 2);
        let grouped = &extraction.imports[0];
        assert_eq!(grouped.module_specifier, "std::collections");
        assert_eq!(grouped.bindings.len(), 2);
        let aliased = &extraction.imports[1];
        assert_eq!(aliased.bindings[0].imported_name, "Serialize");
        assert_eq!(aliased.bindings[0].local_name, "Ser");
        assert_eq!(aliased.import_type, ImportType::Rust);
    }

    #[test]
    fn test_struct_instantiation_usage() {
        let extraction = extract(
            r#"
fn build() -> Config {
    Config { name: String::new() }
}
"#,
        );
        assert!(extraction
            .usages
            .iter()
            .any(|u| u.symbol_name == "Config" && u.usage_type == UsageType::Instantiate));
    }
}
