use streaming_iterator::StreamingIterator;
use tree_sitter::{Node, Query, QueryCursor, Tree};

use crate::domain::{
    DocType, DomainError, ExtractedImport, ExtractedSymbol, ExtractedUsage, FileExtraction,
    ImportBinding, ImportType, Language, SymbolDocstring, SymbolKind, SymbolParameter, UsageType,
};

use super::helpers::{
    collect_scopes, content_hash, doc_description, enclosing_scope, is_noise_name,
    preceding_comment_block,
};
use super::LanguageExtractor;

const SCOPE_QUERY: &str = r#"
(function_declaration name: (identifier) @name) @function
(method_declaration name: (field_identifier) @name) @method
"#;

const USAGE_QUERY: &str = r#"
(call_expression function: (identifier) @callee) @call
(call_expression
    function: (selector_expression field: (field_identifier) @callee)) @call
(composite_literal type: (type_identifier) @callee) @instantiate
(parameter_declaration type: (type_identifier) @callee) @type_ref
"#;

pub struct GoExtractor;

impl GoExtractor {
    pub fn new() -> Self {
        Self
    }

    fn is_exported(name: &str) -> bool {
        name.chars().next().map(|c| c.is_uppercase()).unwrap_or(false)
    }

    fn receiver_type(node: Node, content: &str) -> Option<String> {
        let receiver = node.child_by_field_name("receiver")?;
        let text = content[receiver.byte_range()]
            .trim_start_matches('(')
            .trim_end_matches(')')
            .trim()
            .to_string();
        let type_part = text.split_whitespace().last()?.trim_start_matches('*');
        Some(type_part.to_string())
    }

    fn parameters_of(node: Node, content: &str) -> Vec<SymbolParameter> {
        let mut params = Vec::new();
        let Some(list) = node.child_by_field_name("parameters") else {
            return params;
        };
        let mut cursor = list.walk();
        let mut position = 0u32;
        for child in list.named_children(&mut cursor) {
            if child.kind() != "parameter_declaration" {
                continue;
            }
            let type_annotation = child
                .child_by_field_name("type")
                .map(|t| content[t.byte_range()].to_string());
            let mut inner = child.walk();
            let names: Vec<String> = child
                .named_children(&mut inner)
                .filter(|n| n.kind() == "identifier")
                .map(|n| content[n.byte_range()].to_string())
                .collect();
            if names.is_empty() {
                // Unnamed parameter: record the type position anyway.
                params.push(SymbolParameter {
                    position,
                    name: format!("arg{}", position),
                    type_annotation: type_annotation.clone(),
                    is_optional: false,
                });
                position += 1;
            }
            for name in names {
                params.push(SymbolParameter {
                    position,
                    name,
                    type_annotation: type_annotation.clone(),
                    is_optional: false,
                });
                position += 1;
            }
        }
        params
    }

    fn godoc_of(node: Node, content: &str) -> Option<SymbolDocstring> {
        let raw = preceding_comment_block(node, content)?;
        Some(SymbolDocstring {
            doc_type: DocType::Godoc,
            description: doc_description(&raw),
            raw_text: raw,
        })
    }

    fn type_spec_kind(spec: Node) -> SymbolKind {
        match spec.child_by_field_name("type").map(|t| t.kind()) {
            Some("struct_type") => SymbolKind::Class,
            Some("interface_type") => SymbolKind::Interface,
            _ => SymbolKind::TypeAlias,
        }
    }
}

impl Default for GoExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageExtractor for GoExtractor {
    fn language(&self) -> Language {
        Language::Go
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
        let root = tree.root_node();

        // ── Symbols: walk top-level declarations ─────────────────────────
        let mut cursor = root.walk();
        for node in root.children(&mut cursor) {
            match node.kind() {
                "function_declaration" | "method_declaration" => {
                    let Some(name_node) = node.child_by_field_name("name") else {
                        continue;
                    };
                    let name = content[name_node.byte_range()].to_string();
                    let receiver = Self::receiver_type(node, content);
                    let kind = if receiver.is_some() {
                        SymbolKind::Method
                    } else {
                        SymbolKind::Function
                    };
                    let qualified_name = match &receiver {
                        Some(recv) => format!("{}.{}", recv, name),
                        None => name.clone(),
                    };
                    let mut symbol = ExtractedSymbol::new(
                        name.clone(),
                        qualified_name,
                        kind,
                        path,
                        node.start_position().row as u32 + 1,
                        node.end_position().row as u32 + 1,
                    );
                    symbol.is_exported = Self::is_exported(&name);
                    symbol.return_type = node
                        .child_by_field_name("result")
                        .map(|t| content[t.byte_range()].to_string());
                    symbol.parent_qualified_name = receiver;
                    symbol.content_hash = content_hash(&content[node.byte_range()]);
                    symbol.parameters = Self::parameters_of(node, content);
                    symbol.docstring = Self::godoc_of(node, content);
                    extraction.symbols.push(symbol);
                }
                "type_declaration" => {
                    let mut inner = node.walk();
                    for spec in node.named_children(&mut inner) {
                        if spec.kind() != "type_spec" {
                            continue;
                        }
                        let Some(name_node) = spec.child_by_field_name("name") else {
                            continue;
                        };
                        let name = content[name_node.byte_range()].to_string();
                        let mut symbol = ExtractedSymbol::new(
                            name.clone(),
                            name.clone(),
                            Self::type_spec_kind(spec),
                            path,
                            node.start_position().row as u32 + 1,
                            node.end_position().row as u32 + 1,
                        );
                        symbol.is_exported = Self::is_exported(&name);
                        symbol.content_hash = content_hash(&content[node.byte_range()]);
                        symbol.docstring = Self::godoc_of(node, content);
                        extraction.symbols.push(symbol);
                    }
                }
                "const_declaration" | "var_declaration" => {
                    let kind = if node.kind() == "const_declaration" {
                        SymbolKind::Constant
                    } else {
                        SymbolKind::Variable
                    };
                    let mut inner = node.walk();
                    for spec in node.named_children(&mut inner) {
                        let Some(name_node) = spec.child_by_field_name("name") else {
                            continue;
                        };
                        let name = content[name_node.byte_range()].to_string();
                        let mut symbol = ExtractedSymbol::new(
                            name.clone(),
                            name.clone(),
                            kind,
                            path,
                            spec.start_position().row as u32 + 1,
                            spec.end_position().row as u32 + 1,
                        );
                        symbol.is_exported = Self::is_exported(&name);
                        symbol.content_hash = content_hash(&content[spec.byte_range()]);
                        extraction.symbols.push(symbol);
                    }
                }
                _ => {}
            }
        }

        // ── Usages ───────────────────────────────────────────────────────
        let usage_query = Query::new(grammar, USAGE_QUERY)
            .map_err(|e| DomainError::extraction(format!("usage query: {}", e)))?;
        let usage_captures: Vec<&str> = usage_query.capture_names().to_vec();
        let mut query_cursor = QueryCursor::new();
        let mut matches_iter =
            query_cursor.matches(&usage_query, tree.root_node(), content.as_bytes());

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
        let mut cursor = root.walk();
        for node in root.children(&mut cursor) {
            if node.kind() != "import_declaration" {
                continue;
            }
            let mut specs = Vec::new();
            let mut inner = node.walk();
            for child in node.named_children(&mut inner) {
                match child.kind() {
                    "import_spec" => specs.push(child),
                    "import_spec_list" => {
                        let mut list_cursor = child.walk();
                        specs.extend(
                            child
                                .named_children(&mut list_cursor)
                                .filter(|n| n.kind() == "import_spec"),
                        );
                    }
                    _ => {}
                }
            }
            for spec in specs {
                let Some(path_node) = spec.child_by_field_name("path") else {
                    continue;
                };
                let specifier = content[path_node.byte_range()]
                    .trim_matches('"')
                    .to_string();
                let local = spec
                    .child_by_field_name("name")
                    .map(|n| content[n.byte_range()].to_string())
                    .unwrap_or_else(|| {
                        specifier.rsplit('/').next().unwrap_or(&specifier).to_string()
                    });
                extraction.imports.push(
                    ExtractedImport::new(
                        path,
                        spec.start_position().row as u32 + 1,
                        ImportType::Go,
                        specifier,
                    )
                    .with_bindings(vec![ImportBinding::aliased(local.clone(), local)]),
                );
            }
        }

        Ok(extraction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tree_sitter::Parser;

    fn extract(content: &str) -> FileExtraction {
        let grammar: tree_sitter::Language = tree_sitter_go::LANGUAGE.into();
        let mut parser = Parser::new();
        parser.set_language(&grammar).unwrap();
        let tree = parser.parse(content, None).unwrap();
        GoExtractor::new()
            .extract("pkg/server/server.go", content, &tree, &grammar)
            .unwrap()
    }

    #[test]
    fn test_function_and_method_symbols() {
        let extraction = extract(
            r#"
package server

// NewServer builds a Server.
func NewServer(addr string) *Server {
    return &Server{addr: addr}
}

func (s *Server) Start() error {
    return nil
}

func helper() {}
"#,
        );
        let new_server = extraction
            .symbols
            .iter()
            .find(|s| s.name == "NewServer")
            .unwrap();
        assert!(new_server.is_exported);
        assert_eq!(new_server.kind, SymbolKind::Function);
        assert_eq!(
            new_server.docstring.as_ref().unwrap().doc_type,
            DocType::Godoc
        );

        let start = extraction
            .symbols
            .iter()
            .find(|s| s.name == "Start")
            .unwrap();
        assert_eq!(start.kind, SymbolKind::Method);
        assert_eq!(start.qualified_name, "Server.Start");

        let helper = extraction
            .symbols
            .iter()
            .find(|s| s.name == "helper")
            .unwrap();
        assert!(!helper.is_exported);
    }

    #[test]
    fn test_struct_and_interface_kinds() {
        let extraction = extract(
            r#"
package server

type Server struct {
    addr string
}

type Handler interface {
    Handle() error
}
"#,
        );
        let server = extraction
            .symbols
            .iter()
            .find(|s| s.name == "Server")
            .unwrap();
        assert_eq!(server.kind, SymbolKind::Class);
        let handler = extraction
            .symbols
            .iter()
            .find(|s| s.name == "Handler")
            .unwrap();
        assert_eq!(handler.kind, SymbolKind::Interface);
    }

    #[test]
    fn test_imports_with_alias() {
        let extraction = extract(
            r#"
package server

import (
    "fmt"
    nethttp "net/http"
)
"#,
        );
        assert_eq!(extraction.imports.len(), 2);
        assert_eq!(extraction.imports[0].module_specifier, "fmt");
        assert_eq!(extraction.imports[1].module_specifier, "net/http");
        assert_eq!(extraction.imports[1].bindings[0].local_name, "nethttp");
        assert_eq!(extraction.imports[1].import_type, ImportType::Go);
    }

    #[test]
    fn test_call_usages() {
        let extraction = extract(
            r#"
package server

func run() {
    srv := NewServer("addr")
    srv.Start()
}
"#,
        );
        assert!(extraction
            .usages
            .iter()
            .any(|u| u.symbol_name == "NewServer" && u.usage_type == UsageType::Call));
        assert!(extraction
            .usages
            .iter()
            .any(|u| u.symbol_name == "Start" && u.usage_type == UsageType::Call));
    }
}
