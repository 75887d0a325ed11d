use streaming_iterator::StreamingIterator;
use tree_sitter::{Node, Query, QueryCursor, Tree};

use crate::domain::{
    DocType, DomainError, ExtractedImport, ExtractedSymbol, ExtractedUsage, FileExtraction,
    ImportBinding, ImportType, Language, SymbolDocstring, SymbolKind, SymbolParameter, UsageType,
};

use super::helpers::{
    collect_scopes, content_hash, enclosing_scope, is_noise_name, tightest_containing,
};
use super::LanguageExtractor;

const SCOPE_QUERY: &str = r#"
(function_definition name: (identifier) @name) @function
(class_definition name: (identifier) @name) @class
"#;

const USAGE_QUERY: &str = r#"
(call function: (identifier) @callee) @call
(call function: (attribute attribute: (identifier) @callee)) @call
(decorator (identifier) @callee) @decorator
(decorator (call function: (identifier) @callee)) @decorator
(type (identifier) @callee) @type_ref
(class_definition
    superclasses: (argument_list (identifier) @callee)) @extend
"#;

pub struct PythonExtractor;

impl PythonExtractor {
    pub fn new() -> Self {
        Self
    }

    fn parameters_of(node: Node, content: &str) -> Vec<SymbolParameter> {
        let mut params = Vec::new();
        let Some(list) = node.child_by_field_name("parameters") else {
            return params;
        };
        let mut cursor = list.walk();
        let mut position = 0u32;
        for child in list.children(&mut cursor) {
            let (name, type_annotation, is_optional) = match child.kind() {
                "identifier" => (content[child.byte_range()].to_string(), None, false),
                "typed_parameter" => {
                    let name = child
                        .named_child(0)
                        .map(|n| content[n.byte_range()].to_string())
                        .unwrap_or_default();
                    let annotation = child
                        .child_by_field_name("type")
                        .map(|t| content[t.byte_range()].to_string());
                    (name, annotation, false)
                }
                "default_parameter" | "typed_default_parameter" => {
                    let name = child
                        .child_by_field_name("name")
                        .map(|n| content[n.byte_range()].to_string())
                        .unwrap_or_default();
                    let annotation = child
                        .child_by_field_name("type")
                        .map(|t| content[t.byte_range()].to_string());
                    (name, annotation, true)
                }
                _ => continue,
            };
            if name.is_empty() || name == "self" || name == "cls" {
                continue;
            }
            params.push(SymbolParameter {
                position,
                name,
                type_annotation,
                is_optional,
            });
            position += 1;
        }
        params
    }

    /// Python docstrings follow the definition: the first statement of the
    /// body when it is a bare string.
    fn docstring_of(node: Node, content: &str) -> Option<SymbolDocstring> {
        let body = node.child_by_field_name("body")?;
        let first = body.named_child(0)?;
        if first.kind() != "expression_statement" {
            return None;
        }
        let string_node = first.named_child(0)?;
        if string_node.kind() != "string" {
            return None;
        }
        let raw = content[string_node.byte_range()].to_string();
        let description = raw
            .trim_matches(|c| c == '"' || c == '\'')
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .map(str::to_string);
        Some(SymbolDocstring {
            doc_type: DocType::Pydoc,
            raw_text: raw,
            description,
        })
    }

    fn is_decorated_static(node: Node, content: &str) -> bool {
        let Some(parent) = node.parent() else {
            return false;
        };
        if parent.kind() != "decorated_definition" {
            return false;
        }
        let text = &content[parent.start_byte()..node.start_byte()];
        text.contains("@staticmethod") || text.contains("@classmethod")
    }
}

impl Default for PythonExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageExtractor for PythonExtractor {
    fn language(&self) -> Language {
        Language::Python
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
        let capture_names: Vec<&str> = scope_query.capture_names().to_vec();
        let mut cursor = QueryCursor::new();
        let mut matches_iter = cursor.matches(&scope_query, tree.root_node(), content.as_bytes());

        while let Some(query_match) = matches_iter.next() {
            let mut name: Option<String> = None;
            let mut main_node: Option<Node> = None;
            let mut is_class = false;
            for capture in query_match.captures {
                let capture_name = capture_names
                    .get(capture.index as usize)
                    .copied()
                    .unwrap_or("");
                match capture_name {
                    "name" => name = Some(content[capture.node.byte_range()].to_string()),
                    "class" => {
                        main_node = Some(capture.node);
                        is_class = true;
                    }
                    _ => main_node = Some(capture.node),
                }
            }
            let (Some(node), Some(name)) = (main_node, name) else {
                continue;
            };

            let parent = tightest_containing(&scopes, node.start_byte(), node.end_byte());
            let in_class = parent.map(|s| s.kind == "class").unwrap_or(false);
            let kind = if is_class {
                SymbolKind::Class
            } else if in_class {
                if name == "__init__" {
                    SymbolKind::Constructor
                } else {
                    SymbolKind::Method
                }
            } else {
                SymbolKind::Function
            };

            let qualified_name = match parent {
                Some(scope) => format!("{}.{}", scope.qualified, name),
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
            symbol.is_exported = !name.starts_with('_') || name == "__init__";
            symbol.is_async = content[node.byte_range()].starts_with("async");
            symbol.is_static = Self::is_decorated_static(node, content);
            symbol.return_type = node
                .child_by_field_name("return_type")
                .map(|t| content[t.byte_range()].to_string());
            symbol.parent_qualified_name = parent.map(|s| s.qualified.clone());
            symbol.content_hash = content_hash(&content[node.byte_range()]);
            symbol.parameters = Self::parameters_of(node, content);
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
        let root = tree.root_node();
        let mut cursor = root.walk();
        for node in root.children(&mut cursor) {
            let line = node.start_position().row as u32 + 1;
            match node.kind() {
                "import_statement" => {
                    // import a.b, c as d
                    let mut inner = node.walk();
                    for child in node.named_children(&mut inner) {
                        match child.kind() {
                            "dotted_name" => {
                                let specifier = content[child.byte_range()].to_string();
                                let local = specifier
                                    .split('.')
                                    .next()
                                    .unwrap_or(&specifier)
                                    .to_string();
                                extraction.imports.push(
                                    ExtractedImport::new(
                                        path,
                                        line,
                                        ImportType::Python,
                                        specifier,
                                    )
                                    .with_bindings(vec![ImportBinding::plain(local)]),
                                );
                            }
                            "aliased_import" => {
                                let specifier = child
                                    .child_by_field_name("name")
                                    .map(|n| content[n.byte_range()].to_string())
                                    .unwrap_or_default();
                                let alias = child
                                    .child_by_field_name("alias")
                                    .map(|n| content[n.byte_range()].to_string())
                                    .unwrap_or_default();
                                extraction.imports.push(
                                    ExtractedImport::new(
                                        path,
                                        line,
                                        ImportType::Python,
                                        specifier.clone(),
                                    )
                                    .with_bindings(vec![ImportBinding::aliased(
                                        specifier, alias,
                                    )]),
                                );
                            }
                            _ => {}
                        }
                    }
                }
                "import_from_statement" => {
                    let Some(module) = node.child_by_field_name("module_name") else {
                        continue;
                    };
                    let raw_specifier = content[module.byte_range()].to_string();
                    // `from .utils import x` resolves next to the file.
                    let specifier = if let Some(stripped) = raw_specifier.strip_prefix('.') {
                        if stripped.starts_with('.') {
                            raw_specifier.clone()
                        } else {
                            format!("./{}", stripped.replace('.', "/"))
                        }
                    } else {
                        raw_specifier.clone()
                    };
                    let mut bindings = Vec::new();
                    let mut inner = node.walk();
                    for child in node.named_children(&mut inner) {
                        if child.id() == module.id() {
                            continue;
                        }
                        match child.kind() {
                            "dotted_name" | "identifier" => {
                                bindings.push(ImportBinding::plain(
                                    content[child.byte_range()].to_string(),
                                ));
                            }
                            "aliased_import" => {
                                let imported = child
                                    .child_by_field_name("name")
                                    .map(|n| content[n.byte_range()].to_string())
                                    .unwrap_or_default();
                                let alias = child
                                    .child_by_field_name("alias")
                                    .map(|n| content[n.byte_range()].to_string())
                                    .unwrap_or_default();
                                bindings.push(ImportBinding::aliased(imported, alias));
                            }
                            "wildcard_import" => {}
                            _ => {}
                        }
                    }
                    let mut import =
                        ExtractedImport::new(path, line, ImportType::Python, specifier)
                            .with_bindings(bindings);
                    // Keep the verbatim dotted form around for importers_of.
                    if import.resolved_path.is_none() && raw_specifier.starts_with('.') {
                        import.module_specifier = raw_specifier;
                    }
                    extraction.imports.push(import);
                }
                _ => {}
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
        let grammar: tree_sitter::Language = tree_sitter_python::LANGUAGE.into();
        let mut parser = Parser::new();
        parser.set_language(&grammar).unwrap();
        let tree = parser.parse(content, None).unwrap();
        PythonExtractor::new()
            .extract("app/service.py", content, &tree, &grammar)
            .unwrap()
    }

    #[test]
    fn test_class_and_method_symbols() {
        let extraction = extract(
            r#"
class UserService:
    """Manages users."""

    def __init__(self, db):
        self.db = db

    def find(self, user_id: int) -> dict:
        """Find one user."""
        return self.db.get(user_id)

def _private_helper():
    pass
"#,
        );
        let class = extraction
            .symbols
            .iter()
            .find(|s| s.name == "UserService")
            .unwrap();
        assert_eq!(class.kind, SymbolKind::Class);
        assert_eq!(
            class.docstring.as_ref().unwrap().description.as_deref(),
            Some("Manages users.")
        );

        let init = extraction
            .symbols
            .iter()
            .find(|s| s.name == "__init__")
            .unwrap();
        assert_eq!(init.kind, SymbolKind::Constructor);
        assert_eq!(init.qualified_name, "UserService.__init__");

        let find = extraction.symbols.iter().find(|s| s.name == "find").unwrap();
        assert_eq!(find.kind, SymbolKind::Method);
        assert_eq!(find.parameters.len(), 1);
        assert_eq!(find.parameters[0].name, "user_id");
        assert_eq!(find.return_type.as_deref(), Some("dict"));

        let private = extraction
            .symbols
            .iter()
            .find(|s| s.name == "_private_helper")
            .unwrap();
        assert!(!private.is_exported);
    }

    #[test]
    fn test_imports_with_aliases_and_relative() {
        let extraction = extract(
            r#"
import os
import numpy as np
from .utils import helper, format_name as fmt
from flask import Flask
"#,
        );
        assert_eq!(extraction.imports.len(), 4);
        let np = &extraction.imports[1];
        assert_eq!(np.module_specifier, "numpy");
        assert_eq!(np.bindings[0].local_name, "np");

        let relative = &extraction.imports[2];
        assert_eq!(relative.resolved_path.as_deref(), Some("app/utils"));
        assert_eq!(relative.bindings.len(), 2);
        assert_eq!(relative.bindings[1].local_name, "fmt");

        let flask = &extraction.imports[3];
        assert!(flask.is_external());
    }

    #[test]
    fn test_call_and_decorator_usages() {
        let extraction = extract(
            r#"
@app.route("/x")
def handler():
    return render(data)
"#,
        );
        assert!(extraction
            .usages
            .iter()
            .any(|u| u.symbol_name == "render" && u.usage_type == UsageType::Call));
        let render = extraction
            .usages
            .iter()
            .find(|u| u.symbol_name == "render")
            .unwrap();
        assert_eq!(render.enclosing_hint.as_deref(), Some("handler"));
    }
}
