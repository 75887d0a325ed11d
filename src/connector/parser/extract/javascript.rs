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

const SCOPE_QUERY: &str = r#"
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
"#;

const USAGE_QUERY: &str = r#"
(call_expression function: (identifier) @callee) @call
(call_expression
    function: (member_expression property: (property_identifier) @callee)) @call
(new_expression constructor: (identifier) @callee) @instantiate
(class_declaration
    (class_heritage (identifier) @callee)) @extend
(jsx_self_closing_element name: (identifier) @callee) @instantiate
(jsx_element
    open_tag: (jsx_opening_element name: (identifier) @callee)) @instantiate
"#;

pub struct JavaScriptExtractor;

impl JavaScriptExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for JavaScriptExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageExtractor for JavaScriptExtractor {
    fn language(&self) -> Language {
        Language::JavaScript
    }

    fn extract(
        &self,
        path: &str,
        content: &str,
        tree: &Tree,
        grammar: &tree_sitter::Language,
    ) -> Result<FileExtraction, DomainError> {
        extract_js_like(path, content, tree, grammar, SCOPE_QUERY, USAGE_QUERY, "")
    }
}

/// Shared JS/TS extraction. TypeScript passes extra definition and usage
/// patterns; everything else (imports, docstrings, scope handling) is the
/// same grammar family.
pub(super) fn extract_js_like(
    path: &str,
    content: &str,
    tree: &Tree,
    grammar: &tree_sitter::Language,
    scope_query_source: &str,
    usage_query_source: &str,
    extra_definitions: &str,
) -> Result<FileExtraction, DomainError> {
    let scope_query = Query::new(grammar, scope_query_source)
        .map_err(|e| DomainError::extraction(format!("scope query: {}", e)))?;
    let scopes = collect_scopes(tree, content, &scope_query);

    let mut extraction = FileExtraction::empty();

    // ── Symbols ──────────────────────────────────────────────────────────
    let definition_source = format!("{}\n{}", scope_query_source, extra_definitions);
    let def_query = Query::new(grammar, &definition_source)
        .map_err(|e| DomainError::extraction(format!("definition query: {}", e)))?;
    let capture_names: Vec<&str> = def_query.capture_names().to_vec();
    let mut cursor = QueryCursor::new();
    let mut matches_iter = cursor.matches(&def_query, tree.root_node(), content.as_bytes());

    while let Some(query_match) = matches_iter.next() {
        let mut name: Option<String> = None;
        let mut main_node: Option<Node> = None;
        let mut capture_kind = "";
        for capture in query_match.captures {
            let capture_name = capture_names
                .get(capture.index as usize)
                .copied()
                .unwrap_or("");
            if capture_name == "name" {
                name = Some(content[capture.node.byte_range()].to_string());
            } else {
                main_node = Some(capture.node);
                capture_kind = capture_name;
            }
        }
        let (Some(node), Some(name)) = (main_node, name) else {
            continue;
        };

        let parent = tightest_containing(&scopes, node.start_byte(), node.end_byte());
        let kind = match capture_kind {
            "class" => SymbolKind::Class,
            "interface" => SymbolKind::Interface,
            "enum" => SymbolKind::Enum,
            "type_alias" => SymbolKind::TypeAlias,
            "method" => match node_method_kind(node, content, &name) {
                Some(kind) => kind,
                None => SymbolKind::Method,
            },
            _ => {
                if parent.map(|s| s.kind == "class").unwrap_or(false) {
                    SymbolKind::Method
                } else {
                    SymbolKind::Function
                }
            }
        };

        let qualified_name = match parent {
            Some(scope) => format!("{}.{}", scope.qualified, name),
            None => name.clone(),
        };
        let mut symbol = ExtractedSymbol::new(
            name,
            qualified_name,
            kind,
            path,
            node.start_position().row as u32 + 1,
            node.end_position().row as u32 + 1,
        );
        symbol.is_exported = has_export_ancestor(node);
        symbol.is_async = content[node.byte_range()].starts_with("async")
            || node_modifier_text(node, content).contains("async");
        symbol.is_static = node_modifier_text(node, content).contains("static");
        symbol.return_type = node
            .child_by_field_name("return_type")
            .map(|t| content[t.byte_range()].trim_start_matches(':').trim().to_string());
        symbol.parent_qualified_name = parent.map(|s| s.qualified.clone());
        symbol.content_hash = content_hash(&content[node.byte_range()]);
        symbol.parameters = parameters_of(node, content);
        symbol.docstring = jsdoc_of(node, content);
        extraction.symbols.push(symbol);
    }

    // ── Usages ───────────────────────────────────────────────────────────
    let usage_query = Query::new(grammar, usage_query_source)
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
        if is_noise_name(&name) || name == "require" {
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

    // ── Imports ──────────────────────────────────────────────────────────
    collect_imports(path, content, tree, &mut extraction);

    Ok(extraction)
}

fn node_modifier_text<'a>(node: Node, content: &'a str) -> &'a str {
    match node.child_by_field_name("name") {
        Some(name) => &content[node.start_byte()..name.start_byte()],
        None => "",
    }
}

fn node_method_kind(node: Node, content: &str, name: &str) -> Option<SymbolKind> {
    let modifiers = node_modifier_text(node, content);
    if modifiers.contains("get ") {
        return Some(SymbolKind::Getter);
    }
    if modifiers.contains("set ") {
        return Some(SymbolKind::Setter);
    }
    if name == "constructor" {
        return Some(SymbolKind::Constructor);
    }
    None
}

fn has_export_ancestor(node: Node) -> bool {
    let mut cursor = Some(node);
    while let Some(current) = cursor {
        if current.kind() == "export_statement" {
            return true;
        }
        cursor = current.parent();
    }
    false
}

fn parameters_of(node: Node, content: &str) -> Vec<SymbolParameter> {
    let list = node
        .child_by_field_name("parameters")
        .or_else(|| {
            // Arrow functions hang off a variable declarator.
            node.named_children(&mut node.walk())
                .find(|c| c.kind() == "variable_declarator")
                .and_then(|d| d.child_by_field_name("value"))
                .and_then(|v| v.child_by_field_name("parameters"))
        });
    let Some(list) = list else {
        return Vec::new();
    };
    let mut params = Vec::new();
    let mut cursor = list.walk();
    let mut position = 0u32;
    for child in list.named_children(&mut cursor) {
        let (name, type_annotation, is_optional) = match child.kind() {
            "identifier" => (content[child.byte_range()].to_string(), None, false),
            "required_parameter" | "optional_parameter" => {
                let name = child
                    .child_by_field_name("pattern")
                    .map(|p| content[p.byte_range()].to_string())
                    .unwrap_or_default();
                let annotation = child.child_by_field_name("type").map(|t| {
                    content[t.byte_range()]
                        .trim_start_matches(':')
                        .trim()
                        .to_string()
                });
                (name, annotation, child.kind() == "optional_parameter")
            }
            "assignment_pattern" => {
                let name = child
                    .child_by_field_name("left")
                    .map(|p| content[p.byte_range()].to_string())
                    .unwrap_or_default();
                (name, None, true)
            }
            "rest_pattern" => (content[child.byte_range()].to_string(), None, false),
            _ => continue,
        };
        if name.is_empty() {
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

fn jsdoc_of(node: Node, content: &str) -> Option<SymbolDocstring> {
    let raw = preceding_comment_block(node, content)?;
    if !raw.starts_with("/**") {
        return None;
    }
    Some(SymbolDocstring {
        doc_type: DocType::Jsdoc,
        description: doc_description(&raw),
        raw_text: raw,
    })
}

fn string_content(node: Node, content: &str) -> String {
    content[node.byte_range()]
        .trim_matches(|c| c == '"' || c == '\'' || c == '`')
        .to_string()
}

fn collect_imports(path: &str, content: &str, tree: &Tree, extraction: &mut FileExtraction) {
    let root = tree.root_node();
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        match node.kind() {
            "import_statement" => {
                let Some(source) = node.child_by_field_name("source") else {
                    continue;
                };
                let specifier = string_content(source, content);
                let mut bindings = Vec::new();
                let mut is_type_only = false;
                let mut cursor = node.walk();
                for child in node.children(&mut cursor) {
                    if child.kind() == "import" {
                        continue;
                    }
                    if content[child.byte_range()].trim() == "type" {
                        is_type_only = true;
                    }
                    if child.kind() == "import_clause" {
                        collect_import_clause(child, content, &mut bindings);
                    }
                }
                if is_type_only {
                    for binding in &mut bindings {
                        binding.is_type_only = true;
                    }
                }
                extraction.imports.push(
                    ExtractedImport::new(
                        path,
                        node.start_position().row as u32 + 1,
                        ImportType::EsImport,
                        specifier,
                    )
                    .with_bindings(bindings),
                );
            }
            "export_statement" => {
                // Re-exports with a source are import edges too.
                if let Some(source) = node.child_by_field_name("source") {
                    let specifier = string_content(source, content);
                    extraction.imports.push(ExtractedImport::new(
                        path,
                        node.start_position().row as u32 + 1,
                        ImportType::EsExport,
                        specifier,
                    ));
                }
                let mut cursor = node.walk();
                for child in node.children(&mut cursor) {
                    stack.push(child);
                }
            }
            "call_expression" => {
                // const x = require('y')
                let is_require = node
                    .child_by_field_name("function")
                    .map(|f| &content[f.byte_range()] == "require")
                    .unwrap_or(false);
                if is_require {
                    if let Some(args) = node.child_by_field_name("arguments") {
                        if let Some(arg) = args.named_child(0) {
                            if arg.kind() == "string" {
                                let specifier = string_content(arg, content);
                                let bindings = require_bindings(node, content);
                                extraction.imports.push(
                                    ExtractedImport::new(
                                        path,
                                        node.start_position().row as u32 + 1,
                                        ImportType::Commonjs,
                                        specifier,
                                    )
                                    .with_bindings(bindings),
                                );
                            }
                        }
                    }
                }
                let mut cursor = node.walk();
                for child in node.children(&mut cursor) {
                    stack.push(child);
                }
            }
            _ => {
                let mut cursor = node.walk();
                for child in node.children(&mut cursor) {
                    stack.push(child);
                }
            }
        }
    }
}

fn collect_import_clause(clause: Node, content: &str, bindings: &mut Vec<ImportBinding>) {
    let mut cursor = clause.walk();
    for child in clause.named_children(&mut cursor) {
        match child.kind() {
            "identifier" => {
                // Default import binds the module's default export.
                bindings.push(ImportBinding::aliased(
                    "default",
                    content[child.byte_range()].to_string(),
                ));
            }
            "namespace_import" => {
                if let Some(name) = child.named_child(0) {
                    bindings.push(ImportBinding::aliased(
                        "*",
                        content[name.byte_range()].to_string(),
                    ));
                }
            }
            "named_imports" => {
                let mut inner = child.walk();
                for spec in child.named_children(&mut inner) {
                    if spec.kind() != "import_specifier" {
                        continue;
                    }
                    let imported = spec
                        .child_by_field_name("name")
                        .map(|n| content[n.byte_range()].to_string())
                        .unwrap_or_default();
                    let local = spec
                        .child_by_field_name("alias")
                        .map(|n| content[n.byte_range()].to_string())
                        .unwrap_or_else(|| imported.clone());
                    let is_type_only = content[spec.byte_range()].trim_start().starts_with("type ");
                    bindings.push(ImportBinding {
                        imported_name: imported,
                        local_name: local,
                        is_type_only,
                    });
                }
            }
            _ => {}
        }
    }
}

/// For `const x = require('m')` / `const { a, b: c } = require('m')`,
/// recover the local bindings from the enclosing declarator.
fn require_bindings(call: Node, content: &str) -> Vec<ImportBinding> {
    let Some(declarator) = call.parent().filter(|p| p.kind() == "variable_declarator") else {
        return Vec::new();
    };
    let Some(name_node) = declarator.child_by_field_name("name") else {
        return Vec::new();
    };
    match name_node.kind() {
        "identifier" => vec![ImportBinding::plain(
            content[name_node.byte_range()].to_string(),
        )],
        "object_pattern" => {
            let mut bindings = Vec::new();
            let mut cursor = name_node.walk();
            for child in name_node.named_children(&mut cursor) {
                match child.kind() {
                    "shorthand_property_identifier_pattern" => {
                        bindings.push(ImportBinding::plain(
                            content[child.byte_range()].to_string(),
                        ));
                    }
                    "pair_pattern" => {
                        let imported = child
                            .child_by_field_name("key")
                            .map(|n| content[n.byte_range()].to_string())
                            .unwrap_or_default();
                        let local = child
                            .child_by_field_name("value")
                            .map(|n| content[n.byte_range()].to_string())
                            .unwrap_or_default();
                        bindings.push(ImportBinding::aliased(imported, local));
                    }
                    _ => {}
                }
            }
            bindings
        }
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tree_sitter::Parser;

    fn extract(content: &str) -> FileExtraction {
        let grammar: tree_sitter::Language = tree_sitter_javascript::LANGUAGE.into();
        let mut parser = Parser::new();
        parser.set_language(&grammar).unwrap();
        let tree = parser.parse(content, None).unwrap();
        JavaScriptExtractor::new()
            .extract("src/index.js", content, &tree, &grammar)
            .unwrap()
    }

    #[test]
    fn test_function_and_class_symbols() {
        let extraction = extract(
            r#"
/**
 * Greets a user by name.
 */
export function greet(name) {
    return helper(name);
}

class Greeter {
    constructor(prefix) {
        this.prefix = prefix;
    }

    static of(prefix) {
        return new Greeter(prefix);
    }
}
"#,
        );
        let greet = extraction.symbols.iter().find(|s| s.name == "greet").unwrap();
        assert!(greet.is_exported);
        assert_eq!(
            greet.docstring.as_ref().unwrap().description.as_deref(),
            Some("Greets a user by name.")
        );
        let ctor = extraction
            .symbols
            .iter()
            .find(|s| s.name == "constructor")
            .unwrap();
        assert_eq!(ctor.kind, SymbolKind::Constructor);
        assert_eq!(ctor.qualified_name, "Greeter.constructor");
        let of = extraction.symbols.iter().find(|s| s.name == "of").unwrap();
        assert!(of.is_static);
    }

    #[test]
    fn test_es_import_bindings() {
        let extraction = extract(
            r#"
import express from 'express';
import { helper, format as fmt } from './utils';
import * as path from 'path';
"#,
        );
        assert_eq!(extraction.imports.len(), 3);
        let default_import = &extraction.imports[0];
        assert_eq!(default_import.module_specifier, "express");
        assert_eq!(default_import.bindings[0].imported_name, "default");
        assert_eq!(default_import.bindings[0].local_name, "express");

        let named = &extraction.imports[1];
        assert_eq!(named.resolved_path.as_deref(), Some("src/utils"));
        assert_eq!(named.bindings.len(), 2);
        assert_eq!(named.bindings[1].imported_name, "format");
        assert_eq!(named.bindings[1].local_name, "fmt");

        let namespace = &extraction.imports[2];
        assert_eq!(namespace.bindings[0].imported_name, "*");
    }

    #[test]
    fn test_commonjs_require() {
        let extraction = extract(
            r#"
const express = require('express');
const { getUser } = require('./handlers');
"#,
        );
        assert_eq!(extraction.imports.len(), 2);
        assert_eq!(extraction.imports[0].import_type, ImportType::Commonjs);
        assert_eq!(extraction.imports[1].bindings[0].local_name, "getUser");
    }

    #[test]
    fn test_call_usage_and_instantiation() {
        let extraction = extract(
            r#"
function run() {
    const greeter = new Greeter();
    return greet('world');
}
"#,
        );
        assert!(extraction
            .usages
            .iter()
            .any(|u| u.symbol_name == "Greeter" && u.usage_type == UsageType::Instantiate));
        let call = extraction
            .usages
            .iter()
            .find(|u| u.symbol_name == "greet")
            .unwrap();
        assert_eq!(call.usage_type, UsageType::Call);
        assert_eq!(call.enclosing_hint.as_deref(), Some("run"));
    }
}
