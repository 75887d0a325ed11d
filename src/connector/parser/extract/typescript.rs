use tree_sitter::Tree;

use crate::domain::{DomainError, FileExtraction, Language};

use super::javascript::extract_js_like;
use super::LanguageExtractor;

const SCOPE_QUERY: &str = r#"
(function_declaration name: (identifier) @name) @function
(class_declaration name: (type_identifier) @name) @class
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

const EXTRA_DEFINITIONS: &str = r#"
(interface_declaration name: (type_identifier) @name) @interface
(type_alias_declaration name: (type_identifier) @name) @type_alias
(enum_declaration name: (identifier) @name) @enum
"#;

const USAGE_QUERY: &str = r#"
(call_expression function: (identifier) @callee) @call
(call_expression
    function: (member_expression property: (property_identifier) @callee)) @call
(new_expression constructor: (identifier) @callee) @instantiate
(class_declaration
    (class_heritage (extends_clause value: (identifier) @callee))) @extend
(class_declaration
    (class_heritage (implements_clause (type_identifier) @callee))) @implement
(type_annotation (type_identifier) @callee) @type_ref
"#;

/// TypeScript symbol extractor. `tsx` files resolve to the same language ID
/// and reuse this extractor.
pub struct TypeScriptExtractor;

impl TypeScriptExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TypeScriptExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageExtractor for TypeScriptExtractor {
    fn language(&self) -> Language {
        Language::TypeScript
    }

    fn extract(
        &self,
        path: &str,
        content: &str,
        tree: &Tree,
        grammar: &tree_sitter::Language,
    ) -> Result<FileExtraction, DomainError> {
        extract_js_like(
            path,
            content,
            tree,
            grammar,
            SCOPE_QUERY,
            USAGE_QUERY,
            EXTRA_DEFINITIONS,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{SymbolKind, UsageType};
    use tree_sitter::Parser;

    fn extract(content: &str) -> FileExtraction {
        let grammar: tree_sitter::Language =
            tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into();
        let mut parser = Parser::new();
        parser.set_language(&grammar).unwrap();
        let tree = parser.parse(content, None).unwrap();
        TypeScriptExtractor::new()
            .extract("src/utils.ts", content, &tree, &grammar)
            .unwrap()
    }

    #[test]
    fn test_exported_function_with_types() {
        let extraction = extract(
            r#"
export function helper(name: string): string {
    return name.trim();
}
"#,
        );
        let helper = extraction
            .symbols
            .iter()
            .find(|s| s.name == "helper")
            .unwrap();
        assert!(helper.is_exported);
        assert_eq!(helper.kind, SymbolKind::Function);
        assert_eq!(helper.return_type.as_deref(), Some("string"));
        assert_eq!(helper.parameters.len(), 1);
        assert_eq!(helper.parameters[0].name, "name");
        assert_eq!(helper.parameters[0].type_annotation.as_deref(), Some("string"));
        assert_eq!(helper.start_line, 2);
        assert_eq!(helper.end_line, 4);
    }

    #[test]
    fn test_interface_and_type_alias() {
        let extraction = extract(
            r#"
export interface User {
    id: number;
    name: string;
}

export type UserId = number;

export enum Role {
    Admin,
    Member,
}
"#,
        );
        let kinds: Vec<SymbolKind> = extraction.symbols.iter().map(|s| s.kind).collect();
        assert!(kinds.contains(&SymbolKind::Interface));
        assert!(kinds.contains(&SymbolKind::TypeAlias));
        assert!(kinds.contains(&SymbolKind::Enum));
    }

    #[test]
    fn test_implements_and_extends_usages() {
        let extraction = extract(
            r#"
class Service extends Base implements Disposable {
    dispose(): void {}
}
"#,
        );
        assert!(extraction
            .usages
            .iter()
            .any(|u| u.symbol_name == "Base" && u.usage_type == UsageType::Extend));
        assert!(extraction
            .usages
            .iter()
            .any(|u| u.symbol_name == "Disposable" && u.usage_type == UsageType::Implement));
    }

    #[test]
    fn test_type_only_import() {
        let extraction = extract("import type { Config } from './config';\n");
        let import = &extraction.imports[0];
        assert!(import.bindings[0].is_type_only);
    }

    #[test]
    fn test_optional_parameter() {
        let extraction = extract(
            r#"
export function page(limit?: number) {
    return limit ?? 10;
}
"#,
        );
        let page = extraction.symbols.iter().find(|s| s.name == "page").unwrap();
        assert!(page.parameters[0].is_optional);
    }
}
