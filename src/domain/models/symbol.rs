use serde::{Deserialize, Serialize};

/// The kind of a declared symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Function,
    Class,
    Method,
    Interface,
    Trait,
    Enum,
    TypeAlias,
    Property,
    Field,
    Constant,
    Variable,
    Namespace,
    Module,
    Constructor,
    Getter,
    Setter,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::Function => "function",
            SymbolKind::Class => "class",
            SymbolKind::Method => "method",
            SymbolKind::Interface => "interface",
            SymbolKind::Trait => "trait",
            SymbolKind::Enum => "enum",
            SymbolKind::TypeAlias => "type_alias",
            SymbolKind::Property => "property",
            SymbolKind::Field => "field",
            SymbolKind::Constant => "constant",
            SymbolKind::Variable => "variable",
            SymbolKind::Namespace => "namespace",
            SymbolKind::Module => "module",
            SymbolKind::Constructor => "constructor",
            SymbolKind::Getter => "getter",
            SymbolKind::Setter => "setter",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "function" => SymbolKind::Function,
            "class" => SymbolKind::Class,
            "method" => SymbolKind::Method,
            "interface" => SymbolKind::Interface,
            "trait" => SymbolKind::Trait,
            "enum" => SymbolKind::Enum,
            "type_alias" => SymbolKind::TypeAlias,
            "property" => SymbolKind::Property,
            "field" => SymbolKind::Field,
            "constant" => SymbolKind::Constant,
            "variable" => SymbolKind::Variable,
            "namespace" => SymbolKind::Namespace,
            "module" => SymbolKind::Module,
            "constructor" => SymbolKind::Constructor,
            "getter" => SymbolKind::Getter,
            "setter" => SymbolKind::Setter,
            _ => return None,
        })
    }
}

impl std::fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Docstring convention tag, so consumers can render appropriately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocType {
    Jsdoc,
    Pydoc,
    Rdoc,
    Rustdoc,
    Godoc,
    Javadoc,
    Other,
}

impl DocType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocType::Jsdoc => "jsdoc",
            DocType::Pydoc => "pydoc",
            DocType::Rdoc => "rdoc",
            DocType::Rustdoc => "rustdoc",
            DocType::Godoc => "godoc",
            DocType::Javadoc => "javadoc",
            DocType::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "jsdoc" => DocType::Jsdoc,
            "pydoc" => DocType::Pydoc,
            "rdoc" => DocType::Rdoc,
            "rustdoc" => DocType::Rustdoc,
            "godoc" => DocType::Godoc,
            "javadoc" => DocType::Javadoc,
            _ => DocType::Other,
        }
    }
}

/// One declared parameter of a symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolParameter {
    pub position: u32,
    pub name: String,
    pub type_annotation: Option<String>,
    pub is_optional: bool,
}

/// A docstring attached to a symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolDocstring {
    pub doc_type: DocType,
    pub raw_text: String,
    pub description: Option<String>,
}

/// A symbol as emitted by an extractor, before it has a database identity.
/// Parent linkage is by qualified name; document order guarantees the parent
/// is inserted first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedSymbol {
    pub name: String,
    pub qualified_name: String,
    pub kind: SymbolKind,
    pub file_path: String,
    pub start_line: u32,
    pub end_line: u32,
    pub visibility: Option<String>,
    pub is_async: bool,
    pub is_static: bool,
    pub is_exported: bool,
    pub return_type: Option<String>,
    pub parent_qualified_name: Option<String>,
    pub content_hash: String,
    pub parameters: Vec<SymbolParameter>,
    pub docstring: Option<SymbolDocstring>,
}

impl ExtractedSymbol {
    pub fn new(
        name: impl Into<String>,
        qualified_name: impl Into<String>,
        kind: SymbolKind,
        file_path: impl Into<String>,
        start_line: u32,
        end_line: u32,
    ) -> Self {
        Self {
            name: name.into(),
            qualified_name: qualified_name.into(),
            kind,
            file_path: file_path.into(),
            start_line,
            end_line,
            visibility: None,
            is_async: false,
            is_static: false,
            is_exported: false,
            return_type: None,
            parent_qualified_name: None,
            content_hash: String::new(),
            parameters: Vec::new(),
            docstring: None,
        }
    }
}

/// A symbol row as persisted in the structure index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Symbol {
    pub id: i64,
    pub repo_id: String,
    pub commit_id: i64,
    pub name: String,
    pub qualified_name: String,
    pub kind: SymbolKind,
    pub file_path: String,
    pub start_line: u32,
    pub end_line: u32,
    pub visibility: Option<String>,
    pub is_async: bool,
    pub is_static: bool,
    pub is_exported: bool,
    pub return_type: Option<String>,
    pub parent_symbol_id: Option<i64>,
    pub content_hash: String,
}

impl Symbol {
    pub fn location(&self) -> String {
        format!("{}:{}-{}", self.file_path, self.start_line, self.end_line)
    }

    pub fn contains_line(&self, line: u32) -> bool {
        self.start_line <= line && line <= self.end_line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_kind_roundtrip() {
        for kind in [
            SymbolKind::Function,
            SymbolKind::Method,
            SymbolKind::TypeAlias,
            SymbolKind::Getter,
        ] {
            assert_eq!(SymbolKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(SymbolKind::parse("nonsense"), None);
    }

    #[test]
    fn test_doc_type_parse_fallback() {
        assert_eq!(DocType::parse("rustdoc"), DocType::Rustdoc);
        assert_eq!(DocType::parse("whatever"), DocType::Other);
    }

    #[test]
    fn test_symbol_contains_line() {
        let symbol = Symbol {
            id: 1,
            repo_id: "r".to_string(),
            commit_id: 1,
            name: "f".to_string(),
            qualified_name: "f".to_string(),
            kind: SymbolKind::Function,
            file_path: "a.rs".to_string(),
            start_line: 10,
            end_line: 20,
            visibility: None,
            is_async: false,
            is_static: false,
            is_exported: true,
            return_type: None,
            parent_symbol_id: None,
            content_hash: String::new(),
        };
        assert!(symbol.contains_line(10));
        assert!(symbol.contains_line(20));
        assert!(!symbol.contains_line(21));
    }
}
