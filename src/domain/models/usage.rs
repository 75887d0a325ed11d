use serde::{Deserialize, Serialize};

/// How a symbol name was used at a site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageType {
    Call,
    Read,
    Write,
    Extend,
    Implement,
    TypeRef,
    Import,
    Decorator,
    Instantiate,
    Other,
}

impl UsageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UsageType::Call => "call",
            UsageType::Read => "read",
            UsageType::Write => "write",
            UsageType::Extend => "extend",
            UsageType::Implement => "implement",
            UsageType::TypeRef => "type_ref",
            UsageType::Import => "import",
            UsageType::Decorator => "decorator",
            UsageType::Instantiate => "instantiate",
            UsageType::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "call" => UsageType::Call,
            "read" => UsageType::Read,
            "write" => UsageType::Write,
            "extend" => UsageType::Extend,
            "implement" => UsageType::Implement,
            "type_ref" => UsageType::TypeRef,
            "import" => UsageType::Import,
            "decorator" => UsageType::Decorator,
            "instantiate" => UsageType::Instantiate,
            _ => UsageType::Other,
        }
    }
}

impl std::fmt::Display for UsageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A usage site as emitted by an extractor. The enclosing symbol is recorded
/// as a qualified-name hint and resolved to an ID by the linker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedUsage {
    pub symbol_name: String,
    pub file_path: String,
    pub line: u32,
    pub column: u32,
    pub usage_type: UsageType,
    pub enclosing_hint: Option<String>,
}

impl ExtractedUsage {
    pub fn new(
        symbol_name: impl Into<String>,
        file_path: impl Into<String>,
        line: u32,
        column: u32,
        usage_type: UsageType,
    ) -> Self {
        Self {
            symbol_name: symbol_name.into(),
            file_path: file_path.into(),
            line,
            column,
            usage_type,
            enclosing_hint: None,
        }
    }

    pub fn with_enclosing_hint(mut self, hint: impl Into<String>) -> Self {
        self.enclosing_hint = Some(hint.into());
        self
    }
}

/// A usage row as persisted in the structure index. `definition_symbol_id`
/// stays null when resolution was ambiguous or impossible. The extractor's
/// qualified-name hint is kept for the linker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub id: i64,
    pub commit_id: i64,
    pub symbol_name: String,
    pub file_path: String,
    pub line: u32,
    pub column: u32,
    pub usage_type: UsageType,
    pub enclosing_hint: Option<String>,
    pub enclosing_symbol_id: Option<i64>,
    pub definition_symbol_id: Option<i64>,
}

impl Usage {
    pub fn location(&self) -> String {
        format!("{}:{}:{}", self.file_path, self.line, self.column)
    }

    pub fn is_linked(&self) -> bool {
        self.definition_symbol_id.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_type_roundtrip() {
        for usage_type in [
            UsageType::Call,
            UsageType::TypeRef,
            UsageType::Decorator,
            UsageType::Instantiate,
        ] {
            assert_eq!(UsageType::parse(usage_type.as_str()), usage_type);
        }
        assert_eq!(UsageType::parse("junk"), UsageType::Other);
    }

    #[test]
    fn test_usage_location() {
        let usage = Usage {
            id: 1,
            commit_id: 1,
            symbol_name: "helper".to_string(),
            file_path: "src/index.ts".to_string(),
            line: 4,
            column: 12,
            usage_type: UsageType::Call,
            enclosing_hint: None,
            enclosing_symbol_id: None,
            definition_symbol_id: None,
        };
        assert_eq!(usage.location(), "src/index.ts:4:12");
        assert!(!usage.is_linked());
    }
}
