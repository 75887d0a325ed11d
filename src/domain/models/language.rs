use std::path::Path;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Rust,
    Python,
    JavaScript,
    TypeScript,
    Go,
    Ruby,
    Java,
    Markdown,
    Rst,
    Json,
    Yaml,
    Toml,
    Ini,
    Xml,
    Unknown,
}

impl Language {
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "rs" => Language::Rust,
            "py" | "pyi" => Language::Python,
            "js" | "jsx" | "mjs" | "cjs" => Language::JavaScript,
            "ts" | "tsx" | "mts" | "cts" => Language::TypeScript,
            "go" => Language::Go,
            "rb" | "rake" => Language::Ruby,
            "java" => Language::Java,
            "md" | "markdown" => Language::Markdown,
            "rst" => Language::Rst,
            "json" => Language::Json,
            "yaml" | "yml" => Language::Yaml,
            "toml" => Language::Toml,
            "ini" | "cfg" | "conf" | "env" => Language::Ini,
            "xml" => Language::Xml,
            _ => Language::Unknown,
        }
    }

    pub fn from_path(path: &Path) -> Self {
        let by_ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(Self::from_extension)
            .unwrap_or(Language::Unknown);
        if by_ext != Language::Unknown {
            return by_ext;
        }
        match path.file_name().and_then(|n| n.to_str()) {
            Some("Rakefile") | Some("Gemfile") => Language::Ruby,
            Some(".env") => Language::Ini,
            _ => Language::Unknown,
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "rust" => Language::Rust,
            "python" => Language::Python,
            "javascript" => Language::JavaScript,
            "typescript" | "tsx" => Language::TypeScript,
            "go" => Language::Go,
            "ruby" => Language::Ruby,
            "java" => Language::Java,
            "markdown" => Language::Markdown,
            "rst" => Language::Rst,
            "json" => Language::Json,
            "yaml" => Language::Yaml,
            "toml" => Language::Toml,
            "ini" => Language::Ini,
            "xml" => Language::Xml,
            _ => Language::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Rust => "rust",
            Language::Python => "python",
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
            Language::Go => "go",
            Language::Ruby => "ruby",
            Language::Java => "java",
            Language::Markdown => "markdown",
            Language::Rst => "rst",
            Language::Json => "json",
            Language::Yaml => "yaml",
            Language::Toml => "toml",
            Language::Ini => "ini",
            Language::Xml => "xml",
            Language::Unknown => "unknown",
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Language::Unknown)
    }

    /// Languages with a statically linked tree-sitter grammar.
    pub fn has_grammar(&self) -> bool {
        matches!(
            self,
            Language::Rust
                | Language::Python
                | Language::JavaScript
                | Language::TypeScript
                | Language::Go
        )
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Coarse classification used by vector search filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Code,
    Docs,
    Config,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Code => "code",
            ContentType::Docs => "docs",
            ContentType::Config => "config",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "docs" => ContentType::Docs,
            "config" => ContentType::Config,
            _ => ContentType::Code,
        }
    }

    /// Classify a file from its path and resolved language.
    pub fn classify(path: &str, language: Language) -> Self {
        match language {
            Language::Markdown | Language::Rst => return ContentType::Docs,
            Language::Json | Language::Yaml | Language::Toml | Language::Ini | Language::Xml => {
                return ContentType::Config
            }
            _ => {}
        }
        let file_name = Path::new(path)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("");
        if file_name.starts_with(".env") || file_name.ends_with("rc") {
            return ContentType::Config;
        }
        ContentType::Code
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_from_extension() {
        assert_eq!(Language::from_extension("rs"), Language::Rust);
        assert_eq!(Language::from_extension("py"), Language::Python);
        assert_eq!(Language::from_extension("tsx"), Language::TypeScript);
        assert_eq!(Language::from_extension("rb"), Language::Ruby);
        assert_eq!(Language::from_extension("bin"), Language::Unknown);
    }

    #[test]
    fn test_language_from_basename() {
        assert_eq!(Language::from_path(Path::new("Gemfile")), Language::Ruby);
        assert_eq!(Language::from_path(Path::new("src/main.rs")), Language::Rust);
        assert_eq!(Language::from_path(Path::new("LICENSE")), Language::Unknown);
    }

    #[test]
    fn test_grammar_availability() {
        assert!(Language::Rust.has_grammar());
        assert!(Language::TypeScript.has_grammar());
        assert!(!Language::Ruby.has_grammar());
        assert!(!Language::Markdown.has_grammar());
    }

    #[test]
    fn test_content_type_classification() {
        assert_eq!(
            ContentType::classify("README.md", Language::Markdown),
            ContentType::Docs
        );
        assert_eq!(
            ContentType::classify("config.yaml", Language::Yaml),
            ContentType::Config
        );
        assert_eq!(
            ContentType::classify(".env.local", Language::Unknown),
            ContentType::Config
        );
        assert_eq!(
            ContentType::classify(".babelrc", Language::Unknown),
            ContentType::Config
        );
        assert_eq!(
            ContentType::classify("src/lib.rs", Language::Rust),
            ContentType::Code
        );
    }
}
