use serde::{Deserialize, Serialize};

/// The import mechanism used at a site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportType {
    EsImport,
    EsExport,
    Commonjs,
    Python,
    Require,
    RequireRelative,
    Go,
    Rust,
    Java,
}

impl ImportType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportType::EsImport => "es_import",
            ImportType::EsExport => "es_export",
            ImportType::Commonjs => "commonjs",
            ImportType::Python => "python",
            ImportType::Require => "require",
            ImportType::RequireRelative => "require_relative",
            ImportType::Go => "go",
            ImportType::Rust => "rust",
            ImportType::Java => "java",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "es_import" => ImportType::EsImport,
            "es_export" => ImportType::EsExport,
            "commonjs" => ImportType::Commonjs,
            "python" => ImportType::Python,
            "require" => ImportType::Require,
            "require_relative" => ImportType::RequireRelative,
            "go" => ImportType::Go,
            "rust" => ImportType::Rust,
            "java" => ImportType::Java,
            _ => return None,
        })
    }
}

/// One name bound by an import statement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportBinding {
    pub imported_name: String,
    pub local_name: String,
    pub is_type_only: bool,
}

impl ImportBinding {
    pub fn plain(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            imported_name: name.clone(),
            local_name: name,
            is_type_only: false,
        }
    }

    pub fn aliased(imported: impl Into<String>, local: impl Into<String>) -> Self {
        Self {
            imported_name: imported.into(),
            local_name: local.into(),
            is_type_only: false,
        }
    }
}

/// An import as emitted by an extractor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedImport {
    pub file_path: String,
    pub line: u32,
    pub import_type: ImportType,
    pub module_specifier: String,
    pub resolved_path: Option<String>,
    pub bindings: Vec<ImportBinding>,
}

impl ExtractedImport {
    pub fn new(
        file_path: impl Into<String>,
        line: u32,
        import_type: ImportType,
        module_specifier: impl Into<String>,
    ) -> Self {
        let file_path = file_path.into();
        let module_specifier = module_specifier.into();
        let resolved_path = resolve_relative(&file_path, &module_specifier);
        Self {
            file_path,
            line,
            import_type,
            module_specifier,
            resolved_path,
            bindings: Vec::new(),
        }
    }

    pub fn with_bindings(mut self, bindings: Vec<ImportBinding>) -> Self {
        self.bindings = bindings;
        self
    }

    pub fn is_external(&self) -> bool {
        self.resolved_path.is_none()
    }
}

/// An import row as persisted in the structure index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Import {
    pub id: i64,
    pub commit_id: i64,
    pub file_path: String,
    pub line: u32,
    pub import_type: ImportType,
    pub module_specifier: String,
    pub resolved_path: Option<String>,
    pub bindings: Vec<ImportBinding>,
}

/// Best-effort resolution of a relative specifier against the importing
/// file's directory. Package specifiers resolve to `None`.
pub fn resolve_relative(from_file: &str, specifier: &str) -> Option<String> {
    if !specifier.starts_with("./") && !specifier.starts_with("../") {
        return None;
    }
    let mut parts: Vec<&str> = from_file.split('/').collect();
    parts.pop();
    for segment in specifier.split('/') {
        match segment {
            "." | "" => {}
            ".." => {
                parts.pop()?;
            }
            other => parts.push(other),
        }
    }
    Some(parts.join("/"))
}

/// True when `resolved` points at `file_path` modulo a source extension and
/// an optional `/index` suffix (the conventions relative imports omit).
pub fn resolved_matches_file(resolved: &str, file_path: &str) -> bool {
    if resolved == file_path {
        return true;
    }
    let stem = file_path
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(file_path);
    resolved == stem || format!("{}/index", resolved) == stem
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_import_type_roundtrip() {
        for import_type in [
            ImportType::EsImport,
            ImportType::Commonjs,
            ImportType::RequireRelative,
            ImportType::Rust,
        ] {
            assert_eq!(ImportType::parse(import_type.as_str()), Some(import_type));
        }
        assert_eq!(ImportType::parse("other"), None);
    }

    #[test]
    fn test_resolve_relative() {
        assert_eq!(
            resolve_relative("src/index.ts", "./utils"),
            Some("src/utils".to_string())
        );
        assert_eq!(
            resolve_relative("src/api/handler.ts", "../db/client"),
            Some("src/db/client".to_string())
        );
        assert_eq!(resolve_relative("src/index.ts", "lodash"), None);
        assert_eq!(resolve_relative("index.ts", "../../escape"), None);
    }

    #[test]
    fn test_resolved_matches_file() {
        assert!(resolved_matches_file("src/utils", "src/utils.ts"));
        assert!(resolved_matches_file("src/utils.ts", "src/utils.ts"));
        assert!(resolved_matches_file("src/db", "src/db/index.js"));
        assert!(!resolved_matches_file("src/utils", "src/other.ts"));
    }

    #[test]
    fn test_external_detection() {
        let relative = ExtractedImport::new("src/index.ts", 1, ImportType::EsImport, "./utils");
        let external = ExtractedImport::new("src/index.ts", 2, ImportType::EsImport, "lodash");
        assert!(!relative.is_external());
        assert!(external.is_external());
    }
}
