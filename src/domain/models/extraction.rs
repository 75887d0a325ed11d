use serde::{Deserialize, Serialize};

use super::{ExtractedImport, ExtractedSymbol, ExtractedUsage};

/// Everything a symbol extractor produced for one file. Extraction failures
/// are per-file: the result is empty with `error` set, and the commit
/// continues.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileExtraction {
    pub symbols: Vec<ExtractedSymbol>,
    pub usages: Vec<ExtractedUsage>,
    pub imports: Vec<ExtractedImport>,
    pub error: Option<String>,
}

impl FileExtraction {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty() && self.usages.is_empty() && self.imports.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_extraction_is_empty() {
        let extraction = FileExtraction::failed("boom");
        assert!(extraction.is_empty());
        assert_eq!(extraction.error.as_deref(), Some("boom"));
    }
}
