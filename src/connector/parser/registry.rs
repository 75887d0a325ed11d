use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use tokio::sync::{Mutex, Notify};
use tracing::{debug, warn};

use crate::domain::{DomainError, Language};

/// Default registry document compiled into the binary.
const DEFAULT_REGISTRY: &str = include_str!("../../../languages.yaml");

#[derive(Debug, Deserialize)]
struct RegistryFile {
    languages: HashMap<String, LanguageEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LanguageEntry {
    #[serde(default)]
    pub extensions: Vec<String>,
    #[serde(default)]
    pub grammar: Option<String>,
    #[serde(default = "default_tier")]
    pub tier: GrammarTier,
    #[serde(default)]
    pub filenames: Vec<String>,
}

fn default_tier() -> GrammarTier {
    GrammarTier::Optional
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GrammarTier {
    Core,
    Optional,
}

/// Maps file paths to language IDs and hands out loaded grammars. Grammar
/// loads are serialised per package through an in-flight set so concurrent
/// callers for the same package wait on one load.
pub struct LanguageRegistry {
    by_extension: HashMap<String, Language>,
    by_filename: HashMap<String, Language>,
    entries: HashMap<Language, LanguageEntry>,
    loaded: Mutex<HashMap<Language, tree_sitter::Language>>,
    in_flight: Mutex<HashSet<Language>>,
    load_done: Notify,
}

impl LanguageRegistry {
    /// Build from the embedded default registry document.
    pub fn new() -> Result<Arc<Self>, DomainError> {
        Self::from_yaml(DEFAULT_REGISTRY)
    }

    /// Build from a registry file on disk.
    pub fn from_file(path: &Path) -> Result<Arc<Self>, DomainError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| DomainError::invalid_argument(format!("Cannot read registry: {}", e)))?;
        Self::from_yaml(&text)
    }

    pub fn from_yaml(text: &str) -> Result<Arc<Self>, DomainError> {
        let file: RegistryFile = serde_yaml::from_str(text)
            .map_err(|e| DomainError::invalid_argument(format!("Invalid registry YAML: {}", e)))?;

        let mut by_extension = HashMap::new();
        let mut by_filename = HashMap::new();
        let mut entries = HashMap::new();
        for (id, entry) in file.languages {
            let language = Language::parse(&id);
            if !language.is_known() {
                warn!("Skipping unknown language id '{}' in registry", id);
                continue;
            }
            for ext in &entry.extensions {
                by_extension.insert(ext.to_lowercase(), language);
            }
            for name in &entry.filenames {
                by_filename.insert(name.clone(), language);
            }
            entries.insert(language, entry);
        }

        Ok(Arc::new(Self {
            by_extension,
            by_filename,
            entries,
            loaded: Mutex::new(HashMap::new()),
            in_flight: Mutex::new(HashSet::new()),
            load_done: Notify::new(),
        }))
    }

    /// Resolve a path to a language: extension first, then basename (for
    /// files like `Gemfile`).
    pub fn language_for(&self, path: &str) -> Language {
        let path = Path::new(path);
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            if let Some(language) = self.by_extension.get(&ext.to_lowercase()) {
                return *language;
            }
        }
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            if let Some(language) = self.by_filename.get(name) {
                return *language;
            }
        }
        Language::Unknown
    }

    pub fn entry(&self, language: Language) -> Option<&LanguageEntry> {
        self.entries.get(&language)
    }

    /// Statically linked grammar for a core-tier language.
    fn static_grammar(language: Language) -> Option<tree_sitter::Language> {
        match language {
            Language::Rust => Some(tree_sitter_rust::LANGUAGE.into()),
            Language::Python => Some(tree_sitter_python::LANGUAGE.into()),
            Language::JavaScript => Some(tree_sitter_javascript::LANGUAGE.into()),
            Language::TypeScript => Some(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
            Language::Go => Some(tree_sitter_go::LANGUAGE.into()),
            _ => None,
        }
    }

    /// Idempotent grammar load. Concurrent calls for the same language share
    /// one load; callers for other languages proceed independently.
    pub async fn ensure_grammar(&self, language: Language) -> Result<(), DomainError> {
        loop {
            // Register for the wakeup before checking state, so a load that
            // finishes in between is not missed.
            let load_finished = self.load_done.notified();
            if self.loaded.lock().await.contains_key(&language) {
                return Ok(());
            }
            {
                let mut in_flight = self.in_flight.lock().await;
                if !in_flight.contains(&language) {
                    in_flight.insert(language);
                    break;
                }
            }
            // Another caller is loading this package; wait for it.
            load_finished.await;
        }

        let result = match Self::static_grammar(language) {
            Some(grammar) => {
                debug!("Loaded grammar for {}", language);
                self.loaded.lock().await.insert(language, grammar);
                Ok(())
            }
            None => {
                let package = self
                    .entries
                    .get(&language)
                    .and_then(|e| e.grammar.clone())
                    .unwrap_or_else(|| format!("tree-sitter-{}", language));
                Err(DomainError::grammar(format!(
                    "{} ({}) is not linked into this build",
                    language, package
                )))
            }
        };

        self.in_flight.lock().await.remove(&language);
        self.load_done.notify_waiters();
        result
    }

    /// The loaded grammar, if `ensure_grammar` succeeded for this language.
    pub async fn loaded_grammar(&self, language: Language) -> Option<tree_sitter::Language> {
        self.loaded.lock().await.get(&language).cloned()
    }

    /// Languages in the registry whose grammar is not statically linked.
    pub fn missing_grammars(&self, languages: &[Language]) -> Vec<Language> {
        languages
            .iter()
            .copied()
            .filter(|l| {
                self.entries
                    .get(l)
                    .map(|e| e.grammar.is_some() && e.tier == GrammarTier::Optional)
                    .unwrap_or(false)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_language_for_extension_and_basename() {
        let registry = LanguageRegistry::new().unwrap();
        assert_eq!(registry.language_for("src/lib.rs"), Language::Rust);
        assert_eq!(registry.language_for("app/page.tsx"), Language::TypeScript);
        assert_eq!(registry.language_for("Gemfile"), Language::Ruby);
        assert_eq!(registry.language_for("a.bin"), Language::Unknown);
    }

    #[tokio::test]
    async fn test_ensure_grammar_core_tier() {
        let registry = LanguageRegistry::new().unwrap();
        registry.ensure_grammar(Language::Rust).await.unwrap();
        assert!(registry.loaded_grammar(Language::Rust).await.is_some());
        // Idempotent
        registry.ensure_grammar(Language::Rust).await.unwrap();
    }

    #[tokio::test]
    async fn test_ensure_grammar_optional_tier_unavailable() {
        let registry = LanguageRegistry::new().unwrap();
        let err = registry.ensure_grammar(Language::Ruby).await.unwrap_err();
        assert!(matches!(err, DomainError::GrammarUnavailable(_)));
        assert!(registry.loaded_grammar(Language::Ruby).await.is_none());
    }

    #[tokio::test]
    async fn test_concurrent_ensures_share_one_load() {
        let registry = LanguageRegistry::new().unwrap();
        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                tokio::spawn(async move { registry.ensure_grammar(Language::Python).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }
        assert!(registry.loaded_grammar(Language::Python).await.is_some());
    }

    #[test]
    fn test_invalid_yaml_rejected() {
        assert!(LanguageRegistry::from_yaml("languages: [").is_err());
    }
}
