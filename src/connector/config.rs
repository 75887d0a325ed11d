use std::collections::HashMap;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::DomainError;

/// Persistent configuration, stored as JSON in the per-user config directory
/// (`~/.config/sourcerack/config.json` on Linux and the platform equivalents
/// elsewhere). Unknown keys are rejected.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct AppConfig {
    pub storage: StorageConfig,
    pub vector_storage: VectorStorageConfig,
    pub embedding: EmbeddingConfig,
    pub indexing: IndexingConfig,
    pub gc: GcConfig,
    pub groups: HashMap<String, RepoGroup>,
    pub default_group: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct StorageConfig {
    pub database_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum VectorProvider {
    /// Embedded file-based store in the same DuckDB file as the metadata.
    #[default]
    Duckdb,
    /// External Qdrant instance over HTTP.
    Qdrant,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct VectorStorageConfig {
    pub provider: VectorProvider,
    pub qdrant: Option<QdrantOptions>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct QdrantOptions {
    pub url: String,
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

fn default_collection() -> String {
    "sourcerack".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Deterministic hash-seeded vectors, no model required.
    #[default]
    Hash,
    /// Remote HTTP embedding service (`POST /embed`).
    Remote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct EmbeddingConfig {
    pub enabled: bool,
    pub provider: EmbeddingProvider,
    pub model: String,
    pub batch_size: usize,
    pub remote_url: Option<String>,
    pub remote_api_key: Option<String>,
    pub dimensions: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            provider: EmbeddingProvider::Hash,
            model: "hash-embedding".to_string(),
            batch_size: 32,
            remote_url: None,
            remote_api_key: None,
            dimensions: 384,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct IndexingConfig {
    pub chunk_size: ChunkSizeConfig,
    pub languages: Vec<String>,
    pub exclude_patterns: Vec<String>,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            chunk_size: ChunkSizeConfig::default(),
            languages: Vec::new(),
            exclude_patterns: vec![
                "*.min.js".to_string(),
                "*node_modules/*".to_string(),
                "*vendor/*".to_string(),
                "*.lock".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct ChunkSizeConfig {
    pub min: usize,
    pub max: usize,
}

impl Default for ChunkSizeConfig {
    fn default() -> Self {
        Self {
            min: 10,
            max: 20_000,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct GcConfig {
    pub retention_days: u32,
}

impl Default for GcConfig {
    fn default() -> Self {
        Self { retention_days: 30 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RepoGroup {
    pub repos: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl AppConfig {
    /// Default config file location in the per-user config directory.
    pub fn default_path() -> Result<PathBuf, DomainError> {
        let dirs = ProjectDirs::from("dev", "sourcerack", "sourcerack")
            .ok_or_else(|| DomainError::internal("Cannot determine config directory"))?;
        Ok(dirs.config_dir().join("config.json"))
    }

    /// Default data directory for the database when the config is silent.
    pub fn default_data_dir() -> Result<PathBuf, DomainError> {
        let dirs = ProjectDirs::from("dev", "sourcerack", "sourcerack")
            .ok_or_else(|| DomainError::internal("Cannot determine data directory"))?;
        Ok(dirs.data_dir().to_path_buf())
    }

    /// Load from `path` (or the default location). A missing file yields the
    /// defaults; a malformed or unknown-keyed file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, DomainError> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::default_path()?,
        };
        if !path.exists() {
            debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(&path)
            .map_err(|e| DomainError::invalid_argument(format!("Cannot read config: {}", e)))?;
        let config: Self = serde_json::from_str(&text).map_err(|e| {
            DomainError::invalid_argument(format!("Invalid config {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: Option<&Path>) -> Result<(), DomainError> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::default_path()?,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string_pretty(self)
            .map_err(|e| DomainError::internal(format!("Cannot serialize config: {}", e)))?;
        std::fs::write(&path, text)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.embedding.batch_size == 0 {
            return Err(DomainError::invalid_argument(
                "embedding.batchSize must be positive",
            ));
        }
        if self.embedding.dimensions == 0 {
            return Err(DomainError::invalid_argument(
                "embedding.dimensions must be positive",
            ));
        }
        if self.indexing.chunk_size.min >= self.indexing.chunk_size.max {
            return Err(DomainError::invalid_argument(
                "indexing.chunkSize.min must be below max",
            ));
        }
        if self.embedding.provider == EmbeddingProvider::Remote
            && self.embedding.enabled
            && self.embedding.remote_url.is_none()
        {
            return Err(DomainError::invalid_argument(
                "embedding.remoteUrl is required for the remote provider",
            ));
        }
        if self.vector_storage.provider == VectorProvider::Qdrant
            && self.vector_storage.qdrant.is_none()
        {
            return Err(DomainError::invalid_argument(
                "vectorStorage.qdrant options are required for the qdrant provider",
            ));
        }
        if let Some(group) = &self.default_group {
            if !self.groups.contains_key(group) {
                return Err(DomainError::invalid_argument(format!(
                    "defaultGroup '{}' is not defined in groups",
                    group
                )));
            }
        }
        Ok(())
    }

    /// Resolve a group name to its repo list.
    pub fn group(&self, name: &str) -> Result<&RepoGroup, DomainError> {
        self.groups.get(name).ok_or_else(|| {
            DomainError::invalid_argument(format!("Unknown repo group '{}'", name))
        })
    }

    pub fn database_path(&self) -> Result<PathBuf, DomainError> {
        match &self.storage.database_path {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::default_data_dir()?.join("sourcerack.duckdb")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        AppConfig::default().validate().unwrap();
    }

    #[test]
    fn test_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut config = AppConfig::default();
        config.gc.retention_days = 7;
        config.groups.insert(
            "backend".to_string(),
            RepoGroup {
                repos: vec!["/work/api".to_string()],
                description: Some("API services".to_string()),
            },
        );
        config.default_group = Some("backend".to_string());
        config.save(Some(&path)).unwrap();

        let loaded = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(loaded.gc.retention_days, 7);
        assert_eq!(loaded.group("backend").unwrap().repos.len(), 1);
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"storage": {}, "surprise": true}"#).unwrap();
        let err = AppConfig::load(Some(&path)).unwrap_err();
        assert!(matches!(err, DomainError::InvalidArgument(_)));
    }

    #[test]
    fn test_remote_provider_requires_url() {
        let mut config = AppConfig::default();
        config.embedding.provider = EmbeddingProvider::Remote;
        assert!(config.validate().is_err());
        config.embedding.remote_url = Some("http://localhost:9000".to_string());
        config.validate().unwrap();
    }

    #[test]
    fn test_default_group_must_exist() {
        let mut config = AppConfig::default();
        config.default_group = Some("nope".to_string());
        assert!(config.validate().is_err());
    }
}
