use std::sync::Arc;

use anyhow::Result;
use tracing::debug;

use crate::application::{
    CallGraphUseCase, CodeParser, CodebaseSummaryUseCase, DeadCodeUseCase, DeleteRepositoryUseCase,
    DependencyGraphUseCase, EmbeddingService, EndpointDetection, FindDefinitionUseCase,
    FindEndpointsUseCase, FindHierarchyUseCase, FindImportsUseCase, FindUsagesUseCase, GcUseCase,
    GitView, ImpactAnalysisUseCase, IndexCommitUseCase, IndexSettings, ListRepositoriesUseCase,
    MetadataStore, ScopeResolver, SearchCodeUseCase, StructureIndex, SymbolContextUseCase,
    SymbolExtraction, VectorRepository,
};
use crate::connector::config::{AppConfig, EmbeddingProvider, VectorProvider};
use crate::connector::embedding::{HashEmbedding, RemoteEmbedding};
use crate::connector::git::GitCliView;
use crate::connector::parser::{
    ChunkLimits, EndpointRegistry, ExtractorRegistry, LanguageRegistry, TreeSitterChunker,
};
use crate::connector::storage::{
    DuckdbMetadataStore, DuckdbStructureIndex, DuckdbVectorStore, QdrantVectorStore,
};

/// Builds the adapter graph once per process. Query commands open the
/// database read-only so they can run next to an indexer.
pub struct Container {
    config: AppConfig,
    git: Arc<dyn GitView>,
    metadata: Arc<dyn MetadataStore>,
    structure: Arc<dyn StructureIndex>,
    vector: Arc<dyn VectorRepository>,
    embedding: Arc<dyn EmbeddingService>,
    parser: Arc<dyn CodeParser>,
    extractor: Arc<dyn SymbolExtraction>,
    endpoints: Arc<dyn EndpointDetection>,
}

impl Container {
    pub async fn new(config: AppConfig, read_only: bool) -> Result<Self> {
        let db_path = config.database_path()?;
        if !read_only {
            if let Some(parent) = db_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
        }
        debug!("Opening database at {}", db_path.display());

        let metadata_store = if read_only {
            Arc::new(DuckdbMetadataStore::new_read_only(&db_path)?)
        } else {
            Arc::new(DuckdbMetadataStore::new(&db_path)?)
        };
        let shared_conn = metadata_store.shared_connection();

        let structure: Arc<dyn StructureIndex> = if read_only {
            Arc::new(DuckdbStructureIndex::with_connection_no_init(Arc::clone(&shared_conn)).await?)
        } else {
            Arc::new(DuckdbStructureIndex::with_connection(Arc::clone(&shared_conn)).await?)
        };

        let dimensions = config.embedding.dimensions;
        let vector: Arc<dyn VectorRepository> = match config.vector_storage.provider {
            VectorProvider::Duckdb => {
                let store = if read_only {
                    DuckdbVectorStore::new_read_only(shared_conn, dimensions)
                } else {
                    DuckdbVectorStore::new(shared_conn, dimensions)
                };
                Arc::new(store)
            }
            VectorProvider::Qdrant => {
                let options = config
                    .vector_storage
                    .qdrant
                    .as_ref()
                    .ok_or_else(|| anyhow::anyhow!("qdrant options missing"))?;
                Arc::new(QdrantVectorStore::new(
                    &options.url,
                    &options.collection,
                    options.api_key.clone(),
                    dimensions,
                ))
            }
        };
        vector.initialize().await?;

        let embedding: Arc<dyn EmbeddingService> = match config.embedding.provider {
            EmbeddingProvider::Hash => Arc::new(HashEmbedding::with_dimensions(dimensions)),
            EmbeddingProvider::Remote => {
                let url = config
                    .embedding
                    .remote_url
                    .as_deref()
                    .ok_or_else(|| anyhow::anyhow!("embedding.remoteUrl missing"))?;
                Arc::new(RemoteEmbedding::new(
                    url,
                    config.embedding.remote_api_key.clone(),
                    dimensions,
                ))
            }
        };

        let registry = LanguageRegistry::new()?;
        let parser: Arc<dyn CodeParser> = Arc::new(TreeSitterChunker::new(
            Arc::clone(&registry),
            ChunkLimits {
                min_chars: config.indexing.chunk_size.min,
                max_chars: config.indexing.chunk_size.max,
            },
        ));
        let extractor: Arc<dyn SymbolExtraction> = Arc::new(ExtractorRegistry::new(registry));
        let endpoints: Arc<dyn EndpointDetection> = Arc::new(EndpointRegistry::new());

        Ok(Self {
            config,
            git: Arc::new(GitCliView::new()),
            metadata: metadata_store,
            structure,
            vector,
            embedding,
            parser,
            extractor,
            endpoints,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn metadata(&self) -> Arc<dyn MetadataStore> {
        Arc::clone(&self.metadata)
    }

    pub fn structure(&self) -> Arc<dyn StructureIndex> {
        Arc::clone(&self.structure)
    }

    pub fn vector(&self) -> Arc<dyn VectorRepository> {
        Arc::clone(&self.vector)
    }

    /// Readiness probe for the embedding provider (remote services may be
    /// down; fail before starting a long indexing run).
    pub async fn ensure_embedding_ready(&self) -> Result<()> {
        if self.config.embedding.enabled {
            self.embedding.initialize().await?;
        }
        Ok(())
    }

    pub fn scope_resolver(&self) -> ScopeResolver {
        ScopeResolver::new(Arc::clone(&self.git), Arc::clone(&self.metadata))
    }

    pub fn index_use_case(&self) -> IndexCommitUseCase {
        IndexCommitUseCase::new(
            Arc::clone(&self.git),
            Arc::clone(&self.metadata),
            Arc::clone(&self.structure),
            Arc::clone(&self.vector),
            Arc::clone(&self.embedding),
            Arc::clone(&self.parser),
            Arc::clone(&self.extractor),
            Arc::clone(&self.endpoints),
            IndexSettings {
                embedding_enabled: self.config.embedding.enabled,
                embedding_batch_size: self.config.embedding.batch_size,
                exclude_patterns: self.config.indexing.exclude_patterns.clone(),
                languages: self.config.indexing.languages.clone(),
                retention_days: self.config.gc.retention_days,
            },
        )
    }

    pub fn search_use_case(&self) -> SearchCodeUseCase {
        SearchCodeUseCase::new(Arc::clone(&self.vector), Arc::clone(&self.embedding))
    }

    pub fn find_definition(&self) -> FindDefinitionUseCase {
        FindDefinitionUseCase::new(Arc::clone(&self.structure))
    }

    pub fn find_usages(&self) -> FindUsagesUseCase {
        FindUsagesUseCase::new(
            Arc::clone(&self.structure),
            Arc::clone(&self.metadata),
            Arc::clone(&self.git),
        )
    }

    pub fn find_hierarchy(&self) -> FindHierarchyUseCase {
        FindHierarchyUseCase::new(Arc::clone(&self.structure))
    }

    pub fn find_imports(&self) -> FindImportsUseCase {
        FindImportsUseCase::new(Arc::clone(&self.structure))
    }

    pub fn find_endpoints(&self) -> FindEndpointsUseCase {
        FindEndpointsUseCase::new(Arc::clone(&self.structure))
    }

    pub fn call_graph(&self) -> CallGraphUseCase {
        CallGraphUseCase::new(Arc::clone(&self.structure))
    }

    pub fn impact_analysis(&self) -> ImpactAnalysisUseCase {
        ImpactAnalysisUseCase::new(Arc::clone(&self.structure))
    }

    pub fn dead_code(&self) -> DeadCodeUseCase {
        DeadCodeUseCase::new(Arc::clone(&self.structure))
    }

    pub fn symbol_context(&self) -> SymbolContextUseCase {
        SymbolContextUseCase::new(
            Arc::clone(&self.structure),
            Arc::clone(&self.metadata),
            Arc::clone(&self.git),
        )
    }

    pub fn codebase_summary(&self) -> CodebaseSummaryUseCase {
        CodebaseSummaryUseCase::new(Arc::clone(&self.structure), Arc::clone(&self.metadata))
    }

    pub fn dependency_graph(&self) -> DependencyGraphUseCase {
        DependencyGraphUseCase::new(Arc::clone(&self.structure))
    }

    pub fn gc(&self) -> GcUseCase {
        GcUseCase::new(
            Arc::clone(&self.metadata),
            Arc::clone(&self.structure),
            Arc::clone(&self.vector),
        )
    }

    pub fn list_repositories(&self) -> ListRepositoriesUseCase {
        ListRepositoriesUseCase::new(Arc::clone(&self.metadata))
    }

    pub fn delete_repository(&self) -> DeleteRepositoryUseCase {
        DeleteRepositoryUseCase::new(
            Arc::clone(&self.metadata),
            Arc::clone(&self.structure),
            Arc::clone(&self.vector),
        )
    }
}
