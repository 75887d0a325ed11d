use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::application::{
    ChunkPayload, CodeParser, EmbeddingService, EndpointDetection, GitView, MetadataStore,
    StructureIndex, SymbolExtraction, VectorRepository,
};
use crate::domain::{
    deduplicate, looks_binary, models::current_timestamp, Chunk, ContentType, DomainError,
    EmbeddingStatus, ExtractedEndpoint, FileExtraction, ProgressEvent, ProgressObserver,
    Repository, TreeEntry,
};

use super::link_usages::UsageLinker;

const EMBED_RETRIES: u32 = 3;
const BLOB_READ_CONCURRENCY: usize = 8;

/// Options for one indexing run.
#[derive(Debug, Clone)]
pub struct IndexOptions {
    pub commit_ref: String,
    /// Wipe any prior records for this (repo, commit) before indexing.
    pub force: bool,
    /// SQI-only mode: skip embedding and vector upserts entirely.
    pub skip_embeddings: bool,
    /// Override the repository display name on first indexing.
    pub name: Option<String>,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            commit_ref: "HEAD".to_string(),
            force: false,
            skip_embeddings: false,
            name: None,
        }
    }
}

/// Pipeline tuning pulled from configuration.
#[derive(Debug, Clone)]
pub struct IndexSettings {
    pub embedding_enabled: bool,
    pub embedding_batch_size: usize,
    pub exclude_patterns: Vec<String>,
    /// When non-empty, only files resolving to these language IDs index.
    pub languages: Vec<String>,
    pub retention_days: u32,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            embedding_enabled: true,
            embedding_batch_size: 32,
            exclude_patterns: Vec::new(),
            languages: Vec::new(),
            retention_days: 30,
        }
    }
}

/// What one indexing run did.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexReport {
    pub repo_name: String,
    pub repo_id: String,
    pub commit_sha: String,
    pub commit_id: i64,
    pub files_total: usize,
    pub files_parsed: usize,
    pub files_reused: usize,
    pub files_binary_skipped: usize,
    pub chunks_created: usize,
    pub chunks_reused: usize,
    pub symbols: u64,
    pub usages: u64,
    pub imports: u64,
    pub endpoints: u64,
    pub file_errors: Vec<(String, String)>,
    pub duration_secs: f64,
    pub already_indexed: bool,
}

/// Everything extracted from one parsed file, kept in file order so database
/// insertion stays deterministic.
struct ParsedFile {
    entry: TreeEntry,
    extraction: FileExtraction,
    endpoints: Vec<ExtractedEndpoint>,
}

/// The indexing orchestrator (C11): drives one (repo_path, commit_ref)
/// through reuse/parse splitting, chunking, extraction, embedding, and
/// structure-index persistence, then links usages and completes the commit.
pub struct IndexCommitUseCase {
    git: Arc<dyn GitView>,
    metadata: Arc<dyn MetadataStore>,
    structure: Arc<dyn StructureIndex>,
    vector: Arc<dyn VectorRepository>,
    embedding: Arc<dyn EmbeddingService>,
    parser: Arc<dyn CodeParser>,
    extractor: Arc<dyn SymbolExtraction>,
    endpoint_detection: Arc<dyn EndpointDetection>,
    settings: IndexSettings,
}

impl IndexCommitUseCase {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        git: Arc<dyn GitView>,
        metadata: Arc<dyn MetadataStore>,
        structure: Arc<dyn StructureIndex>,
        vector: Arc<dyn VectorRepository>,
        embedding: Arc<dyn EmbeddingService>,
        parser: Arc<dyn CodeParser>,
        extractor: Arc<dyn SymbolExtraction>,
        endpoint_detection: Arc<dyn EndpointDetection>,
        settings: IndexSettings,
    ) -> Self {
        Self {
            git,
            metadata,
            structure,
            vector,
            embedding,
            parser,
            extractor,
            endpoint_detection,
            settings,
        }
    }

    pub async fn execute(
        &self,
        repo_path: &str,
        options: IndexOptions,
        observer: ProgressObserver,
    ) -> Result<IndexReport, DomainError> {
        let identity = self.git.repository_identity(Path::new(repo_path)).await?;
        let read_root = PathBuf::from(&identity.root);
        let commit_sha = self
            .git
            .resolve_ref(&read_root, &options.commit_ref)
            .await?;

        let repo_name = options.name.clone().unwrap_or_else(|| {
            Path::new(&identity.identity_path)
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("repository")
                .to_string()
        });
        let repo = self
            .metadata
            .get_or_create_repository(&identity.identity_path, &repo_name)
            .await?;

        if let Some(existing) = self.metadata.find_commit(repo.id(), &commit_sha).await? {
            if existing.status().is_complete() && !options.force {
                info!(
                    "Commit {} of {} already indexed ({} chunks)",
                    existing.short_sha(),
                    repo.name(),
                    existing.chunk_count()
                );
                return Ok(IndexReport {
                    repo_name: repo.name().to_string(),
                    repo_id: repo.id().to_string(),
                    commit_sha,
                    commit_id: existing.id(),
                    files_total: 0,
                    files_parsed: 0,
                    files_reused: 0,
                    files_binary_skipped: 0,
                    chunks_created: 0,
                    chunks_reused: existing.chunk_count() as usize,
                    symbols: 0,
                    usages: 0,
                    imports: 0,
                    endpoints: 0,
                    file_errors: Vec::new(),
                    duration_secs: 0.0,
                    already_indexed: true,
                });
            }
            // Forced re-index, or a failed/stale in-progress record: wipe.
            self.wipe_commit(existing.id()).await?;
        }

        let embedding_status = if options.skip_embeddings || !self.settings.embedding_enabled {
            EmbeddingStatus::None
        } else {
            EmbeddingStatus::Pending
        };
        let commit = self
            .metadata
            .start_indexing(repo.id(), &commit_sha, embedding_status)
            .await?;
        observer(ProgressEvent::Started {
            commit_sha: commit_sha.clone(),
        });

        match self
            .run(&repo, &read_root, &commit_sha, commit.id(), &options, &observer)
            .await
        {
            Ok(report) => {
                observer(ProgressEvent::Completed {
                    chunk_count: (report.chunks_created + report.chunks_reused) as u64,
                });
                Ok(report)
            }
            Err(e) => {
                warn!("Indexing failed for {}: {}", commit_sha, e);
                observer(ProgressEvent::Failed {
                    message: e.to_string(),
                });
                self.metadata.fail_indexing(commit.id()).await.ok();
                Err(e)
            }
        }
    }

    async fn wipe_commit(&self, commit_id: i64) -> Result<(), DomainError> {
        debug!("Wiping prior records for commit {}", commit_id);
        let orphans = self.metadata.chunks_only_in(&[commit_id]).await?;
        if !orphans.is_empty() {
            self.vector.delete_chunks(&orphans).await?;
        }
        self.structure.delete_commits(&[commit_id]).await?;
        self.metadata.delete_commits(&[commit_id]).await?;
        Ok(())
    }

    async fn run(
        &self,
        repo: &Repository,
        read_root: &Path,
        commit_sha: &str,
        commit_id: i64,
        options: &IndexOptions,
        observer: &ProgressObserver,
    ) -> Result<IndexReport, DomainError> {
        let start_time = Instant::now();

        // ── Enumerate tracked files, apply exclusions ────────────────────
        let entries: Vec<TreeEntry> = self
            .git
            .list_files(read_root, commit_sha)
            .await?
            .into_iter()
            .filter(|entry| entry.is_regular_file())
            .filter(|entry| {
                !self
                    .settings
                    .exclude_patterns
                    .iter()
                    .any(|pattern| crate::domain::wildcard_match(pattern, &entry.path))
            })
            .filter(|entry| {
                self.settings.languages.is_empty()
                    || self
                        .settings
                        .languages
                        .iter()
                        .any(|l| self.parser.language_for(&entry.path).as_str() == l)
            })
            .collect();

        // ── Reuse/parse split by blob identity. Reuse skips the chunk and
        //    embedding pipeline; SQI rows are commit-scoped, so extraction
        //    still runs for every file ───────────────────────────────────
        let blob_shas: Vec<String> = entries.iter().map(|e| e.blob_sha.clone()).collect();
        let indexed_blobs = self.metadata.get_indexed_blobs(&blob_shas).await?;
        let reuse_entries: Vec<TreeEntry> = entries
            .iter()
            .filter(|entry| indexed_blobs.contains(&entry.blob_sha))
            .cloned()
            .collect();
        let parse_count = entries.len() - reuse_entries.len();

        observer(ProgressEvent::FilesListed {
            total: entries.len(),
            reused: reuse_entries.len(),
            to_parse: parse_count,
        });
        info!(
            "Indexing {} at {}: {} files ({} chunk-reused, {} to parse)",
            repo.name(),
            &commit_sha[..12.min(commit_sha.len())],
            entries.len(),
            reuse_entries.len(),
            parse_count
        );

        let grammar_languages: Vec<String> = {
            let mut languages: Vec<String> = entries
                .iter()
                .map(|e| self.parser.language_for(&e.path))
                .filter(|l| l.has_grammar())
                .map(|l| l.to_string())
                .collect();
            languages.sort();
            languages.dedup();
            languages
        };
        if !grammar_languages.is_empty() {
            observer(ProgressEvent::GrammarsInstalling {
                languages: grammar_languages,
            });
        }

        // ── Reused chunks come straight from blob→chunk mappings ─────────
        let reuse_shas: Vec<String> = reuse_entries.iter().map(|e| e.blob_sha.clone()).collect();
        let reuse_map = self.metadata.get_chunks_for_blobs(&reuse_shas).await?;
        let mut reused_chunk_ids: Vec<Uuid> = Vec::new();
        for entry in &reuse_entries {
            if let Some(ids) = reuse_map.get(&entry.blob_sha) {
                reused_chunk_ids.extend(ids.iter().copied());
            }
        }

        // ── Bounded-parallel blob reads over every file; `buffered` keeps
        //    results in input order ─────────────────────────────────────
        let total_files = entries.len();
        let git = Arc::clone(&self.git);
        let read_root_buf = read_root.to_path_buf();
        let mut blob_stream = futures_util::stream::iter(entries.clone().into_iter().map(
            move |entry| {
                let git = Arc::clone(&git);
                let root = read_root_buf.clone();
                async move {
                    let bytes = git.read_blob(&root, &entry.blob_sha).await;
                    (entry, bytes)
                }
            },
        ))
        .buffered(BLOB_READ_CONCURRENCY);

        let mut parsed_files: Vec<ParsedFile> = Vec::new();
        let mut file_errors: Vec<(String, String)> = Vec::new();
        let mut binary_skipped = 0usize;
        let mut seen_chunk_ids: HashSet<Uuid> = reused_chunk_ids.iter().copied().collect();
        let mut new_chunks: Vec<(Chunk, Uuid)> = Vec::new();
        let mut file_index = 0usize;

        while let Some((entry, bytes)) = blob_stream.next().await {
            file_index += 1;
            let bytes = match bytes {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!("Failed to read blob for {}: {}", entry.path, e);
                    file_errors.push((entry.path.clone(), e.to_string()));
                    continue;
                }
            };
            if looks_binary(&bytes) {
                binary_skipped += 1;
                continue;
            }
            let content = String::from_utf8_lossy(&bytes).into_owned();

            let extraction = self.extractor.extract(&entry.path, &content).await;
            if let Some(error) = &extraction.error {
                file_errors.push((entry.path.clone(), error.clone()));
            }
            let import_specifiers: Vec<String> = extraction
                .imports
                .iter()
                .map(|i| i.module_specifier.clone())
                .collect();
            let endpoints = self
                .endpoint_detection
                .detect(&entry.path, &content, &import_specifiers)
                .await;

            // Chunking and blob→chunk bookkeeping only for unseen blobs;
            // reused blobs already have their chunk set recorded.
            let chunks = if indexed_blobs.contains(&entry.blob_sha) {
                Vec::new()
            } else {
                let chunk_result = self.parser.chunk_file(&entry.path, &content).await?;
                if let Some(error) = &chunk_result.error {
                    file_errors.push((entry.path.clone(), error.clone()));
                }
                let chunks = deduplicate(chunk_result.chunks);
                let chunk_ids: Vec<Uuid> = chunks.iter().map(|(_, id)| *id).collect();
                self.metadata
                    .store_blob_chunks(&entry.blob_sha, &chunk_ids)
                    .await?;
                for (chunk, id) in &chunks {
                    if seen_chunk_ids.insert(*id) {
                        new_chunks.push((chunk.clone(), *id));
                    }
                }
                chunks
            };

            observer(ProgressEvent::FileParsed {
                path: entry.path.clone(),
                index: file_index,
                total: total_files,
                chunks: chunks.len(),
            });
            parsed_files.push(ParsedFile {
                entry,
                extraction,
                endpoints,
            });
        }

        // Deterministic insertion order regardless of read completion order.
        parsed_files.sort_by(|a, b| a.entry.path.cmp(&b.entry.path));

        // ── Embedding and vector upserts ─────────────────────────────────
        let skip_vectors = options.skip_embeddings || !self.settings.embedding_enabled;
        let mut chunks_embedded = 0usize;
        if !skip_vectors {
            let candidate_ids: Vec<Uuid> = new_chunks.iter().map(|(_, id)| *id).collect();
            let existing: HashSet<Uuid> = self
                .vector
                .chunks_exist(&candidate_ids)
                .await?
                .into_iter()
                .collect();

            // Chunks already stored (from other commits) just gain this
            // commit. Reused chunks may be missing from the vector store if
            // an earlier commit indexed in SQI-only mode; those are skipped.
            let stored_reused: HashSet<Uuid> = self
                .vector
                .chunks_exist(&reused_chunk_ids)
                .await?
                .into_iter()
                .collect();
            for id in stored_reused.iter().chain(existing.iter()) {
                self.vector.add_commit_to_chunk(*id, commit_sha).await?;
            }

            let to_embed: Vec<&(Chunk, Uuid)> = new_chunks
                .iter()
                .filter(|(_, id)| !existing.contains(id))
                .collect();
            for batch in to_embed.chunks(self.settings.embedding_batch_size.max(1)) {
                let texts: Vec<String> = batch
                    .iter()
                    .map(|(chunk, _)| {
                        format!(
                            "{} [{}] {}",
                            chunk.symbol(),
                            chunk.symbol_type(),
                            chunk.content()
                        )
                    })
                    .collect();
                let vectors = self.embed_with_retry(&texts).await?;
                observer(ProgressEvent::ChunksEmbedded { count: batch.len() });

                let payloads: Vec<ChunkPayload> = batch
                    .iter()
                    .zip(vectors)
                    .map(|((chunk, id), vector)| ChunkPayload {
                        chunk_id: *id,
                        chunk: chunk.clone(),
                        repo_id: repo.id().to_string(),
                        repo_name: repo.name().to_string(),
                        commit_sha: commit_sha.to_string(),
                        content_type: ContentType::classify(chunk.file_path(), chunk.language()),
                        vector,
                    })
                    .collect();
                self.vector.upsert_chunks(&payloads).await?;
                chunks_embedded += batch.len();
                observer(ProgressEvent::ChunksStored { count: batch.len() });
            }
        }

        // ── Chunk refs and file/blob snapshot ────────────────────────────
        let all_chunk_ids: Vec<Uuid> = seen_chunk_ids.iter().copied().collect();
        self.metadata
            .add_chunk_refs(commit_id, &all_chunk_ids)
            .await?;
        let file_blob_pairs: Vec<(String, String)> = entries
            .iter()
            .map(|e| (e.path.clone(), e.blob_sha.clone()))
            .collect();
        self.metadata
            .store_file_blobs(commit_id, &file_blob_pairs)
            .await?;

        // ── Structure index: all symbols first (document order per file),
        //    then usages, imports, and endpoints that reference them ──────
        let mut symbols_inserted = 0u64;
        for file in &parsed_files {
            let ids = self
                .structure
                .insert_symbols(repo.id(), commit_id, &file.extraction.symbols)
                .await?;
            symbols_inserted += ids.len() as u64;
        }
        let mut usages_inserted = 0u64;
        let mut imports_inserted = 0u64;
        let mut endpoints_inserted = 0u64;
        for file in &parsed_files {
            usages_inserted += self
                .structure
                .insert_usages(commit_id, &file.extraction.usages)
                .await?;
            imports_inserted += self
                .structure
                .insert_imports(commit_id, &file.extraction.imports)
                .await?;
            endpoints_inserted += self
                .structure
                .insert_endpoints(commit_id, &file.endpoints)
                .await?;
        }

        // ── Link usages to definitions ───────────────────────────────────
        let linker = UsageLinker::new(Arc::clone(&self.structure));
        linker.link_commit(commit_id).await?;

        // ── Supersede older commits, complete ────────────────────────────
        let eligible_at =
            current_timestamp() + self.settings.retention_days as i64 * 24 * 3600;
        self.metadata
            .mark_superseded(repo.id(), commit_id, eligible_at)
            .await?;
        self.metadata
            .complete_indexing(commit_id, all_chunk_ids.len() as u64)
            .await?;

        let duration = start_time.elapsed();
        info!(
            "Indexed {} files ({} chunks new, {} reused, {} embedded) in {:.2}s",
            entries.len(),
            new_chunks.len(),
            reused_chunk_ids.len(),
            chunks_embedded,
            duration.as_secs_f64()
        );

        Ok(IndexReport {
            repo_name: repo.name().to_string(),
            repo_id: repo.id().to_string(),
            commit_sha: commit_sha.to_string(),
            commit_id,
            files_total: entries.len(),
            files_parsed: parsed_files.len(),
            files_reused: reuse_entries.len(),
            files_binary_skipped: binary_skipped,
            chunks_created: new_chunks.len(),
            chunks_reused: reused_chunk_ids.len(),
            symbols: symbols_inserted,
            usages: usages_inserted,
            imports: imports_inserted,
            endpoints: endpoints_inserted,
            file_errors,
            duration_secs: duration.as_secs_f64(),
            already_indexed: false,
        })
    }

    /// Embedding failures retry with exponential backoff; exhaustion fails
    /// the whole commit.
    async fn embed_with_retry(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, DomainError> {
        let mut delay = Duration::from_millis(200);
        for attempt in 1..=EMBED_RETRIES {
            match self.embedding.embed_batch(texts).await {
                Ok(vectors) => return Ok(vectors),
                Err(e) if attempt < EMBED_RETRIES => {
                    warn!(
                        "Embedding attempt {}/{} failed: {}; retrying",
                        attempt, EMBED_RETRIES, e
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
                Err(e) => {
                    return Err(DomainError::embedding(format!(
                        "Embedding failed after {} attempts: {}",
                        EMBED_RETRIES, e
                    )))
                }
            }
        }
        unreachable!("retry loop always returns")
    }
}
