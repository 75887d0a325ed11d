use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::application::{MetadataStore, StructureIndex, VectorRepository};
use crate::domain::{models::current_timestamp, DomainError};

/// Outcome of one GC pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GcReport {
    pub commits_deleted: usize,
    pub chunks_deleted: usize,
    pub dry_run: bool,
}

/// Garbage collector (C13): removes aged-out superseded commits, the chunks
/// only they referenced, and their structure-index rows. Chunks survive in
/// vector storage as long as any commit still references them.
pub struct GcUseCase {
    metadata: Arc<dyn MetadataStore>,
    structure: Arc<dyn StructureIndex>,
    vector: Arc<dyn VectorRepository>,
}

impl GcUseCase {
    pub fn new(
        metadata: Arc<dyn MetadataStore>,
        structure: Arc<dyn StructureIndex>,
        vector: Arc<dyn VectorRepository>,
    ) -> Self {
        Self {
            metadata,
            structure,
            vector,
        }
    }

    pub async fn execute(&self, dry_run: bool) -> Result<GcReport, DomainError> {
        let eligible = self.metadata.get_eligible_for_gc(current_timestamp()).await?;
        if eligible.is_empty() {
            debug!("GC: nothing eligible");
            return Ok(GcReport {
                dry_run,
                ..GcReport::default()
            });
        }

        let commit_ids: Vec<i64> = eligible.iter().map(|c| c.id()).collect();
        let orphaned_chunks = self.metadata.chunks_only_in(&commit_ids).await?;

        if dry_run {
            info!(
                "GC dry run: would delete {} commits and {} chunks",
                commit_ids.len(),
                orphaned_chunks.len()
            );
            return Ok(GcReport {
                commits_deleted: commit_ids.len(),
                chunks_deleted: orphaned_chunks.len(),
                dry_run,
            });
        }

        // Vector chunks first, then refs/commits, then the SQI cascade —
        // a crash mid-way leaves only re-collectable leftovers.
        if !orphaned_chunks.is_empty() {
            self.vector.delete_chunks(&orphaned_chunks).await?;
        }
        self.structure.delete_commits(&commit_ids).await?;
        self.metadata.delete_commits(&commit_ids).await?;

        info!(
            "GC removed {} commits and {} chunks",
            commit_ids.len(),
            orphaned_chunks.len()
        );
        Ok(GcReport {
            commits_deleted: commit_ids.len(),
            chunks_deleted: orphaned_chunks.len(),
            dry_run,
        })
    }
}
