use sourcerack::{
    CommitStatus, DuckdbMetadataStore, EmbeddingStatus, MetadataStore,
};
use tempfile::tempdir;
use uuid::Uuid;

fn store() -> (tempfile::TempDir, DuckdbMetadataStore) {
    let dir = tempdir().expect("tempdir");
    let db_path = dir.path().join("sourcerack.duckdb");
    let store = DuckdbMetadataStore::new(&db_path).expect("duckdb init");
    (dir, store)
}

const SHA_A: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
const SHA_B: &str = "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";

#[tokio::test]
async fn repository_get_or_create_is_idempotent() {
    let (_dir, store) = store();
    let first = store
        .get_or_create_repository("/work/api", "api")
        .await
        .expect("create");
    let second = store
        .get_or_create_repository("/work/api", "renamed")
        .await
        .expect("get");
    assert_eq!(first.id(), second.id());
    assert_eq!(second.name(), "api");

    let listed = store.list_repositories().await.expect("list");
    assert_eq!(listed.len(), 1);
}

#[tokio::test]
async fn indexing_lifecycle_in_progress_to_complete() {
    let (_dir, store) = store();
    let repo = store
        .get_or_create_repository("/work/api", "api")
        .await
        .expect("repo");

    let commit = store
        .start_indexing(repo.id(), SHA_A, EmbeddingStatus::Pending)
        .await
        .expect("start");
    assert_eq!(commit.status(), CommitStatus::InProgress);

    store
        .complete_indexing(commit.id(), 42)
        .await
        .expect("complete");
    let reloaded = store
        .find_commit(repo.id(), SHA_A)
        .await
        .expect("find")
        .expect("exists");
    assert_eq!(reloaded.status(), CommitStatus::Complete);
    assert_eq!(reloaded.chunk_count(), 42);
    assert_eq!(reloaded.embedding_status(), EmbeddingStatus::Complete);

    // Completing twice is an error: the flip only leaves in_progress once.
    assert!(store.complete_indexing(commit.id(), 42).await.is_err());
}

#[tokio::test]
async fn duplicate_commit_record_rejected() {
    let (_dir, store) = store();
    let repo = store
        .get_or_create_repository("/work/api", "api")
        .await
        .expect("repo");
    store
        .start_indexing(repo.id(), SHA_A, EmbeddingStatus::None)
        .await
        .expect("start");
    assert!(store
        .start_indexing(repo.id(), SHA_A, EmbeddingStatus::None)
        .await
        .is_err());
}

#[tokio::test]
async fn failed_commits_stay_failed() {
    let (_dir, store) = store();
    let repo = store
        .get_or_create_repository("/work/api", "api")
        .await
        .expect("repo");
    let commit = store
        .start_indexing(repo.id(), SHA_A, EmbeddingStatus::None)
        .await
        .expect("start");
    store.fail_indexing(commit.id()).await.expect("fail");
    let reloaded = store
        .find_commit(repo.id(), SHA_A)
        .await
        .expect("find")
        .expect("exists");
    assert_eq!(reloaded.status(), CommitStatus::Failed);
}

#[tokio::test]
async fn chunk_refs_and_orphan_detection() {
    let (_dir, store) = store();
    let repo = store
        .get_or_create_repository("/work/api", "api")
        .await
        .expect("repo");
    let commit_a = store
        .start_indexing(repo.id(), SHA_A, EmbeddingStatus::None)
        .await
        .expect("start a");
    let commit_b = store
        .start_indexing(repo.id(), SHA_B, EmbeddingStatus::None)
        .await
        .expect("start b");

    let shared = Uuid::new_v4();
    let only_a = Uuid::new_v4();
    store
        .add_chunk_refs(commit_a.id(), &[shared, only_a])
        .await
        .expect("refs a");
    store
        .add_chunk_refs(commit_b.id(), &[shared])
        .await
        .expect("refs b");

    // Chunks referenced only by commit A are orphaned once A goes away.
    let orphans = store.chunks_only_in(&[commit_a.id()]).await.expect("orphans");
    assert_eq!(orphans, vec![only_a]);

    // Adding the same ref twice stays idempotent.
    store
        .add_chunk_refs(commit_a.id(), &[shared])
        .await
        .expect("refs again");
    let refs = store
        .chunk_refs_for_commit(commit_a.id())
        .await
        .expect("refs");
    assert_eq!(refs.len(), 2);
}

#[tokio::test]
async fn file_blobs_upsert_replaces_prior_mapping() {
    let (_dir, store) = store();
    let repo = store
        .get_or_create_repository("/work/api", "api")
        .await
        .expect("repo");
    let commit = store
        .start_indexing(repo.id(), SHA_A, EmbeddingStatus::None)
        .await
        .expect("start");

    store
        .store_file_blobs(commit.id(), &[("src/a.ts".to_string(), "blob1".to_string())])
        .await
        .expect("store");
    store
        .store_file_blobs(commit.id(), &[("src/a.ts".to_string(), "blob2".to_string())])
        .await
        .expect("upsert");

    let blobs = store.get_file_blobs(commit.id()).await.expect("blobs");
    assert_eq!(blobs.len(), 1);
    assert_eq!(blobs[0].blob_sha, "blob2");
}

#[tokio::test]
async fn blob_chunks_idempotent_and_queryable() {
    let (_dir, store) = store();
    let chunk_a = Uuid::new_v4();
    let chunk_b = Uuid::new_v4();

    store
        .store_blob_chunks("blob1", &[chunk_a, chunk_b])
        .await
        .expect("store");
    store
        .store_blob_chunks("blob1", &[chunk_a, chunk_b])
        .await
        .expect("store again");

    let indexed = store
        .get_indexed_blobs(&["blob1".to_string(), "blob9".to_string()])
        .await
        .expect("indexed");
    assert!(indexed.contains("blob1"));
    assert!(!indexed.contains("blob9"));

    let chunks = store
        .get_chunks_for_blobs(&["blob1".to_string()])
        .await
        .expect("chunks");
    assert_eq!(chunks.get("blob1").map(|c| c.len()), Some(2));
}

#[tokio::test]
async fn gc_candidates_and_cascade_delete() {
    let (_dir, store) = store();
    let repo = store
        .get_or_create_repository("/work/api", "api")
        .await
        .expect("repo");
    let old_commit = store
        .start_indexing(repo.id(), SHA_A, EmbeddingStatus::None)
        .await
        .expect("start old");
    store
        .complete_indexing(old_commit.id(), 1)
        .await
        .expect("complete old");
    let new_commit = store
        .start_indexing(repo.id(), SHA_B, EmbeddingStatus::None)
        .await
        .expect("start new");

    let marked = store
        .mark_superseded(repo.id(), new_commit.id(), 0)
        .await
        .expect("mark");
    assert_eq!(marked, 1);
    // Re-marking does not duplicate candidates.
    let marked_again = store
        .mark_superseded(repo.id(), new_commit.id(), 0)
        .await
        .expect("mark again");
    assert_eq!(marked_again, 0);

    let eligible = store.get_eligible_for_gc(1).await.expect("eligible");
    assert_eq!(eligible.len(), 1);
    assert_eq!(eligible[0].id(), old_commit.id());

    // Cascade: refs, blobs, candidates, and the commit row all go.
    let chunk = Uuid::new_v4();
    store
        .add_chunk_refs(old_commit.id(), &[chunk])
        .await
        .expect("refs");
    store
        .store_file_blobs(
            old_commit.id(),
            &[("src/a.ts".to_string(), "blob1".to_string())],
        )
        .await
        .expect("blobs");
    store
        .store_blob_chunks("blob1", &[chunk])
        .await
        .expect("blob chunks");

    store
        .delete_commits(&[old_commit.id()])
        .await
        .expect("delete");
    assert!(store
        .find_commit(repo.id(), SHA_A)
        .await
        .expect("find")
        .is_none());
    assert!(store
        .chunk_refs_for_commit(old_commit.id())
        .await
        .expect("refs")
        .is_empty());
    assert!(store.get_eligible_for_gc(1).await.expect("eligible").is_empty());
    // The blob mapping is dropped once no surviving file references it.
    assert!(store
        .get_indexed_blobs(&["blob1".to_string()])
        .await
        .expect("indexed")
        .is_empty());
}
