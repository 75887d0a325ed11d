mod common;

use common::{harness, GitFixture};
use sourcerack::{noop_observer, IndexOptions, MetadataStore, RepoSelection, VectorRepository};

const UTILS_TS: &str =
    "export function helper(name: string): string {\n    return 'hello ' + name;\n}\n";
const INDEX_TS: &str =
    "import { helper } from './utils';\n\nexport function greet(name: string) {\n    return helper(name);\n}\n";

async fn index(fixture: &GitFixture, container: &sourcerack::Container) -> sourcerack::IndexReport {
    container
        .index_use_case()
        .execute(
            &fixture.path_str(),
            IndexOptions::default(),
            noop_observer(),
        )
        .await
        .expect("index")
}

#[tokio::test]
async fn gc_removes_superseded_commit_and_orphaned_chunks() {
    let fixture = GitFixture::new();
    fixture.write("src/utils.ts", UTILS_TS);
    fixture.write("src/index.ts", INDEX_TS);
    let old_sha = fixture.commit("with utils");

    // Retention 0: completing a newer commit makes the old one eligible
    // immediately.
    let harness = harness().await;
    let first = index(&fixture, &harness.container).await;

    fixture.remove("src/utils.ts");
    fixture.write(
        "src/index.ts",
        "export function greet(name) {\n    return name;\n}\n",
    );
    fixture.commit("drop utils");
    let second = index(&fixture, &harness.container).await;

    let metadata = harness.container.metadata();
    let old_refs = metadata
        .chunk_refs_for_commit(first.commit_id)
        .await
        .expect("refs");
    let orphan_candidates = metadata
        .chunks_only_in(&[first.commit_id])
        .await
        .expect("orphans");
    assert!(!old_refs.is_empty());
    assert!(!orphan_candidates.is_empty());

    // Dry run reports without deleting.
    let dry = harness.container.gc().execute(true).await.expect("dry run");
    assert!(dry.dry_run);
    assert_eq!(dry.commits_deleted, 1);
    assert!(metadata
        .find_commit(&first.repo_id, &old_sha)
        .await
        .expect("lookup")
        .is_some());

    let report = harness.container.gc().execute(false).await.expect("gc");
    assert!(!report.dry_run);
    assert_eq!(report.commits_deleted, 1);
    assert_eq!(report.chunks_deleted, orphan_candidates.len());

    // The old commit record is gone and its exclusive chunks left the
    // vector store; shared chunks survive.
    assert!(metadata
        .find_commit(&first.repo_id, &old_sha)
        .await
        .expect("lookup")
        .is_none());
    let vector = harness.container.vector();
    assert!(vector
        .chunks_exist(&orphan_candidates)
        .await
        .expect("exist")
        .is_empty());
    let surviving = metadata
        .chunk_refs_for_commit(second.commit_id)
        .await
        .expect("refs");
    let still_there = vector.chunks_exist(&surviving).await.expect("exist");
    assert_eq!(still_there.len(), surviving.len());

    // Structural queries at the new HEAD no longer see the deleted symbol.
    let scopes = harness
        .container
        .scope_resolver()
        .resolve(&RepoSelection::Path(fixture.path_str()), "HEAD")
        .await
        .expect("scopes");
    let definitions = harness
        .container
        .find_definition()
        .execute(&scopes, "helper", None, false)
        .await
        .expect("find definition");
    assert!(definitions.is_empty());

    // A second pass finds nothing left to collect.
    let idle = harness.container.gc().execute(false).await.expect("gc again");
    assert_eq!(idle.commits_deleted, 0);
    assert_eq!(idle.chunks_deleted, 0);
}

#[tokio::test]
async fn force_reindex_wipes_and_rebuilds() {
    let fixture = GitFixture::new();
    fixture.write("src/utils.ts", UTILS_TS);
    fixture.commit("initial");

    let harness = harness().await;
    let first = index(&fixture, &harness.container).await;

    let forced = harness
        .container
        .index_use_case()
        .execute(
            &fixture.path_str(),
            IndexOptions {
                force: true,
                ..IndexOptions::default()
            },
            noop_observer(),
        )
        .await
        .expect("forced reindex");
    assert!(!forced.already_indexed);
    assert_eq!(forced.commit_sha, first.commit_sha);
    // The wipe removed the blob mapping, so chunks were rebuilt fresh.
    assert_eq!(forced.chunks_created, first.chunks_created);

    let scopes = harness
        .container
        .scope_resolver()
        .resolve(&RepoSelection::Path(fixture.path_str()), "HEAD")
        .await
        .expect("scopes");
    let definitions = harness
        .container
        .find_definition()
        .execute(&scopes, "helper", None, false)
        .await
        .expect("find definition");
    assert_eq!(definitions.len(), 1);
}

#[tokio::test]
async fn skip_embeddings_mode_completes_without_vectors() {
    let fixture = GitFixture::new();
    fixture.write("src/utils.ts", UTILS_TS);
    fixture.commit("initial");

    let harness = harness().await;
    let report = harness
        .container
        .index_use_case()
        .execute(
            &fixture.path_str(),
            IndexOptions {
                skip_embeddings: true,
                ..IndexOptions::default()
            },
            noop_observer(),
        )
        .await
        .expect("index");

    let metadata = harness.container.metadata();
    let commit = metadata
        .find_commit(&report.repo_id, &report.commit_sha)
        .await
        .expect("lookup")
        .expect("commit");
    assert!(commit.status().is_complete());
    assert_eq!(
        commit.embedding_status(),
        sourcerack::EmbeddingStatus::None
    );

    // Chunk identities are tracked in metadata, but nothing hit the vector
    // store.
    let refs = metadata
        .chunk_refs_for_commit(commit.id())
        .await
        .expect("refs");
    assert!(!refs.is_empty());
    let vector = harness.container.vector();
    assert!(vector.chunks_exist(&refs).await.expect("exist").is_empty());

    // Structural queries work in SQI-only mode.
    let scopes = harness
        .container
        .scope_resolver()
        .resolve(&RepoSelection::Path(fixture.path_str()), "HEAD")
        .await
        .expect("scopes");
    let definitions = harness
        .container
        .find_definition()
        .execute(&scopes, "helper", None, false)
        .await
        .expect("find definition");
    assert_eq!(definitions.len(), 1);
}
