mod common;

use common::{harness, GitFixture};
use sourcerack::{
    noop_observer, DeadCodeOptions, EndpointFilter, IndexOptions, MetadataStore, RepoSelection,
    SearchOptions, StructureIndex, SummaryOptions,
};

const UTILS_TS: &str =
    "export function helper(name: string): string {\n    return 'hello ' + name;\n}\n";
const INDEX_TS: &str =
    "import { helper } from './utils';\n\nexport function greet(name: string) {\n    return helper(name);\n}\n";

async fn index_fixture(
    fixture: &GitFixture,
    container: &sourcerack::Container,
) -> sourcerack::IndexReport {
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

async fn scopes_for(
    fixture: &GitFixture,
    container: &sourcerack::Container,
) -> Vec<sourcerack::CommitScope> {
    container
        .scope_resolver()
        .resolve(&RepoSelection::Path(fixture.path_str()), "HEAD")
        .await
        .expect("scopes")
}

#[tokio::test]
async fn definition_usage_and_linking_round_trip() {
    let fixture = GitFixture::new();
    fixture.write("src/utils.ts", UTILS_TS);
    fixture.write("src/index.ts", INDEX_TS);
    fixture.commit("initial");

    let harness = harness().await;
    let report = index_fixture(&fixture, &harness.container).await;
    assert_eq!(report.files_total, 2);
    assert!(report.chunks_created > 0);

    let scopes = scopes_for(&fixture, &harness.container).await;

    let definitions = harness
        .container
        .find_definition()
        .execute(&scopes, "helper", None, false)
        .await
        .expect("find definition");
    assert_eq!(definitions.len(), 1);
    let helper = &definitions[0];
    assert_eq!(helper.symbol.file_path, "src/utils.ts");
    assert_eq!(helper.symbol.start_line, 1);
    assert_eq!(helper.symbol.end_line, 3);
    assert!(helper.symbol.is_exported);

    let usages = harness
        .container
        .find_usages()
        .execute(&scopes, "helper", None)
        .await
        .expect("find usages");
    assert_eq!(usages.len(), 1);
    let usage = &usages[0];
    assert_eq!(usage.usage.file_path, "src/index.ts");
    assert_eq!(usage.usage.line, 4);
    // The usage resolves to the helper definition through the import binding.
    assert_eq!(usage.usage.definition_symbol_id, Some(helper.symbol.id));
    assert!(usage
        .context
        .as_deref()
        .unwrap_or_default()
        .contains("helper(name)"));
}

#[tokio::test]
async fn codebase_summary_counts_and_entry_points() {
    let fixture = GitFixture::new();
    fixture.write("src/utils.ts", UTILS_TS);
    fixture.write("src/index.ts", INDEX_TS);
    fixture.commit("initial");

    let harness = harness().await;
    index_fixture(&fixture, &harness.container).await;
    let scopes = scopes_for(&fixture, &harness.container).await;

    let summaries = harness
        .container
        .codebase_summary()
        .execute(
            &scopes,
            &SummaryOptions {
                include_hotspots: true,
                include_dependencies: true,
                ..SummaryOptions::default()
            },
        )
        .await
        .expect("summary");
    assert_eq!(summaries.len(), 1);
    let summary = &summaries[0];
    assert_eq!(summary.total_files, 2);
    assert_eq!(summary.total_symbols, 2);
    assert_eq!(summary.total_usages, 1);
    assert_eq!(summary.total_imports, 1);
    assert!(summary.entry_points.contains(&"src/index.ts".to_string()));
    let typescript = summary.languages.get("typescript").expect("ts stats");
    assert_eq!(typescript.file_count, 2);
}

#[tokio::test]
async fn impact_analysis_reaches_enclosing_symbol() {
    let fixture = GitFixture::new();
    fixture.write("src/utils.ts", UTILS_TS);
    fixture.write("src/index.ts", INDEX_TS);
    fixture.commit("initial");

    let harness = harness().await;
    index_fixture(&fixture, &harness.container).await;
    let scopes = scopes_for(&fixture, &harness.container).await;

    let report = harness
        .container
        .impact_analysis()
        .execute(&scopes, "helper", Some(1))
        .await
        .expect("impact");
    assert_eq!(report.direct_usages.len(), 1);
    assert_eq!(report.direct_usages[0].file_path, "src/index.ts");
    assert_eq!(report.direct_usages[0].line, 4);
    assert!(report
        .transitive_impact
        .iter()
        .any(|impacted| impacted.symbol == "greet" && impacted.depth == 1));
    assert!(report.total_affected >= 1);
}

#[tokio::test]
async fn reindex_with_unchanged_blobs_reuses_chunks() {
    let fixture = GitFixture::new();
    fixture.write("src/utils.ts", UTILS_TS);
    fixture.write("src/index.ts", INDEX_TS);
    fixture.commit("initial");

    let harness = harness().await;
    let first = index_fixture(&fixture, &harness.container).await;
    assert!(first.chunks_created > 0);

    // A new commit with identical blobs: nothing re-chunked, nothing
    // re-embedded, refs carried over.
    let second_sha = fixture.commit("empty follow-up");
    let second = index_fixture(&fixture, &harness.container).await;
    assert_eq!(second.commit_sha, second_sha);
    assert!(!second.already_indexed);
    assert_eq!(second.chunks_created, 0);
    assert_eq!(second.chunks_reused, first.chunks_created);

    let metadata = harness.container.metadata();
    let first_refs = metadata
        .chunk_refs_for_commit(first.commit_id)
        .await
        .expect("refs");
    let mut second_refs = metadata
        .chunk_refs_for_commit(second.commit_id)
        .await
        .expect("refs");
    let mut expected = first_refs.clone();
    expected.sort();
    second_refs.sort();
    assert_eq!(second_refs, expected);

    // Structural queries still work at the new commit.
    let scopes = scopes_for(&fixture, &harness.container).await;
    let definitions = harness
        .container
        .find_definition()
        .execute(&scopes, "helper", None, false)
        .await
        .expect("find definition");
    assert_eq!(definitions.len(), 1);
}

#[tokio::test]
async fn reindexing_same_commit_is_a_no_op_without_force() {
    let fixture = GitFixture::new();
    fixture.write("src/utils.ts", UTILS_TS);
    fixture.commit("initial");

    let harness = harness().await;
    let first = index_fixture(&fixture, &harness.container).await;
    let second = index_fixture(&fixture, &harness.container).await;
    assert!(second.already_indexed);
    assert_eq!(second.commit_sha, first.commit_sha);
}

#[tokio::test]
async fn express_endpoints_discovered() {
    let fixture = GitFixture::new();
    fixture.write(
        "server.js",
        "const express = require('express');\nconst app = express();\n\napp.get('/users/:id', getUser);\napp.post('/users', auth, createUser);\n",
    );
    fixture.commit("service");

    let harness = harness().await;
    index_fixture(&fixture, &harness.container).await;
    let scopes = scopes_for(&fixture, &harness.container).await;

    let matches = harness
        .container
        .find_endpoints()
        .execute(
            &scopes,
            &EndpointFilter {
                method: Some("GET".to_string()),
                path_pattern: Some("/users/*".to_string()),
                framework: None,
            },
        )
        .await
        .expect("endpoints");
    assert_eq!(matches.len(), 1);
    let endpoint = &matches[0];
    assert_eq!(endpoint.endpoint.framework.as_str(), "express");
    assert_eq!(endpoint.endpoint.path, "/users/:id");
    assert_eq!(endpoint.endpoint.handler_name.as_deref(), Some("getUser"));
    assert_eq!(endpoint.path_params, vec!["id"]);
}

#[tokio::test]
async fn empty_repository_indexes_with_zero_chunks() {
    let fixture = GitFixture::new();
    fixture.commit("empty");

    let harness = harness().await;
    let report = index_fixture(&fixture, &harness.container).await;
    assert_eq!(report.files_total, 0);
    assert_eq!(report.chunks_created, 0);

    let metadata = harness.container.metadata();
    let repo = metadata
        .find_repository_by_path(&fixture.path_str())
        .await
        .expect("repo lookup")
        .expect("repo exists");
    let commit = metadata
        .find_commit(repo.id(), &fixture.head())
        .await
        .expect("commit lookup")
        .expect("commit exists");
    assert!(commit.status().is_complete());
    assert_eq!(commit.chunk_count(), 0);
}

#[tokio::test]
async fn binary_files_are_skipped() {
    let fixture = GitFixture::new();
    fixture.write("src/utils.ts", UTILS_TS);
    fixture.write_bytes("assets/logo.bin", &[0u8, 159, 146, 150, 0, 42]);
    fixture.commit("with binary");

    let harness = harness().await;
    let report = index_fixture(&fixture, &harness.container).await;
    assert_eq!(report.files_binary_skipped, 1);

    // The binary file contributes no chunks and no SQI rows.
    let scopes = scopes_for(&fixture, &harness.container).await;
    let structure = harness.container.structure();
    assert!(structure
        .symbols_in_file(scopes[0].commit_id(), "assets/logo.bin")
        .await
        .expect("symbols")
        .is_empty());
}

#[tokio::test]
async fn semantic_search_returns_commit_scoped_hits() {
    let fixture = GitFixture::new();
    fixture.write("src/utils.ts", UTILS_TS);
    fixture.write("src/index.ts", INDEX_TS);
    fixture.commit("initial");

    let harness = harness().await;
    index_fixture(&fixture, &harness.container).await;
    let scopes = scopes_for(&fixture, &harness.container).await;

    let hits = harness
        .container
        .search_use_case()
        .execute(
            "greet a user by name",
            &scopes,
            &SearchOptions {
                limit: 5,
                ..SearchOptions::default()
            },
        )
        .await
        .expect("search");
    assert!(!hits.is_empty());
    assert!(hits.iter().all(|hit| hit.repo_name == scopes[0].repo_name()));
}

#[tokio::test]
async fn dead_code_reports_unused_symbols() {
    let fixture = GitFixture::new();
    fixture.write("src/utils.ts", UTILS_TS);
    fixture.write(
        "src/orphan.ts",
        "export function forgotten(): number {\n    return 1;\n}\n",
    );
    fixture.write("src/index.ts", INDEX_TS);
    fixture.commit("initial");

    let harness = harness().await;
    index_fixture(&fixture, &harness.container).await;
    let scopes = scopes_for(&fixture, &harness.container).await;

    let dead = harness
        .container
        .dead_code()
        .execute(&scopes, &DeadCodeOptions::default())
        .await
        .expect("dead code");
    assert!(dead.iter().any(|d| d.symbol.name == "forgotten"));
    assert!(dead.iter().all(|d| d.symbol.name != "helper"));
}
