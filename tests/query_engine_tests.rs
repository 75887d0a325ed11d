mod common;

use common::{harness, GitFixture};
use sourcerack::{
    noop_observer, CallDirection, HierarchyDirection, IndexOptions, RepoSelection,
    SymbolContextOptions,
};

const SERVICE_TS: &str = r#"import { loadConfig } from './config';

export class UserService {
    find(id: number) {
        return lookupUser(id);
    }
}

export function lookupUser(id: number) {
    const config = loadConfig();
    return config;
}
"#;

const CONFIG_TS: &str = r#"export function loadConfig() {
    return { retries: 3 };
}
"#;

async fn indexed_harness(fixture: &GitFixture) -> common::TestHarness {
    let harness = harness().await;
    harness
        .container
        .index_use_case()
        .execute(
            &fixture.path_str(),
            IndexOptions::default(),
            noop_observer(),
        )
        .await
        .expect("index");
    harness
}

fn fixture() -> GitFixture {
    let fixture = GitFixture::new();
    fixture.write("src/service.ts", SERVICE_TS);
    fixture.write("src/config.ts", CONFIG_TS);
    fixture.commit("initial");
    fixture
}

async fn scopes(
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
async fn fuzzy_definition_finds_near_miss() {
    let fixture = fixture();
    let harness = indexed_harness(&fixture).await;
    let scopes = scopes(&fixture, &harness.container).await;

    let matches = harness
        .container
        .find_definition()
        .execute(&scopes, "lookupUsr", None, true)
        .await
        .expect("fuzzy");
    assert!(!matches.is_empty());
    assert_eq!(matches[0].symbol.name, "lookupUser");
    assert!(matches[0].score.unwrap_or(0.0) > 0.6);
}

#[tokio::test]
async fn hierarchy_links_method_to_class() {
    let fixture = fixture();
    let harness = indexed_harness(&fixture).await;
    let scopes = scopes(&fixture, &harness.container).await;

    let hierarchies = harness
        .container
        .find_hierarchy()
        .execute(&scopes, "find", HierarchyDirection::Both)
        .await
        .expect("hierarchy");
    assert_eq!(hierarchies.len(), 1);
    let hierarchy = &hierarchies[0];
    assert_eq!(hierarchy.symbol.qualified_name, "UserService.find");
    assert_eq!(hierarchy.parents.len(), 1);
    assert_eq!(hierarchy.parents[0].name, "UserService");

    let class_view = harness
        .container
        .find_hierarchy()
        .execute(&scopes, "UserService", HierarchyDirection::Children)
        .await
        .expect("hierarchy");
    assert!(class_view[0]
        .children
        .iter()
        .any(|child| child.name == "find"));
}

#[tokio::test]
async fn call_graph_callers_and_callees() {
    let fixture = fixture();
    let harness = indexed_harness(&fixture).await;
    let scopes = scopes(&fixture, &harness.container).await;

    let graphs = harness
        .container
        .call_graph()
        .execute(&scopes, "lookupUser", CallDirection::Both)
        .await
        .expect("call graph");
    assert_eq!(graphs.len(), 1);
    let graph = &graphs[0];
    assert!(graph
        .callers
        .iter()
        .any(|caller| caller.symbol_name == "find"));
    assert!(graph
        .callees
        .iter()
        .any(|callee| callee.symbol_name == "loadConfig"));
}

#[tokio::test]
async fn imports_and_importers() {
    let fixture = fixture();
    let harness = indexed_harness(&fixture).await;
    let scopes = scopes(&fixture, &harness.container).await;

    let imports = harness
        .container
        .find_imports()
        .imports_of(&scopes, "src/service.ts")
        .await
        .expect("imports");
    assert_eq!(imports.len(), 1);
    assert_eq!(imports[0].import.module_specifier, "./config");
    assert_eq!(
        imports[0].import.resolved_path.as_deref(),
        Some("src/config")
    );

    let importers = harness
        .container
        .find_imports()
        .importers_of(&scopes, "src/config")
        .await
        .expect("importers");
    assert_eq!(importers.len(), 1);
    assert_eq!(importers[0].import.file_path, "src/service.ts");
}

#[tokio::test]
async fn symbol_context_is_composite() {
    let fixture = fixture();
    let harness = indexed_harness(&fixture).await;
    let scopes = scopes(&fixture, &harness.container).await;

    let context = harness
        .container
        .symbol_context()
        .execute(
            &scopes,
            "lookupUser",
            &SymbolContextOptions {
                include_source: true,
                include_usages: true,
                max_usages: Some(10),
            },
        )
        .await
        .expect("context");
    assert_eq!(context.symbol.name, "lookupUser");
    assert!(context
        .source
        .as_deref()
        .unwrap_or_default()
        .contains("loadConfig()"));
    assert!(!context.usages.is_empty());
    assert_eq!(context.file_imports.len(), 1);
    assert!(context
        .siblings
        .iter()
        .any(|sibling| sibling.name == "UserService"));
}

#[tokio::test]
async fn dependency_graph_from_imports() {
    let fixture = fixture();
    let harness = indexed_harness(&fixture).await;
    let scopes = scopes(&fixture, &harness.container).await;

    let graphs = harness
        .container
        .dependency_graph()
        .execute(&scopes, None)
        .await
        .expect("graph");
    assert_eq!(graphs.len(), 1);
    // Both files live in src/, importing within the same module directory
    // collapses to no edge; assert the graph is well-formed instead.
    assert!(graphs[0].edges.iter().all(|edge| edge.from != edge.to));
}

#[tokio::test]
async fn querying_unindexed_commit_is_not_indexed_error() {
    let fixture = fixture();
    let harness = indexed_harness(&fixture).await;

    fixture.write("src/new.ts", "export const flag = true;\n");
    fixture.commit("unindexed");

    let error = harness
        .container
        .scope_resolver()
        .resolve(&RepoSelection::Path(fixture.path_str()), "HEAD")
        .await
        .expect_err("must fail");
    assert!(error.is_not_indexed());
}

#[tokio::test]
async fn commit_scoped_queries_against_older_ref() {
    let fixture = fixture();
    let harness = indexed_harness(&fixture).await;
    let first_sha = fixture.head();

    fixture.write("src/extra.ts", "export function added() {\n    return 1;\n}\n");
    fixture.commit("add extra");
    harness
        .container
        .index_use_case()
        .execute(
            &fixture.path_str(),
            IndexOptions::default(),
            noop_observer(),
        )
        .await
        .expect("index second");

    // The older commit is still addressable by SHA and does not see the
    // newly added symbol.
    let old_scopes = harness
        .container
        .scope_resolver()
        .resolve(&RepoSelection::Path(fixture.path_str()), &first_sha)
        .await
        .expect("old scopes");
    let definitions = harness
        .container
        .find_definition()
        .execute(&old_scopes, "added", None, false)
        .await
        .expect("find");
    assert!(definitions.is_empty());

    let new_scopes = scopes(&fixture, &harness.container).await;
    let definitions = harness
        .container
        .find_definition()
        .execute(&new_scopes, "added", None, false)
        .await
        .expect("find");
    assert_eq!(definitions.len(), 1);
}
