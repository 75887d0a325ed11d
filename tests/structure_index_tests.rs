use sourcerack::{
    DuckdbStructureIndex, EndpointFilter, ExtractedEndpoint, ExtractedSymbol, ExtractedUsage,
    Framework, HandlerType, ImportBinding, ImportType, StructureIndex, SymbolKind, UsageLink,
    UsageType,
};
use sourcerack::domain::ExtractedImport;
use tempfile::tempdir;

async fn index() -> (tempfile::TempDir, DuckdbStructureIndex) {
    let dir = tempdir().expect("tempdir");
    let db_path = dir.path().join("structure.duckdb");
    let index = DuckdbStructureIndex::open(&db_path).await.expect("init");
    (dir, index)
}

fn symbol(name: &str, file: &str, start: u32, end: u32) -> ExtractedSymbol {
    let mut symbol = ExtractedSymbol::new(name, name, SymbolKind::Function, file, start, end);
    symbol.is_exported = true;
    symbol.content_hash = format!("hash-{}", name);
    symbol
}

#[tokio::test]
async fn parent_child_resolution_within_batch() {
    let (_dir, index) = index().await;
    let mut class = ExtractedSymbol::new("Service", "Service", SymbolKind::Class, "a.ts", 1, 20);
    class.content_hash = "h1".to_string();
    let mut method = ExtractedSymbol::new(
        "start",
        "Service.start",
        SymbolKind::Method,
        "a.ts",
        2,
        5,
    );
    method.parent_qualified_name = Some("Service".to_string());
    method.content_hash = "h2".to_string();

    let ids = index
        .insert_symbols("repo", 1, &[class, method])
        .await
        .expect("insert");
    assert_eq!(ids.len(), 2);

    let children = index.children_of(ids[0]).await.expect("children");
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].name, "start");
    assert_eq!(children[0].parent_symbol_id, Some(ids[0]));
    // Parent and child live in the same commit and file.
    assert_eq!(children[0].commit_id, 1);
    assert_eq!(children[0].file_path, "a.ts");
}

#[tokio::test]
async fn commit_isolation_for_all_row_kinds() {
    let (_dir, index) = index().await;
    index
        .insert_symbols("repo", 1, &[symbol("helper", "a.ts", 1, 3)])
        .await
        .expect("symbols");
    index
        .insert_usages(
            1,
            &[ExtractedUsage::new("helper", "b.ts", 4, 1, UsageType::Call)],
        )
        .await
        .expect("usages");
    index
        .insert_imports(
            1,
            &[ExtractedImport::new("b.ts", 1, ImportType::EsImport, "./a")
                .with_bindings(vec![ImportBinding::plain("helper")])],
        )
        .await
        .expect("imports");
    index
        .insert_endpoints(
            1,
            &[ExtractedEndpoint::new(
                "GET",
                "/x",
                "b.ts",
                2,
                2,
                Framework::Express,
            )],
        )
        .await
        .expect("endpoints");

    // Nothing from commit 1 leaks into commit 2.
    assert!(index
        .find_symbols_by_name(&[2], "helper", None)
        .await
        .expect("symbols")
        .is_empty());
    assert!(index
        .usages_by_name(&[2], "helper", None)
        .await
        .expect("usages")
        .is_empty());
    assert!(index
        .imports_for_file(2, "b.ts")
        .await
        .expect("imports")
        .is_empty());
    assert!(index
        .find_endpoints(&[2], &EndpointFilter::default())
        .await
        .expect("endpoints")
        .is_empty());

    // And commit 1 sees its own rows.
    assert_eq!(
        index
            .find_symbols_by_name(&[1], "helper", None)
            .await
            .expect("symbols")
            .len(),
        1
    );
    assert_eq!(index.count_usages(1).await.expect("count"), 1);
    assert_eq!(index.count_imports(1).await.expect("count"), 1);
}

#[tokio::test]
async fn usage_links_are_additive() {
    let (_dir, index) = index().await;
    let ids = index
        .insert_symbols("repo", 1, &[symbol("helper", "a.ts", 1, 3)])
        .await
        .expect("symbols");
    index
        .insert_usages(
            1,
            &[ExtractedUsage::new("helper", "b.ts", 4, 1, UsageType::Call)],
        )
        .await
        .expect("usages");

    let usage = index.usages_for_commit(1).await.expect("fetch")[0].clone();
    index
        .apply_usage_links(&[UsageLink {
            usage_id: usage.id,
            enclosing_symbol_id: None,
            definition_symbol_id: Some(ids[0]),
        }])
        .await
        .expect("link");

    // A later pass with nulls never unlinks.
    index
        .apply_usage_links(&[UsageLink {
            usage_id: usage.id,
            enclosing_symbol_id: None,
            definition_symbol_id: None,
        }])
        .await
        .expect("relink");
    let reloaded = index.usages_for_commit(1).await.expect("fetch")[0].clone();
    assert_eq!(reloaded.definition_symbol_id, Some(ids[0]));

    let by_definition = index
        .usages_by_definition(&[ids[0]])
        .await
        .expect("by definition");
    assert_eq!(by_definition.len(), 1);
}

#[tokio::test]
async fn endpoint_handler_resolution_and_filters() {
    let (_dir, index) = index().await;
    index
        .insert_symbols("repo", 1, &[symbol("getUser", "handlers.ts", 1, 5)])
        .await
        .expect("symbols");
    index
        .insert_endpoints(
            1,
            &[
                ExtractedEndpoint::new("GET", "/users/:id", "routes.ts", 3, 3, Framework::Express)
                    .with_handler("getUser", HandlerType::Reference),
                ExtractedEndpoint::new("POST", "/accounts", "routes.ts", 9, 9, Framework::Express),
            ],
        )
        .await
        .expect("endpoints");

    let filtered = index
        .find_endpoints(
            &[1],
            &EndpointFilter {
                method: Some("get".to_string()),
                path_pattern: Some("/users/*".to_string()),
                framework: None,
            },
        )
        .await
        .expect("filter");
    assert_eq!(filtered.len(), 1);
    let endpoint = &filtered[0];
    assert_eq!(endpoint.path, "/users/:id");
    assert_eq!(endpoint.handler_name.as_deref(), Some("getUser"));
    assert!(endpoint.handler_symbol_id.is_some());
    assert_eq!(
        endpoint
            .params
            .iter()
            .map(|p| p.name.as_str())
            .collect::<Vec<_>>(),
        vec!["id"]
    );
}

#[tokio::test]
async fn dead_code_query_respects_resolved_usages() {
    let (_dir, index) = index().await;
    let ids = index
        .insert_symbols(
            "repo",
            1,
            &[symbol("used", "a.ts", 1, 3), symbol("unused", "a.ts", 5, 7)],
        )
        .await
        .expect("symbols");
    index
        .insert_usages(
            1,
            &[ExtractedUsage::new("used", "b.ts", 2, 1, UsageType::Call)],
        )
        .await
        .expect("usages");
    let usage = index.usages_for_commit(1).await.expect("fetch")[0].clone();
    index
        .apply_usage_links(&[UsageLink {
            usage_id: usage.id,
            enclosing_symbol_id: None,
            definition_symbol_id: Some(ids[0]),
        }])
        .await
        .expect("link");

    let dead = index
        .symbols_without_usages(1, false, 10)
        .await
        .expect("dead");
    assert_eq!(dead.len(), 1);
    assert_eq!(dead[0].name, "unused");
}

#[tokio::test]
async fn dead_code_keeps_symbols_behind_ambiguous_unlinked_usages() {
    let (_dir, index) = index().await;
    // Two unrelated `run` definitions; a call site by that name is ambiguous,
    // so the linker leaves it unresolved. Neither definition is actually
    // called, and both must surface as dead.
    index
        .insert_symbols(
            "repo",
            1,
            &[symbol("run", "a.ts", 1, 3), symbol("run", "b.ts", 1, 3)],
        )
        .await
        .expect("symbols");
    index
        .insert_usages(
            1,
            &[ExtractedUsage::new("run", "c.ts", 2, 1, UsageType::Call)],
        )
        .await
        .expect("usages");

    let dead = index
        .symbols_without_usages(1, false, 10)
        .await
        .expect("dead");
    assert_eq!(dead.len(), 2);
    assert!(dead.iter().all(|s| s.name == "run"));
}

#[tokio::test]
async fn external_dependencies_grouped() {
    let (_dir, index) = index().await;
    index
        .insert_imports(
            1,
            &[
                ExtractedImport::new("a.ts", 1, ImportType::EsImport, "lodash"),
                ExtractedImport::new("b.ts", 1, ImportType::EsImport, "lodash"),
                ExtractedImport::new("b.ts", 2, ImportType::EsImport, "./local"),
            ],
        )
        .await
        .expect("imports");

    let deps = index.external_dependencies(1).await.expect("deps");
    assert_eq!(deps.get("lodash"), Some(&2));
    assert!(!deps.contains_key("./local"));
}

#[tokio::test]
async fn delete_commits_cascades_sqi_rows() {
    let (_dir, index) = index().await;
    index
        .insert_symbols("repo", 1, &[symbol("helper", "a.ts", 1, 3)])
        .await
        .expect("symbols");
    index
        .insert_usages(
            1,
            &[ExtractedUsage::new("helper", "b.ts", 4, 1, UsageType::Call)],
        )
        .await
        .expect("usages");
    index
        .insert_imports(
            1,
            &[ExtractedImport::new("b.ts", 1, ImportType::EsImport, "./a")
                .with_bindings(vec![ImportBinding::plain("helper")])],
        )
        .await
        .expect("imports");

    index.delete_commits(&[1]).await.expect("delete");
    assert_eq!(index.count_symbols(1).await.expect("count"), 0);
    assert_eq!(index.count_usages(1).await.expect("count"), 0);
    assert_eq!(index.count_imports(1).await.expect("count"), 0);
}
