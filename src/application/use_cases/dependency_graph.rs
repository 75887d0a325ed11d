use std::collections::HashMap;
use std::sync::Arc;

use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};

use crate::application::StructureIndex;
use crate::domain::{DomainError, Import};

use super::commit_scope::CommitScope;

const DEFAULT_MAX_EDGES: usize = 200;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub from: String,
    pub to: String,
    /// Number of imports collapsed into this edge.
    pub weight: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyGraph {
    pub repo_name: String,
    pub nodes: Vec<String>,
    pub edges: Vec<DependencyEdge>,
    pub truncated: bool,
}

/// `get_dependency_graph`: module-level edges derived from imports. Nodes are
/// directory prefixes for internal modules and bare specifiers for external
/// ones.
pub struct DependencyGraphUseCase {
    structure: Arc<dyn StructureIndex>,
}

impl DependencyGraphUseCase {
    pub fn new(structure: Arc<dyn StructureIndex>) -> Self {
        Self { structure }
    }

    pub async fn execute(
        &self,
        scopes: &[CommitScope],
        max_edges: Option<usize>,
    ) -> Result<Vec<DependencyGraph>, DomainError> {
        let max_edges = max_edges.unwrap_or(DEFAULT_MAX_EDGES);
        let mut graphs = Vec::with_capacity(scopes.len());
        for scope in scopes {
            let imports = self.structure.imports_for_commit(scope.commit_id()).await?;
            graphs.push(build_graph(
                scope.repo_name().to_string(),
                &imports,
                max_edges,
            ));
        }
        Ok(graphs)
    }
}

fn module_of(path: &str) -> String {
    match path.rsplit_once('/') {
        Some((dir, _)) => dir.to_string(),
        None => ".".to_string(),
    }
}

fn build_graph(repo_name: String, imports: &[Import], max_edges: usize) -> DependencyGraph {
    let mut graph: DiGraph<String, u32> = DiGraph::new();
    let mut node_index: HashMap<String, NodeIndex> = HashMap::new();
    let mut edge_weights: HashMap<(String, String), u32> = HashMap::new();

    for import in imports {
        let from = module_of(&import.file_path);
        let to = match &import.resolved_path {
            Some(resolved) => module_of(resolved),
            None => import.module_specifier.clone(),
        };
        if from == to {
            continue;
        }
        *edge_weights.entry((from, to)).or_insert(0) += 1;
    }

    // Heaviest edges first when the cap bites.
    let mut weighted: Vec<((String, String), u32)> = edge_weights.into_iter().collect();
    weighted.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    let truncated = weighted.len() > max_edges;
    weighted.truncate(max_edges);

    for ((from, to), weight) in &weighted {
        let from_ix = *node_index
            .entry(from.clone())
            .or_insert_with(|| graph.add_node(from.clone()));
        let to_ix = *node_index
            .entry(to.clone())
            .or_insert_with(|| graph.add_node(to.clone()));
        graph.add_edge(from_ix, to_ix, *weight);
    }

    DependencyGraph {
        repo_name,
        nodes: graph.node_weights().cloned().collect(),
        edges: weighted
            .into_iter()
            .map(|((from, to), weight)| DependencyEdge { from, to, weight })
            .collect(),
        truncated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ImportType;

    fn import(file: &str, specifier: &str) -> Import {
        Import {
            id: 0,
            commit_id: 1,
            file_path: file.to_string(),
            line: 1,
            import_type: ImportType::EsImport,
            module_specifier: specifier.to_string(),
            resolved_path: crate::domain::resolve_relative(file, specifier),
            bindings: Vec::new(),
        }
    }

    #[test]
    fn test_graph_groups_by_directory() {
        let imports = vec![
            import("src/api/users.ts", "../db/client"),
            import("src/api/posts.ts", "../db/client"),
            import("src/api/users.ts", "lodash"),
        ];
        let graph = build_graph("demo".to_string(), &imports, 100);
        assert!(graph.nodes.contains(&"src/api".to_string()));
        assert!(graph.nodes.contains(&"src/db".to_string()));
        assert!(graph.nodes.contains(&"lodash".to_string()));
        let db_edge = graph
            .edges
            .iter()
            .find(|e| e.to == "src/db")
            .expect("edge to db");
        assert_eq!(db_edge.weight, 2);
        assert!(!graph.truncated);
    }

    #[test]
    fn test_edge_cap_truncates() {
        let imports: Vec<Import> = (0..10)
            .map(|i| import(&format!("src/m{}/a.ts", i), "lodash"))
            .collect();
        let graph = build_graph("demo".to_string(), &imports, 3);
        assert_eq!(graph.edges.len(), 3);
        assert!(graph.truncated);
    }
}
