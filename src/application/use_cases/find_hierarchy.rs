use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::application::StructureIndex;
use crate::domain::{DomainError, Symbol};

use super::commit_scope::{commit_ids, scope_for_commit, CommitScope};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HierarchyDirection {
    Children,
    Parents,
    Both,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolHierarchy {
    pub repo_name: String,
    pub symbol: Symbol,
    /// Parent chain, nearest first.
    pub parents: Vec<Symbol>,
    pub children: Vec<Symbol>,
}

/// `find_hierarchy`: parent chain via `parent_symbol_id`, children via the
/// inverse lookup.
pub struct FindHierarchyUseCase {
    structure: Arc<dyn StructureIndex>,
}

impl FindHierarchyUseCase {
    pub fn new(structure: Arc<dyn StructureIndex>) -> Self {
        Self { structure }
    }

    pub async fn execute(
        &self,
        scopes: &[CommitScope],
        symbol_name: &str,
        direction: HierarchyDirection,
    ) -> Result<Vec<SymbolHierarchy>, DomainError> {
        let roots = self
            .structure
            .find_symbols_by_name(&commit_ids(scopes), symbol_name, None)
            .await?;

        let mut hierarchies = Vec::with_capacity(roots.len());
        for symbol in roots {
            let parents = if direction != HierarchyDirection::Children {
                self.parent_chain(&symbol).await?
            } else {
                Vec::new()
            };
            let children = if direction != HierarchyDirection::Parents {
                self.structure.children_of(symbol.id).await?
            } else {
                Vec::new()
            };
            hierarchies.push(SymbolHierarchy {
                repo_name: scope_for_commit(scopes, symbol.commit_id)
                    .map(|s| s.repo_name().to_string())
                    .unwrap_or_default(),
                symbol,
                parents,
                children,
            });
        }
        Ok(hierarchies)
    }

    async fn parent_chain(&self, symbol: &Symbol) -> Result<Vec<Symbol>, DomainError> {
        let mut chain = Vec::new();
        let mut cursor = symbol.parent_symbol_id;
        // Parent links form a DAG by construction; the depth guard is only
        // against corrupted rows.
        let mut depth = 0;
        while let Some(parent_id) = cursor {
            if depth > 32 {
                break;
            }
            let Some(parent) = self.structure.symbol_by_id(parent_id).await? else {
                break;
            };
            cursor = parent.parent_symbol_id;
            chain.push(parent);
            depth += 1;
        }
        Ok(chain)
    }
}
