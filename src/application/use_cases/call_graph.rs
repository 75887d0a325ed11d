use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::application::StructureIndex;
use crate::domain::{DomainError, Symbol, Usage, UsageType};

use super::commit_scope::{commit_ids, scope_for_commit, CommitScope};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallDirection {
    Callers,
    Callees,
    Both,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallEdge {
    pub repo_name: String,
    /// The symbol on the other end of the edge, when resolved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<Symbol>,
    pub symbol_name: String,
    pub file_path: String,
    pub line: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallGraph {
    pub repo_name: String,
    pub target: Symbol,
    pub callers: Vec<CallEdge>,
    pub callees: Vec<CallEdge>,
}

/// `get_call_graph`: callers are call-type usages resolving to the target;
/// callees are calls inside the target's line range in its own file — an
/// approximation that misses cross-file callees.
pub struct CallGraphUseCase {
    structure: Arc<dyn StructureIndex>,
}

impl CallGraphUseCase {
    pub fn new(structure: Arc<dyn StructureIndex>) -> Self {
        Self { structure }
    }

    pub async fn execute(
        &self,
        scopes: &[CommitScope],
        symbol_name: &str,
        direction: CallDirection,
    ) -> Result<Vec<CallGraph>, DomainError> {
        let targets = self
            .structure
            .find_symbols_by_name(&commit_ids(scopes), symbol_name, None)
            .await?;

        let mut graphs = Vec::with_capacity(targets.len());
        for target in targets {
            let repo_name = scope_for_commit(scopes, target.commit_id)
                .map(|s| s.repo_name().to_string())
                .unwrap_or_default();

            let callers = if direction != CallDirection::Callees {
                self.callers_of(&target, &repo_name).await?
            } else {
                Vec::new()
            };
            let callees = if direction != CallDirection::Callers {
                self.callees_of(&target, &repo_name).await?
            } else {
                Vec::new()
            };
            graphs.push(CallGraph {
                repo_name,
                target,
                callers,
                callees,
            });
        }
        Ok(graphs)
    }

    async fn callers_of(
        &self,
        target: &Symbol,
        repo_name: &str,
    ) -> Result<Vec<CallEdge>, DomainError> {
        let usages = self.structure.usages_by_definition(&[target.id]).await?;
        let mut edges = Vec::new();
        for usage in usages
            .iter()
            .filter(|u| u.usage_type == UsageType::Call)
        {
            let symbol = match usage.enclosing_symbol_id {
                Some(id) => self.structure.symbol_by_id(id).await?,
                None => None,
            };
            // A call outside any known symbol is module-level code.
            let name = symbol
                .as_ref()
                .map(|s| s.name.clone())
                .unwrap_or_else(|| "<module>".to_string());
            edges.push(self.edge(usage, symbol, name, repo_name));
        }
        Ok(edges)
    }

    async fn callees_of(
        &self,
        target: &Symbol,
        repo_name: &str,
    ) -> Result<Vec<CallEdge>, DomainError> {
        let calls = self
            .structure
            .calls_in_range(
                target.commit_id,
                &target.file_path,
                target.start_line,
                target.end_line,
            )
            .await?;
        let mut edges = Vec::new();
        for usage in &calls {
            // Skip the target's own declaration-site matches.
            if usage.symbol_name == target.name {
                continue;
            }
            let symbol = match usage.definition_symbol_id {
                Some(id) => self.structure.symbol_by_id(id).await?,
                None => None,
            };
            let name = symbol
                .as_ref()
                .map(|s| s.name.clone())
                .unwrap_or_else(|| usage.symbol_name.clone());
            edges.push(self.edge(usage, symbol, name, repo_name));
        }
        Ok(edges)
    }

    fn edge(
        &self,
        usage: &Usage,
        symbol: Option<Symbol>,
        symbol_name: String,
        repo_name: &str,
    ) -> CallEdge {
        CallEdge {
            repo_name: repo_name.to_string(),
            symbol,
            symbol_name,
            file_path: usage.file_path.clone(),
            line: usage.line,
        }
    }
}
