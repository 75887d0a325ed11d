use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::application::StructureIndex;
use crate::domain::{DomainError, Usage};

use super::commit_scope::{commit_ids, scope_for_commit, CommitScope};

const DEFAULT_MAX_DEPTH: usize = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectUsage {
    pub repo_name: String,
    pub file_path: String,
    pub line: u32,
    pub usage_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImpactedSymbol {
    pub repo_name: String,
    pub symbol: String,
    pub qualified_name: String,
    pub file_path: String,
    /// Hop distance from the root symbol (1 = encloses a direct usage).
    pub depth: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImpactReport {
    pub root_symbol: String,
    pub direct_usages: Vec<DirectUsage>,
    pub transitive_impact: Vec<ImpactedSymbol>,
    pub total_affected: usize,
    pub max_depth_reached: usize,
}

/// `analyze_change_impact`: BFS outward from a symbol through
/// usage → enclosing symbol → that symbol's own usages, bounded by depth and
/// deduplicated by symbol ID.
pub struct ImpactAnalysisUseCase {
    structure: Arc<dyn StructureIndex>,
}

impl ImpactAnalysisUseCase {
    pub fn new(structure: Arc<dyn StructureIndex>) -> Self {
        Self { structure }
    }

    pub async fn execute(
        &self,
        scopes: &[CommitScope],
        symbol_name: &str,
        max_depth: Option<usize>,
    ) -> Result<ImpactReport, DomainError> {
        let max_depth = max_depth.unwrap_or(DEFAULT_MAX_DEPTH).max(1);
        let ids = commit_ids(scopes);

        let root_usages = self
            .structure
            .usages_by_name(&ids, symbol_name, None)
            .await?;
        let direct_usages: Vec<DirectUsage> = root_usages
            .iter()
            .map(|usage| DirectUsage {
                repo_name: repo_of(scopes, usage),
                file_path: usage.file_path.clone(),
                line: usage.line,
                usage_type: usage.usage_type.to_string(),
            })
            .collect();

        // Seed the queue with the symbols enclosing each direct usage.
        let mut visited: HashSet<i64> = HashSet::new();
        let mut queue: VecDeque<(i64, usize)> = VecDeque::new();
        let mut transitive: Vec<ImpactedSymbol> = Vec::new();
        let mut max_depth_reached = 0usize;

        // The root's own definitions never count as impacted.
        for symbol in self
            .structure
            .find_symbols_by_name(&ids, symbol_name, None)
            .await?
        {
            visited.insert(symbol.id);
        }

        for usage in &root_usages {
            if let Some(enclosing) = usage.enclosing_symbol_id {
                if visited.insert(enclosing) {
                    queue.push_back((enclosing, 1));
                }
            }
        }

        while let Some((symbol_id, depth)) = queue.pop_front() {
            let Some(symbol) = self.structure.symbol_by_id(symbol_id).await? else {
                continue;
            };
            max_depth_reached = max_depth_reached.max(depth);
            transitive.push(ImpactedSymbol {
                repo_name: scope_for_commit(scopes, symbol.commit_id)
                    .map(|s| s.repo_name().to_string())
                    .unwrap_or_default(),
                symbol: symbol.name.clone(),
                qualified_name: symbol.qualified_name.clone(),
                file_path: symbol.file_path.clone(),
                depth,
            });

            if depth >= max_depth {
                continue;
            }
            // Who uses this symbol? Their enclosing symbols are the next hop.
            let mut outer = self.structure.usages_by_definition(&[symbol.id]).await?;
            let by_name = self
                .structure
                .usages_by_name(&[symbol.commit_id], &symbol.name, None)
                .await?;
            outer.extend(by_name);
            for usage in outer {
                if let Some(enclosing) = usage.enclosing_symbol_id {
                    if visited.insert(enclosing) {
                        queue.push_back((enclosing, depth + 1));
                    }
                }
            }
        }

        Ok(ImpactReport {
            root_symbol: symbol_name.to_string(),
            total_affected: transitive.len(),
            max_depth_reached,
            direct_usages,
            transitive_impact: transitive,
        })
    }
}

fn repo_of(scopes: &[CommitScope], usage: &Usage) -> String {
    scope_for_commit(scopes, usage.commit_id)
        .map(|s| s.repo_name().to_string())
        .unwrap_or_default()
}
