use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::application::StructureIndex;
use crate::domain::{DomainError, Symbol};

use super::commit_scope::{commit_ids, scope_for_commit, CommitScope};

const FUZZY_THRESHOLD: f64 = 0.6;
const FUZZY_LIMIT: usize = 20;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefinitionMatch {
    pub repo_name: String,
    pub symbol: Symbol,
    /// Similarity score for fuzzy matches; exact matches carry none.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

/// `find_definition`: exact matches on name or qualified name, with optional
/// fuzzy fallback by normalised edit distance.
pub struct FindDefinitionUseCase {
    structure: Arc<dyn StructureIndex>,
}

impl FindDefinitionUseCase {
    pub fn new(structure: Arc<dyn StructureIndex>) -> Self {
        Self { structure }
    }

    pub async fn execute(
        &self,
        scopes: &[CommitScope],
        name: &str,
        kind: Option<&str>,
        fuzzy: bool,
    ) -> Result<Vec<DefinitionMatch>, DomainError> {
        if name.is_empty() {
            return Err(DomainError::invalid_argument("Empty symbol name"));
        }
        let ids = commit_ids(scopes);
        let exact = self.structure.find_symbols_by_name(&ids, name, kind).await?;
        if !exact.is_empty() || !fuzzy {
            return Ok(exact
                .into_iter()
                .map(|symbol| DefinitionMatch {
                    repo_name: repo_name_for(scopes, &symbol),
                    symbol,
                    score: None,
                })
                .collect());
        }

        // Fuzzy fallback: rank every symbol name by similarity.
        let mut scored: Vec<(i64, f64)> = self
            .structure
            .symbol_names(&ids)
            .await?
            .into_iter()
            .filter_map(|(candidate, qualified, id)| {
                let score = strsim::normalized_levenshtein(name, &candidate)
                    .max(strsim::normalized_levenshtein(name, &qualified));
                if score >= FUZZY_THRESHOLD {
                    Some((id, score))
                } else {
                    None
                }
            })
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(FUZZY_LIMIT);

        let mut matches = Vec::with_capacity(scored.len());
        for (id, score) in scored {
            if let Some(symbol) = self.structure.symbol_by_id(id).await? {
                matches.push(DefinitionMatch {
                    repo_name: repo_name_for(scopes, &symbol),
                    symbol,
                    score: Some(score),
                });
            }
        }
        Ok(matches)
    }
}

fn repo_name_for(scopes: &[CommitScope], symbol: &Symbol) -> String {
    scope_for_commit(scopes, symbol.commit_id)
        .map(|s| s.repo_name().to_string())
        .unwrap_or_default()
}
