use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::application::StructureIndex;
use crate::domain::{DomainError, Symbol};

use super::commit_scope::CommitScope;

const DEFAULT_LIMIT: usize = 100;

/// Path segments that mark conventional test locations.
const TEST_PATH_MARKERS: &[&str] = &["test", "tests", "spec", "specs", "__tests__", "testdata"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadSymbol {
    pub repo_name: String,
    pub symbol: Symbol,
}

#[derive(Debug, Clone, Default)]
pub struct DeadCodeOptions {
    pub exported_only: bool,
    pub exclude_tests: bool,
    pub limit: Option<usize>,
}

/// `find_dead_code`: symbols with zero usage rows across the commit;
/// cross-repo mode unions per-scope results.
pub struct DeadCodeUseCase {
    structure: Arc<dyn StructureIndex>,
}

impl DeadCodeUseCase {
    pub fn new(structure: Arc<dyn StructureIndex>) -> Self {
        Self { structure }
    }

    pub async fn execute(
        &self,
        scopes: &[CommitScope],
        options: &DeadCodeOptions,
    ) -> Result<Vec<DeadSymbol>, DomainError> {
        let limit = options.limit.unwrap_or(DEFAULT_LIMIT);
        let mut dead = Vec::new();
        for scope in scopes {
            let symbols = self
                .structure
                .symbols_without_usages(scope.commit_id(), options.exported_only, limit)
                .await?;
            for symbol in symbols {
                if options.exclude_tests && is_test_path(&symbol.file_path) {
                    continue;
                }
                dead.push(DeadSymbol {
                    repo_name: scope.repo_name().to_string(),
                    symbol,
                });
            }
        }
        dead.truncate(limit);
        Ok(dead)
    }
}

fn is_test_path(path: &str) -> bool {
    let lowered = path.to_lowercase();
    lowered
        .split('/')
        .any(|segment| TEST_PATH_MARKERS.contains(&segment))
        || lowered.contains(".test.")
        || lowered.contains(".spec.")
        || lowered.contains("_test.")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_test_path_detection() {
        assert!(is_test_path("tests/integration.rs"));
        assert!(is_test_path("src/__tests__/app.ts"));
        assert!(is_test_path("src/api.test.ts"));
        assert!(is_test_path("pkg/server_test.go"));
        assert!(!is_test_path("src/contest.rs"));
    }
}
