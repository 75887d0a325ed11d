use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::application::{EndpointFilter, StructureIndex};
use crate::domain::{DomainError, Endpoint};

use super::commit_scope::{commit_ids, scope_for_commit, CommitScope};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointMatch {
    pub repo_name: String,
    pub endpoint: Endpoint,
    pub path_params: Vec<String>,
}

/// `find_endpoints`: filtered endpoint scan; path patterns support `*`.
pub struct FindEndpointsUseCase {
    structure: Arc<dyn StructureIndex>,
}

impl FindEndpointsUseCase {
    pub fn new(structure: Arc<dyn StructureIndex>) -> Self {
        Self { structure }
    }

    pub async fn execute(
        &self,
        scopes: &[CommitScope],
        filter: &EndpointFilter,
    ) -> Result<Vec<EndpointMatch>, DomainError> {
        let endpoints = self
            .structure
            .find_endpoints(&commit_ids(scopes), filter)
            .await?;
        Ok(endpoints
            .into_iter()
            .map(|endpoint| {
                let path_params = endpoint
                    .params
                    .iter()
                    .filter(|p| p.location == crate::domain::ParamLocation::Path)
                    .map(|p| p.name.clone())
                    .collect();
                EndpointMatch {
                    repo_name: scope_for_commit(scopes, endpoint.commit_id)
                        .map(|s| s.repo_name().to_string())
                        .unwrap_or_default(),
                    endpoint,
                    path_params,
                }
            })
            .collect())
    }
}

/// Parse CLI-style endpoint filters.
pub fn endpoint_filter(
    method: Option<String>,
    path_pattern: Option<String>,
    framework: Option<String>,
) -> EndpointFilter {
    EndpointFilter {
        method,
        path_pattern,
        framework,
    }
}
