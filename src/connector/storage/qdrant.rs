use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::application::{ChunkHit, ChunkPayload, SearchFilter, VectorRepository, VectorStats};
use crate::domain::DomainError;

/// HTTP client for an external Qdrant vector database. The core only sees
/// the [`VectorRepository`] interface; chunk metadata rides in point
/// payloads, with the commit list as a payload array for scoped search.
pub struct QdrantVectorStore {
    client: reqwest::Client,
    base_url: String,
    collection: String,
    api_key: Option<String>,
    dimensions: usize,
}

#[derive(Debug, Deserialize)]
struct ScoredPoint {
    id: Value,
    score: Option<f32>,
    payload: Option<Value>,
}

impl QdrantVectorStore {
    pub fn new(
        url: &str,
        collection: &str,
        api_key: Option<String>,
        dimensions: usize,
    ) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
            base_url: url.trim_end_matches('/').to_string(),
            collection: collection.to_string(),
            api_key,
            dimensions,
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self
            .client
            .request(method, format!("{}{}", self.base_url, path));
        if let Some(key) = &self.api_key {
            builder = builder.header("api-key", key);
        }
        builder
    }

    async fn send(
        &self,
        builder: reqwest::RequestBuilder,
        context: &str,
    ) -> Result<Value, DomainError> {
        let response = builder
            .send()
            .await
            .map_err(|e| DomainError::storage(format!("Qdrant {}: request failed: {}", context, e)))?;
        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| DomainError::storage(format!("Qdrant {}: bad response: {}", context, e)))?;
        if !status.is_success() {
            return Err(DomainError::storage(format!(
                "Qdrant {}: HTTP {}: {}",
                context, status, body
            )));
        }
        Ok(body)
    }

    fn payload_of(payload: &ChunkPayload) -> Value {
        json!({
            "repo_id": payload.repo_id,
            "repo_name": payload.repo_name,
            "file_path": payload.chunk.file_path(),
            "symbol": payload.chunk.symbol(),
            "symbol_type": payload.chunk.symbol_type().as_str(),
            "language": payload.chunk.language().as_str(),
            "content_type": payload.content_type.as_str(),
            "start_line": payload.chunk.start_line(),
            "end_line": payload.chunk.end_line(),
            "content": payload.chunk.content(),
            "commits": [payload.commit_sha],
        })
    }

    fn filter_of(filter: &SearchFilter) -> Value {
        let mut must = Vec::new();
        if let Some(repo_id) = &filter.repo_id {
            must.push(json!({"key": "repo_id", "match": {"value": repo_id}}));
        }
        if let Some(commit_sha) = &filter.commit_sha {
            must.push(json!({"key": "commits", "match": {"any": [commit_sha]}}));
        }
        if let Some(language) = &filter.language {
            must.push(json!({"key": "language", "match": {"value": language}}));
        }
        if let Some(content_type) = &filter.content_type {
            must.push(json!({"key": "content_type", "match": {"value": content_type.as_str()}}));
        }
        json!({ "must": must })
    }

    fn hit_from_payload(id: &Value, score: f32, payload: &Value) -> Option<ChunkHit> {
        let text = |key: &str| -> String {
            payload
                .get(key)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string()
        };
        let number = |key: &str| -> u32 {
            payload.get(key).and_then(|v| v.as_u64()).unwrap_or(0) as u32
        };
        Some(ChunkHit {
            chunk_id: Uuid::parse_str(id.as_str()?).ok()?,
            repo_id: text("repo_id"),
            repo_name: text("repo_name"),
            file_path: text("file_path"),
            symbol: text("symbol"),
            symbol_type: text("symbol_type"),
            language: text("language"),
            content_type: text("content_type"),
            start_line: number("start_line"),
            end_line: number("end_line"),
            content: text("content"),
            score,
        })
    }

    async fn retrieve_points(&self, chunk_ids: &[Uuid]) -> Result<Vec<ScoredPoint>, DomainError> {
        let ids: Vec<String> = chunk_ids.iter().map(|id| id.to_string()).collect();
        let body = self
            .send(
                self.request(
                    reqwest::Method::POST,
                    &format!("/collections/{}/points", self.collection),
                )
                .json(&json!({ "ids": ids, "with_payload": true })),
                "retrieve",
            )
            .await?;
        let points: Vec<ScoredPoint> = serde_json::from_value(body["result"].clone())
            .map_err(|e| DomainError::storage(format!("Qdrant retrieve: bad points: {}", e)))?;
        Ok(points)
    }
}

#[async_trait]
impl VectorRepository for QdrantVectorStore {
    async fn initialize(&self) -> Result<(), DomainError> {
        // Idempotent collection ensure; an existing collection is fine.
        let result = self
            .send(
                self.request(
                    reqwest::Method::PUT,
                    &format!("/collections/{}", self.collection),
                )
                .json(&json!({
                    "vectors": { "size": self.dimensions, "distance": "Cosine" }
                })),
                "create collection",
            )
            .await;
        match result {
            Ok(_) => {
                debug!("Qdrant collection '{}' ready", self.collection);
                Ok(())
            }
            Err(e) if e.to_string().contains("already exists") => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn upsert_chunks(&self, payloads: &[ChunkPayload]) -> Result<(), DomainError> {
        if payloads.is_empty() {
            return Ok(());
        }
        // Chunks already present keep their commit list; merge before upsert
        // so a shared chunk stays visible to every referencing commit.
        let ids: Vec<Uuid> = payloads.iter().map(|p| p.chunk_id).collect();
        let existing = self.retrieve_points(&ids).await.unwrap_or_default();

        let points: Vec<Value> = payloads
            .iter()
            .map(|payload| {
                let mut body = Self::payload_of(payload);
                if let Some(point) = existing
                    .iter()
                    .find(|p| p.id.as_str() == Some(payload.chunk_id.to_string().as_str()))
                {
                    if let Some(previous) = point
                        .payload
                        .as_ref()
                        .and_then(|p| p.get("commits"))
                        .and_then(|c| c.as_array())
                    {
                        let mut commits: Vec<Value> = previous.clone();
                        let sha = Value::String(payload.commit_sha.clone());
                        if !commits.contains(&sha) {
                            commits.push(sha);
                        }
                        body["commits"] = Value::Array(commits);
                    }
                }
                json!({
                    "id": payload.chunk_id.to_string(),
                    "vector": payload.vector,
                    "payload": body,
                })
            })
            .collect();

        self.send(
            self.request(
                reqwest::Method::PUT,
                &format!("/collections/{}/points?wait=true", self.collection),
            )
            .json(&json!({ "points": points })),
            "upsert",
        )
        .await?;
        debug!("Upserted {} points into Qdrant", payloads.len());
        Ok(())
    }

    async fn add_commit_to_chunk(
        &self,
        chunk_id: Uuid,
        commit_sha: &str,
    ) -> Result<(), DomainError> {
        let points = self.retrieve_points(&[chunk_id]).await?;
        let Some(point) = points.first() else {
            return Err(DomainError::storage(format!(
                "Qdrant: chunk {} not found",
                chunk_id
            )));
        };
        let mut commits: Vec<Value> = point
            .payload
            .as_ref()
            .and_then(|p| p.get("commits"))
            .and_then(|c| c.as_array())
            .cloned()
            .unwrap_or_default();
        let sha = Value::String(commit_sha.to_string());
        if commits.contains(&sha) {
            return Ok(());
        }
        commits.push(sha);
        self.send(
            self.request(
                reqwest::Method::POST,
                &format!("/collections/{}/points/payload?wait=true", self.collection),
            )
            .json(&json!({
                "points": [chunk_id.to_string()],
                "payload": { "commits": commits },
            })),
            "set payload",
        )
        .await?;
        Ok(())
    }

    async fn search(
        &self,
        query_vector: &[f32],
        filter: &SearchFilter,
        limit: usize,
    ) -> Result<Vec<ChunkHit>, DomainError> {
        let over_fetch = if filter.path_pattern.is_some() {
            limit * 4
        } else {
            limit
        };
        let body = self
            .send(
                self.request(
                    reqwest::Method::POST,
                    &format!("/collections/{}/points/search", self.collection),
                )
                .json(&json!({
                    "vector": query_vector,
                    "limit": over_fetch,
                    "filter": Self::filter_of(filter),
                    "with_payload": true,
                })),
                "search",
            )
            .await?;
        let points: Vec<ScoredPoint> = serde_json::from_value(body["result"].clone())
            .map_err(|e| DomainError::storage(format!("Qdrant search: bad points: {}", e)))?;

        let mut hits = Vec::new();
        for point in points {
            let Some(payload) = &point.payload else {
                continue;
            };
            let Some(hit) =
                Self::hit_from_payload(&point.id, point.score.unwrap_or(0.0), payload)
            else {
                warn!("Qdrant search returned malformed point: {:?}", point.id);
                continue;
            };
            if let Some(pattern) = &filter.path_pattern {
                if !crate::domain::wildcard_match(pattern, &hit.file_path) {
                    continue;
                }
            }
            hits.push(hit);
            if hits.len() >= limit {
                break;
            }
        }
        Ok(hits)
    }

    async fn get_chunks(&self, chunk_ids: &[Uuid]) -> Result<Vec<ChunkHit>, DomainError> {
        let points = self.retrieve_points(chunk_ids).await?;
        Ok(points
            .iter()
            .filter_map(|point| {
                let payload = point.payload.as_ref()?;
                Self::hit_from_payload(&point.id, 1.0, payload)
            })
            .collect())
    }

    async fn chunks_exist(&self, chunk_ids: &[Uuid]) -> Result<Vec<Uuid>, DomainError> {
        if chunk_ids.is_empty() {
            return Ok(Vec::new());
        }
        let points = self.retrieve_points(chunk_ids).await?;
        Ok(points
            .iter()
            .filter_map(|point| point.id.as_str().and_then(|s| Uuid::parse_str(s).ok()))
            .collect())
    }

    async fn delete_chunks(&self, chunk_ids: &[Uuid]) -> Result<u64, DomainError> {
        if chunk_ids.is_empty() {
            return Ok(0);
        }
        let ids: Vec<String> = chunk_ids.iter().map(|id| id.to_string()).collect();
        self.send(
            self.request(
                reqwest::Method::POST,
                &format!("/collections/{}/points/delete?wait=true", self.collection),
            )
            .json(&json!({ "points": ids })),
            "delete",
        )
        .await?;
        Ok(chunk_ids.len() as u64)
    }

    async fn delete_by_repo_id(&self, repo_id: &str) -> Result<u64, DomainError> {
        self.send(
            self.request(
                reqwest::Method::POST,
                &format!("/collections/{}/points/delete?wait=true", self.collection),
            )
            .json(&json!({
                "filter": { "must": [{"key": "repo_id", "match": {"value": repo_id}}] }
            })),
            "delete by repo",
        )
        .await?;
        Ok(0)
    }

    async fn get_stats(&self) -> Result<VectorStats, DomainError> {
        let body = self
            .send(
                self.request(
                    reqwest::Method::GET,
                    &format!("/collections/{}", self.collection),
                ),
                "stats",
            )
            .await?;
        let count = body["result"]["points_count"].as_u64().unwrap_or(0);
        Ok(VectorStats {
            total_chunks: count,
            total_embeddings: count,
        })
    }

    async fn close(&self) -> Result<(), DomainError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ContentType;

    #[test]
    fn test_filter_building() {
        let filter = SearchFilter {
            repo_id: Some("repo-1".to_string()),
            commit_sha: Some("abc".to_string()),
            language: Some("rust".to_string()),
            path_pattern: None,
            content_type: Some(ContentType::Code),
        };
        let value = QdrantVectorStore::filter_of(&filter);
        let must = value["must"].as_array().unwrap();
        assert_eq!(must.len(), 4);
        assert_eq!(must[1]["key"], "commits");
    }

    #[test]
    fn test_hit_from_payload() {
        let payload = json!({
            "repo_id": "r", "repo_name": "demo", "file_path": "src/a.rs",
            "symbol": "f", "symbol_type": "function", "language": "rust",
            "content_type": "code", "start_line": 1, "end_line": 3,
            "content": "fn f() {}",
        });
        let id = json!(Uuid::nil().to_string());
        let hit = QdrantVectorStore::hit_from_payload(&id, 0.9, &payload).unwrap();
        assert_eq!(hit.file_path, "src/a.rs");
        assert_eq!(hit.start_line, 1);
        assert!((hit.score - 0.9).abs() < f32::EPSILON);
    }
}
