use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::application::EmbeddingService;
use crate::domain::DomainError;

const EMBED_PATH: &str = "/embed";

#[derive(serde::Serialize)]
struct EmbedRequest<'a> {
    texts: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
    #[allow(dead_code)]
    dimensions: Option<usize>,
}

#[derive(Deserialize)]
struct InfoResponse {
    dimensions: Option<usize>,
    max_tokens: Option<usize>,
}

/// HTTP embedding provider: `POST /embed {texts}` returning
/// `{embeddings, dimensions}`, with optional bearer auth.
///
/// Readiness is gated by a probe against `/info` (falling back to `/health`)
/// with a 2-second timeout, so an unreachable service fails fast instead of
/// stalling a whole indexing run.
pub struct RemoteEmbedding {
    client: reqwest::Client,
    probe_client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    dimensions: std::sync::atomic::AtomicUsize,
    max_tokens: std::sync::atomic::AtomicUsize,
}

impl RemoteEmbedding {
    pub fn new(base_url: &str, api_key: Option<String>, default_dimensions: usize) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(60))
                .build()
                .unwrap_or_default(),
            probe_client: reqwest::Client::builder()
                .connect_timeout(Duration::from_secs(2))
                .timeout(Duration::from_secs(2))
                .build()
                .unwrap_or_default(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            dimensions: std::sync::atomic::AtomicUsize::new(default_dimensions),
            max_tokens: std::sync::atomic::AtomicUsize::new(512),
        }
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }
}

#[async_trait]
impl EmbeddingService for RemoteEmbedding {
    async fn initialize(&self) -> Result<(), DomainError> {
        // `/info` reports model capabilities; `/health` is the bare liveness
        // fallback for older services.
        let info_url = format!("{}/info", self.base_url);
        let info = self
            .authorize(self.probe_client.get(&info_url))
            .send()
            .await;
        match info {
            Ok(response) if response.status().is_success() => {
                if let Ok(parsed) = response.json::<InfoResponse>().await {
                    if let Some(dimensions) = parsed.dimensions {
                        self.dimensions
                            .store(dimensions, std::sync::atomic::Ordering::SeqCst);
                    }
                    if let Some(max_tokens) = parsed.max_tokens {
                        self.max_tokens
                            .store(max_tokens, std::sync::atomic::Ordering::SeqCst);
                    }
                }
                debug!("Remote embedding service ready at {}", self.base_url);
                return Ok(());
            }
            _ => {}
        }
        let health_url = format!("{}/health", self.base_url);
        match self.probe_client.get(&health_url).send().await {
            Ok(response) if response.status().is_success() => {
                debug!("Remote embedding service healthy at {}", self.base_url);
                Ok(())
            }
            Ok(response) => Err(DomainError::embedding(format!(
                "Embedding service at {} returned {}",
                self.base_url,
                response.status()
            ))),
            Err(e) => Err(DomainError::embedding(format!(
                "Embedding service not reachable at {}: {}",
                self.base_url, e
            ))),
        }
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, DomainError> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| DomainError::embedding("Embedding service returned no vectors"))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, DomainError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let url = format!("{}{}", self.base_url, EMBED_PATH);
        let response = self
            .authorize(self.client.post(&url))
            .json(&EmbedRequest { texts })
            .send()
            .await
            .map_err(|e| DomainError::embedding(format!("Embed request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!("Embedding service returned {}: {}", status, body);
            return Err(DomainError::embedding(format!(
                "Embedding service returned {}",
                status
            )));
        }

        let parsed: EmbedResponse = response
            .json()
            .await
            .map_err(|e| DomainError::embedding(format!("Bad embedding response: {}", e)))?;
        if parsed.embeddings.len() != texts.len() {
            return Err(DomainError::embedding(format!(
                "Embedding count mismatch: sent {}, got {}",
                texts.len(),
                parsed.embeddings.len()
            )));
        }
        Ok(parsed.embeddings)
    }

    fn dimensions(&self) -> usize {
        self.dimensions.load(std::sync::atomic::Ordering::SeqCst)
    }

    fn max_tokens(&self) -> usize {
        self.max_tokens.load(std::sync::atomic::Ordering::SeqCst)
    }
}
