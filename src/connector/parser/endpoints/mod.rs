mod django;
mod express_like;
mod fastapi;
mod flask;
mod mcp_tools;
mod nestjs;
mod rails;
mod route_scan;
mod sinatra;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use tracing::debug;

use crate::application::EndpointDetection;
use crate::domain::{ExtractedEndpoint, Framework, Language};

pub use django::DjangoExtractor;
pub use express_like::{ExpressExtractor, FastifyExtractor, KoaExtractor};
pub use fastapi::FastapiExtractor;
pub use flask::FlaskExtractor;
pub use mcp_tools::McpToolExtractor;
pub use nestjs::NestjsExtractor;
pub use rails::RailsExtractor;
pub use sinatra::SinatraExtractor;

/// One framework-specific route recogniser.
pub trait EndpointExtractor: Send + Sync {
    fn framework(&self) -> Framework;

    /// Regexes matched against the file's import specifiers.
    fn import_patterns(&self) -> &[Regex];

    /// Regexes matched against the file path.
    fn file_patterns(&self) -> &[Regex];

    /// Source languages this extractor reads.
    fn languages(&self) -> &[Language];

    fn can_handle(&self, path: &str, import_specifiers: &[String]) -> bool {
        let language = Language::from_path(Path::new(path));
        if !self.languages().contains(&language) {
            return false;
        }
        self.import_patterns()
            .iter()
            .any(|p| import_specifiers.iter().any(|s| p.is_match(s)))
            || self.file_patterns().iter().any(|p| p.is_match(path))
    }

    fn extract(&self, path: &str, content: &str) -> Vec<ExtractedEndpoint>;
}

/// A framework detection with its confidence score.
#[derive(Debug, Clone)]
pub struct FrameworkDetection {
    pub framework: Framework,
    pub confidence: f32,
}

/// Registry of endpoint extractors (C5). Detection is two-signal: import
/// specifier patterns and file path patterns, each worth half the score,
/// clamped to 1.0. A file may activate several frameworks.
pub struct EndpointRegistry {
    extractors: Vec<Arc<dyn EndpointExtractor>>,
}

impl EndpointRegistry {
    pub fn new() -> Self {
        Self {
            extractors: vec![
                Arc::new(ExpressExtractor::new()),
                Arc::new(KoaExtractor::new()),
                Arc::new(FastifyExtractor::new()),
                Arc::new(NestjsExtractor::new()),
                Arc::new(FastapiExtractor::new()),
                Arc::new(FlaskExtractor::new()),
                Arc::new(DjangoExtractor::new()),
                Arc::new(RailsExtractor::new()),
                Arc::new(SinatraExtractor::new()),
                Arc::new(McpToolExtractor::new()),
            ],
        }
    }

    /// Frameworks activated for a file, highest confidence first.
    pub fn detect_frameworks(
        &self,
        path: &str,
        import_specifiers: &[String],
    ) -> Vec<FrameworkDetection> {
        let mut detections: Vec<FrameworkDetection> = self
            .extractors
            .iter()
            .filter_map(|extractor| {
                let import_hits = extractor
                    .import_patterns()
                    .iter()
                    .filter(|p| import_specifiers.iter().any(|s| p.is_match(s)))
                    .count();
                let file_hits = extractor
                    .file_patterns()
                    .iter()
                    .filter(|p| p.is_match(path))
                    .count();
                let confidence = (import_hits as f32 * 0.5 + file_hits as f32 * 0.5).min(1.0);
                if confidence > 0.0 {
                    Some(FrameworkDetection {
                        framework: extractor.framework(),
                        confidence,
                    })
                } else {
                    None
                }
            })
            .collect();
        detections.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        detections
    }
}

impl Default for EndpointRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EndpointDetection for EndpointRegistry {
    async fn detect(
        &self,
        path: &str,
        content: &str,
        import_specifiers: &[String],
    ) -> Vec<ExtractedEndpoint> {
        let detections = self.detect_frameworks(path, import_specifiers);
        let mut endpoints = Vec::new();
        for detection in detections {
            let Some(extractor) = self
                .extractors
                .iter()
                .find(|e| e.framework() == detection.framework)
            else {
                continue;
            };
            if !extractor.can_handle(path, import_specifiers) {
                continue;
            }
            let found = extractor.extract(path, content);
            if !found.is_empty() {
                debug!(
                    "Detected {} {} endpoints in {} (confidence {:.2})",
                    found.len(),
                    detection.framework,
                    path,
                    detection.confidence
                );
            }
            endpoints.extend(found);
        }
        endpoints
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detection_orders_by_confidence() {
        let registry = EndpointRegistry::new();
        let detections = registry.detect_frameworks(
            "config/routes.rb",
            &["sinatra".to_string()],
        );
        // Rails wins on the file pattern; sinatra activates on import.
        assert!(detections.iter().any(|d| d.framework == Framework::Rails));
        assert!(detections.iter().any(|d| d.framework == Framework::Sinatra));
    }

    #[test]
    fn test_no_detection_without_signals() {
        let registry = EndpointRegistry::new();
        assert!(registry
            .detect_frameworks("src/math.ts", &["lodash".to_string()])
            .is_empty());
    }

    #[tokio::test]
    async fn test_language_gate_blocks_wrong_language() {
        let registry = EndpointRegistry::new();
        // Express import pattern but a Python file: nothing extracted.
        let endpoints = registry
            .detect("app.py", "app.get('/x', h)", &["express".to_string()])
            .await;
        assert!(endpoints.is_empty());
    }
}
