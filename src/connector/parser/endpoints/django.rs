use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::{ExtractedEndpoint, Framework, HandlerType, Language};

use super::route_scan::line_of_offset;
use super::EndpointExtractor;

static URL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?m)^\s*(?:path|re_path|url)\s*\(\s*r?['"]([^'"]*)['"]\s*,\s*([A-Za-z_][A-Za-z0-9_.]*)"#,
    )
    .unwrap()
});

static DJANGO_IMPORTS: Lazy<Vec<Regex>> =
    Lazy::new(|| vec![Regex::new(r"^django").unwrap()]);
static DJANGO_FILES: Lazy<Vec<Regex>> =
    Lazy::new(|| vec![Regex::new(r"(^|/)urls\.py$").unwrap()]);
const LANGUAGES: &[Language] = &[Language::Python];

/// Django URLconf entries. URL patterns carry no HTTP verb, so the method is
/// recorded as `ALL`.
pub struct DjangoExtractor;

impl DjangoExtractor {
    pub fn new() -> Self {
        Self
    }

    fn normalise_path(raw: &str) -> String {
        // Django route syntax `<int:pk>/` → `{pk}`; regex routes keep their
        // pattern text with anchors stripped.
        static CONVERTER: Lazy<Regex> =
            Lazy::new(|| Regex::new(r"<(?:[a-z_]+:)?([A-Za-z_][A-Za-z0-9_]*)>").unwrap());
        let cleaned = raw.trim_start_matches('^').trim_end_matches('$');
        let replaced = CONVERTER.replace_all(cleaned, "{$1}");
        if replaced.starts_with('/') {
            replaced.to_string()
        } else {
            format!("/{}", replaced)
        }
    }
}

impl EndpointExtractor for DjangoExtractor {
    fn framework(&self) -> Framework {
        Framework::Django
    }

    fn import_patterns(&self) -> &[Regex] {
        &DJANGO_IMPORTS
    }

    fn file_patterns(&self) -> &[Regex] {
        &DJANGO_FILES
    }

    fn languages(&self) -> &[Language] {
        LANGUAGES
    }

    fn extract(&self, path: &str, content: &str) -> Vec<ExtractedEndpoint> {
        let mut endpoints = Vec::new();
        for captures in URL_PATTERN.captures_iter(content) {
            let route = Self::normalise_path(&captures[1]);
            let view = captures[2].to_string();
            if view == "include" {
                continue;
            }
            let start_line = line_of_offset(content, captures.get(0).unwrap().start());
            let handler_name = view.rsplit('.').next().unwrap_or(&view).to_string();
            let endpoint = ExtractedEndpoint::new(
                "ALL",
                route,
                path,
                start_line,
                start_line,
                Framework::Django,
            )
            .with_handler(handler_name, HandlerType::Reference);
            endpoints.push(endpoint);
        }
        endpoints
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_django_urlconf() {
        let content = r#"
from django.urls import path

urlpatterns = [
    path('users/<int:pk>/', views.user_detail, name='user-detail'),
    path('health/', health_check),
    path('api/', include('api.urls')),
]
"#;
        let endpoints = DjangoExtractor::new().extract("project/urls.py", content);
        assert_eq!(endpoints.len(), 2);
        let detail = &endpoints[0];
        assert_eq!(detail.http_method, "ALL");
        assert_eq!(detail.path, "/users/{pk}/");
        assert_eq!(detail.handler_name.as_deref(), Some("user_detail"));
        assert_eq!(detail.path_params(), vec!["pk"]);
    }
}
