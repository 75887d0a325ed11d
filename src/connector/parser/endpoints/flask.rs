use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::{ExtractedEndpoint, Framework, HandlerType, Language};

use super::route_scan::line_of_offset;
use super::EndpointExtractor;

static ROUTE_DECORATOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?m)^\s*@([A-Za-z_][A-Za-z0-9_]*)\.route\s*\(\s*['"]([^'"]+)['"]([^\n]*)"#,
    )
    .unwrap()
});

static METHODS_ARG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"methods\s*=\s*\[([^\]]*)\]").unwrap());

static APP_BINDING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)([A-Za-z_][A-Za-z0-9_]*)\s*=\s*(?:Flask|Blueprint)\s*\(").unwrap()
});

static FOLLOWING_DEF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*(?:async\s+)?def\s+([A-Za-z_][A-Za-z0-9_]*)\s*\(").unwrap()
});

static FLASK_IMPORTS: Lazy<Vec<Regex>> = Lazy::new(|| vec![Regex::new(r"^flask$").unwrap()]);
static FLASK_FILES: Lazy<Vec<Regex>> = Lazy::new(Vec::new);
const LANGUAGES: &[Language] = &[Language::Python];

/// Flask `@app.route(...)` / `@bp.route(...)` decorators. Flask paths use the
/// `<converter:name>` syntax, normalised here to `{name}`.
pub struct FlaskExtractor;

impl FlaskExtractor {
    pub fn new() -> Self {
        Self
    }

    fn normalise_path(path: &str) -> String {
        static CONVERTER: Lazy<Regex> =
            Lazy::new(|| Regex::new(r"<(?:[a-z_]+:)?([A-Za-z_][A-Za-z0-9_]*)>").unwrap());
        CONVERTER.replace_all(path, "{$1}").to_string()
    }
}

impl EndpointExtractor for FlaskExtractor {
    fn framework(&self) -> Framework {
        Framework::Flask
    }

    fn import_patterns(&self) -> &[Regex] {
        &FLASK_IMPORTS
    }

    fn file_patterns(&self) -> &[Regex] {
        &FLASK_FILES
    }

    fn languages(&self) -> &[Language] {
        LANGUAGES
    }

    fn extract(&self, path: &str, content: &str) -> Vec<ExtractedEndpoint> {
        let objects: Vec<String> = APP_BINDING
            .captures_iter(content)
            .map(|c| c[1].to_string())
            .chain(["app".to_string(), "bp".to_string(), "blueprint".to_string()])
            .collect();

        let mut endpoints = Vec::new();
        for captures in ROUTE_DECORATOR.captures_iter(content) {
            let object = &captures[1];
            if !objects.iter().any(|o| o == object) {
                continue;
            }
            let route_path = Self::normalise_path(&captures[2]);
            let tail = captures.get(3).map(|m| m.as_str()).unwrap_or("");
            let offset = captures.get(0).unwrap().start();
            let start_line = line_of_offset(content, offset);

            let methods: Vec<String> = METHODS_ARG
                .captures(tail)
                .map(|c| {
                    c[1].split(',')
                        .map(|m| m.trim().trim_matches(|q| q == '"' || q == '\'').to_uppercase())
                        .filter(|m| !m.is_empty())
                        .collect()
                })
                .unwrap_or_else(|| vec!["GET".to_string()]);

            let after = &content[captures.get(0).unwrap().end()..];
            let handler = FOLLOWING_DEF.captures(after).map(|c| c[1].to_string());

            for method in methods {
                let mut endpoint = ExtractedEndpoint::new(
                    method,
                    route_path.clone(),
                    path,
                    start_line,
                    start_line,
                    Framework::Flask,
                );
                if let Some(name) = &handler {
                    endpoint = endpoint.with_handler(name.clone(), HandlerType::Reference);
                }
                endpoints.push(endpoint);
            }
        }
        endpoints
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flask_route_with_methods() {
        let content = r#"
from flask import Flask

app = Flask(__name__)

@app.route('/users/<int:user_id>', methods=['GET', 'PUT'])
def user_detail(user_id):
    pass
"#;
        let endpoints = FlaskExtractor::new().extract("app.py", content);
        assert_eq!(endpoints.len(), 2);
        assert_eq!(endpoints[0].http_method, "GET");
        assert_eq!(endpoints[1].http_method, "PUT");
        assert_eq!(endpoints[0].path, "/users/{user_id}");
        assert_eq!(endpoints[0].path_params(), vec!["user_id"]);
        assert_eq!(endpoints[0].handler_name.as_deref(), Some("user_detail"));
    }

    #[test]
    fn test_flask_default_method_is_get() {
        let content = "app = Flask(__name__)\n\n@app.route('/health')\ndef health():\n    return 'ok'\n";
        let endpoints = FlaskExtractor::new().extract("app.py", content);
        assert_eq!(endpoints.len(), 1);
        assert_eq!(endpoints[0].http_method, "GET");
    }

    #[test]
    fn test_blueprint_route() {
        let content = "bp = Blueprint('users', __name__)\n\n@bp.route('/list')\ndef list_users():\n    pass\n";
        let endpoints = FlaskExtractor::new().extract("views/users.py", content);
        assert_eq!(endpoints.len(), 1);
    }
}
