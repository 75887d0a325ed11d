use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::{
    EndpointParam, ExtractedEndpoint, Framework, HandlerType, Language, ParamLocation,
};

use super::route_scan::line_of_offset;
use super::EndpointExtractor;

static DECORATOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?m)^\s*@([A-Za-z_][A-Za-z0-9_]*)\.(get|post|put|delete|patch|options|head)\s*\(\s*['"]([^'"]+)['"]([^\n]*)"#,
    )
    .unwrap()
});

static APP_BINDING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)([A-Za-z_][A-Za-z0-9_]*)\s*=\s*(?:FastAPI|APIRouter)\s*\(").unwrap()
});

static FOLLOWING_DEF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*(?:async\s+)?def\s+([A-Za-z_][A-Za-z0-9_]*)\s*\(([^)]*)\)").unwrap()
});

static RESPONSE_MODEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"response_model\s*=\s*([A-Za-z_][A-Za-z0-9_\[\]]*)").unwrap());
static TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r#"tags\s*=\s*\[([^\]]*)\]"#).unwrap());
static SUMMARY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"summary\s*=\s*['"]([^'"]+)['"]"#).unwrap());
static DEPENDS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Depends\s*\(\s*([A-Za-z_][A-Za-z0-9_.]*)").unwrap());

static FASTAPI_IMPORTS: Lazy<Vec<Regex>> =
    Lazy::new(|| vec![Regex::new(r"^fastapi$").unwrap()]);
static FASTAPI_FILES: Lazy<Vec<Regex>> = Lazy::new(Vec::new);
const LANGUAGES: &[Language] = &[Language::Python];

pub struct FastapiExtractor;

impl FastapiExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Parameters of the handler signature, classified as path params (when
    /// they appear in the route) or query params.
    fn signature_params(signature: &str, route_path: &str) -> (Vec<EndpointParam>, Vec<String>) {
        let mut params = Vec::new();
        let mut dependencies = Vec::new();
        for raw in signature.split(',') {
            let raw = raw.trim();
            if raw.is_empty() || raw == "self" {
                continue;
            }
            if let Some(captures) = DEPENDS.captures(raw) {
                dependencies.push(captures[1].to_string());
                continue;
            }
            let (name_part, default) = match raw.split_once('=') {
                Some((head, tail)) => (head.trim(), Some(tail.trim().to_string())),
                None => (raw, None),
            };
            let (name, annotation) = match name_part.split_once(':') {
                Some((name, ty)) => (name.trim(), Some(ty.trim().to_string())),
                None => (name_part, None),
            };
            if name.is_empty() {
                continue;
            }
            let in_path = route_path.contains(&format!("{{{}}}", name));
            params.push(EndpointParam {
                name: name.to_string(),
                location: if in_path {
                    ParamLocation::Path
                } else {
                    ParamLocation::Query
                },
                type_annotation: annotation,
                required: default.is_none(),
                default_value: default,
            });
        }
        (params, dependencies)
    }
}

impl EndpointExtractor for FastapiExtractor {
    fn framework(&self) -> Framework {
        Framework::Fastapi
    }

    fn import_patterns(&self) -> &[Regex] {
        &FASTAPI_IMPORTS
    }

    fn file_patterns(&self) -> &[Regex] {
        &FASTAPI_FILES
    }

    fn languages(&self) -> &[Language] {
        LANGUAGES
    }

    fn extract(&self, path: &str, content: &str) -> Vec<ExtractedEndpoint> {
        let objects: Vec<String> = APP_BINDING
            .captures_iter(content)
            .map(|c| c[1].to_string())
            .chain(["app".to_string(), "router".to_string()])
            .collect();

        let mut endpoints = Vec::new();
        for captures in DECORATOR.captures_iter(content) {
            let object = &captures[1];
            if !objects.iter().any(|o| o == object) {
                continue;
            }
            let method = &captures[2];
            let route_path = captures[3].to_string();
            let decorator_tail = captures.get(4).map(|m| m.as_str()).unwrap_or("");
            let offset = captures.get(0).unwrap().start();
            let start_line = line_of_offset(content, offset);

            // The decorated handler is the next `def` below the decorator.
            let after = &content[captures.get(0).unwrap().end()..];
            let handler = FOLLOWING_DEF.captures(after);
            let (handler_name, signature, def_end) = match &handler {
                Some(c) => (
                    Some(c[1].to_string()),
                    c.get(2).map(|m| m.as_str().to_string()).unwrap_or_default(),
                    line_of_offset(content, captures.get(0).unwrap().end() + c.get(0).unwrap().end()),
                ),
                None => (None, String::new(), start_line),
            };

            let mut endpoint = ExtractedEndpoint::new(
                method,
                route_path.clone(),
                path,
                start_line,
                def_end.max(start_line),
                Framework::Fastapi,
            );
            if let Some(name) = handler_name {
                endpoint = endpoint.with_handler(name, HandlerType::Reference);
            }
            let (params, dependencies) = Self::signature_params(&signature, &route_path);
            // Keep the synthesised path params, replace the rest.
            endpoint.params.retain(|p| {
                params
                    .iter()
                    .all(|candidate| candidate.name != p.name)
            });
            endpoint.params.extend(params);
            endpoint.dependencies = dependencies;
            endpoint.response_model = RESPONSE_MODEL
                .captures(decorator_tail)
                .map(|c| c[1].to_string());
            endpoint.summary = SUMMARY.captures(decorator_tail).map(|c| c[1].to_string());
            if let Some(tags) = TAGS.captures(decorator_tail) {
                endpoint.tags = tags[1]
                    .split(',')
                    .map(|t| t.trim().trim_matches(|c| c == '"' || c == '\'').to_string())
                    .filter(|t| !t.is_empty())
                    .collect();
            }
            endpoints.push(endpoint);
        }
        endpoints
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fastapi_decorated_route() {
        let content = r#"
from fastapi import FastAPI, Depends

app = FastAPI()

@app.get("/items/{item_id}", response_model=Item, tags=["items"])
async def read_item(item_id: int, q: str = None, db = Depends(get_db)):
    return items[item_id]
"#;
        let endpoints = FastapiExtractor::new().extract("main.py", content);
        assert_eq!(endpoints.len(), 1);
        let endpoint = &endpoints[0];
        assert_eq!(endpoint.http_method, "GET");
        assert_eq!(endpoint.path, "/items/{item_id}");
        assert_eq!(endpoint.handler_name.as_deref(), Some("read_item"));
        assert_eq!(endpoint.response_model.as_deref(), Some("Item"));
        assert_eq!(endpoint.tags, vec!["items"]);
        assert_eq!(endpoint.dependencies, vec!["get_db"]);

        let item_id = endpoint
            .params
            .iter()
            .find(|p| p.name == "item_id")
            .unwrap();
        assert_eq!(item_id.location, ParamLocation::Path);
        assert_eq!(item_id.type_annotation.as_deref(), Some("int"));

        let q = endpoint.params.iter().find(|p| p.name == "q").unwrap();
        assert_eq!(q.location, ParamLocation::Query);
        assert!(!q.required);
    }

    #[test]
    fn test_router_object_binding() {
        let content = r#"
users = APIRouter()

@users.post("/users")
def create_user(payload: UserIn):
    pass
"#;
        let endpoints = FastapiExtractor::new().extract("routes/users.py", content);
        assert_eq!(endpoints.len(), 1);
        assert_eq!(endpoints[0].http_method, "POST");
    }
}
