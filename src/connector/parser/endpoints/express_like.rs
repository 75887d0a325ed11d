use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::{ExtractedEndpoint, Framework, HandlerType, Language};

use super::route_scan::{line_of_offset, split_js_handler_args, statement_end_line};
use super::EndpointExtractor;

static ROUTE_CALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?m)^\s*([A-Za-z_$][A-Za-z0-9_$]*)\.(get|post|put|delete|patch|options|head|all)\s*\(\s*['"`]([^'"`]+)['"`]([^\n]*)"#,
    )
    .unwrap()
});

static APP_BINDING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)(?:const|let|var)\s+([A-Za-z_$][A-Za-z0-9_$]*)\s*=\s*(?:express|fastify|(?:new\s+)?Koa)\s*\(").unwrap()
});

static ROUTER_BINDING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)(?:const|let|var)\s+([A-Za-z_$][A-Za-z0-9_$]*)\s*=\s*(?:express\.Router\s*\(|new\s+Router\s*\()").unwrap()
});

static FASTIFY_ROUTE_CONFIG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?s)\.route\s*\(\s*\{(.{0,400}?)\}"#,
    )
    .unwrap()
});

static CONFIG_METHOD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"method\s*:\s*['"]([A-Za-z]+)['"]"#).unwrap());
static CONFIG_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"url\s*:\s*['"`]([^'"`]+)['"`]"#).unwrap());
static CONFIG_HANDLER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"handler\s*:\s*([A-Za-z_$][A-Za-z0-9_$.]*)").unwrap());

/// The router/application variable names that route calls hang off: declared
/// bindings plus conventional defaults.
fn route_objects(content: &str, defaults: &[&str]) -> HashSet<String> {
    let mut names: HashSet<String> = defaults.iter().map(|s| s.to_string()).collect();
    for captures in APP_BINDING.captures_iter(content) {
        names.insert(captures[1].to_string());
    }
    for captures in ROUTER_BINDING.captures_iter(content) {
        names.insert(captures[1].to_string());
    }
    names
}

/// Shared verb-call scan for Express-style routers.
fn scan_verb_calls(
    path: &str,
    content: &str,
    framework: Framework,
    defaults: &[&str],
) -> Vec<ExtractedEndpoint> {
    let objects = route_objects(content, defaults);
    let mut endpoints = Vec::new();
    for captures in ROUTE_CALL.captures_iter(content) {
        let object = &captures[1];
        if !objects.contains(object) {
            continue;
        }
        let method = &captures[2];
        let route_path = &captures[3];
        let tail = captures.get(4).map(|m| m.as_str()).unwrap_or("");
        let offset = captures.get(0).unwrap().start();
        let open = captures.get(0).unwrap().as_str().find('(').unwrap_or(0) + offset;

        let start_line = line_of_offset(content, offset);
        let end_line = statement_end_line(content, open, 50);
        let (middleware, handler) = split_js_handler_args(tail);

        let mut endpoint = ExtractedEndpoint::new(
            method,
            route_path,
            path,
            start_line,
            end_line.max(start_line),
            framework,
        );
        endpoint.middleware = middleware;
        if let Some(handler_name) = handler {
            endpoint = endpoint.with_handler(handler_name, HandlerType::Reference);
        }
        endpoints.push(endpoint);
    }
    endpoints
}

// ── Express ──────────────────────────────────────────────────────────────

static EXPRESS_IMPORTS: Lazy<Vec<Regex>> =
    Lazy::new(|| vec![Regex::new(r"^express$").unwrap()]);
static EXPRESS_FILES: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![Regex::new(r"(^|/)routes?/.*\.(js|ts|mjs|cjs)$").unwrap()]
});
const JS_LANGUAGES: &[Language] = &[Language::JavaScript, Language::TypeScript];

pub struct ExpressExtractor;

impl ExpressExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl EndpointExtractor for ExpressExtractor {
    fn framework(&self) -> Framework {
        Framework::Express
    }

    fn import_patterns(&self) -> &[Regex] {
        &EXPRESS_IMPORTS
    }

    fn file_patterns(&self) -> &[Regex] {
        &EXPRESS_FILES
    }

    fn languages(&self) -> &[Language] {
        JS_LANGUAGES
    }

    fn extract(&self, path: &str, content: &str) -> Vec<ExtractedEndpoint> {
        scan_verb_calls(path, content, Framework::Express, &["app", "router"])
    }
}

// ── Koa ──────────────────────────────────────────────────────────────────

static KOA_IMPORTS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"^koa$").unwrap(),
        Regex::new(r"^@koa/router$").unwrap(),
        Regex::new(r"^koa-router$").unwrap(),
    ]
});
static KOA_FILES: Lazy<Vec<Regex>> = Lazy::new(Vec::new);

pub struct KoaExtractor;

impl KoaExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl EndpointExtractor for KoaExtractor {
    fn framework(&self) -> Framework {
        Framework::Koa
    }

    fn import_patterns(&self) -> &[Regex] {
        &KOA_IMPORTS
    }

    fn file_patterns(&self) -> &[Regex] {
        &KOA_FILES
    }

    fn languages(&self) -> &[Language] {
        JS_LANGUAGES
    }

    fn extract(&self, path: &str, content: &str) -> Vec<ExtractedEndpoint> {
        scan_verb_calls(path, content, Framework::Koa, &["router"])
    }
}

// ── Fastify ──────────────────────────────────────────────────────────────

static FASTIFY_IMPORTS: Lazy<Vec<Regex>> =
    Lazy::new(|| vec![Regex::new(r"^fastify$").unwrap()]);
static FASTIFY_FILES: Lazy<Vec<Regex>> = Lazy::new(Vec::new);

pub struct FastifyExtractor;

impl FastifyExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl EndpointExtractor for FastifyExtractor {
    fn framework(&self) -> Framework {
        Framework::Fastify
    }

    fn import_patterns(&self) -> &[Regex] {
        &FASTIFY_IMPORTS
    }

    fn file_patterns(&self) -> &[Regex] {
        &FASTIFY_FILES
    }

    fn languages(&self) -> &[Language] {
        JS_LANGUAGES
    }

    fn extract(&self, path: &str, content: &str) -> Vec<ExtractedEndpoint> {
        let mut endpoints =
            scan_verb_calls(path, content, Framework::Fastify, &["fastify", "app", "server"]);

        // `.route({ method, url, handler })` configuration objects.
        for captures in FASTIFY_ROUTE_CONFIG.captures_iter(content) {
            let body = &captures[1];
            let Some(method) = CONFIG_METHOD.captures(body).map(|c| c[1].to_string()) else {
                continue;
            };
            let Some(url) = CONFIG_URL.captures(body).map(|c| c[1].to_string()) else {
                continue;
            };
            let offset = captures.get(0).unwrap().start();
            let start_line = line_of_offset(content, offset);
            let end_line = line_of_offset(content, captures.get(0).unwrap().end());
            let mut endpoint = ExtractedEndpoint::new(
                method,
                url,
                path,
                start_line,
                end_line,
                Framework::Fastify,
            );
            if let Some(handler) = CONFIG_HANDLER.captures(body).map(|c| c[1].to_string()) {
                endpoint = endpoint.with_handler(handler, HandlerType::Reference);
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
    fn test_express_route_with_handler_reference() {
        let content = r#"
const express = require('express');
const app = express();

app.get('/users/:id', auth, getUser);
app.post('/users', createUser);
"#;
        let endpoints = ExpressExtractor::new().extract("src/app.js", content);
        assert_eq!(endpoints.len(), 2);
        let get = &endpoints[0];
        assert_eq!(get.http_method, "GET");
        assert_eq!(get.path, "/users/:id");
        assert_eq!(get.handler_name.as_deref(), Some("getUser"));
        assert_eq!(get.middleware, vec!["auth"]);
        assert_eq!(get.path_params(), vec!["id"]);
    }

    #[test]
    fn test_express_inline_handler() {
        let content = "const app = express();\napp.get('/ping', (req, res) => res.send('pong'));\n";
        let endpoints = ExpressExtractor::new().extract("server.js", content);
        assert_eq!(endpoints.len(), 1);
        assert_eq!(endpoints[0].handler_name, None);
        assert_eq!(endpoints[0].handler_type, HandlerType::Inline);
    }

    #[test]
    fn test_express_router_binding() {
        let content = r#"
const userRouter = express.Router();
userRouter.delete('/:id', removeUser);
"#;
        let endpoints = ExpressExtractor::new().extract("routes/users.js", content);
        assert_eq!(endpoints.len(), 1);
        assert_eq!(endpoints[0].http_method, "DELETE");
    }

    #[test]
    fn test_unrelated_object_calls_ignored() {
        let content = "const client = makeClient();\nclient.get('/not-a-route', cb);\n";
        let endpoints = ExpressExtractor::new().extract("src/client.js", content);
        assert!(endpoints.is_empty());
    }

    #[test]
    fn test_fastify_route_config() {
        let content = r#"
const fastify = require('fastify')();
fastify.route({
  method: 'PUT',
  url: '/items/:id',
  handler: updateItem
});
"#;
        let endpoints = FastifyExtractor::new().extract("server.js", content);
        assert_eq!(endpoints.len(), 1);
        assert_eq!(endpoints[0].http_method, "PUT");
        assert_eq!(endpoints[0].path, "/items/:id");
        assert_eq!(endpoints[0].handler_name.as_deref(), Some("updateItem"));
    }

    #[test]
    fn test_koa_router_routes() {
        let content = r#"
const Router = require('@koa/router');
const router = new Router();
router.get('/posts/:id', showPost);
"#;
        let endpoints = KoaExtractor::new().extract("src/routes.js", content);
        assert_eq!(endpoints.len(), 1);
        assert_eq!(endpoints[0].framework, Framework::Koa);
    }
}
