use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::{ExtractedEndpoint, Framework, HandlerType, Language};

use super::route_scan::line_of_offset;
use super::EndpointExtractor;

static CONTROLLER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"@Controller\s*\(\s*(?:['"]([^'"]*)['"])?\s*\)"#).unwrap()
});

static METHOD_DECORATOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?m)^\s*@(Get|Post|Put|Delete|Patch|Options|Head|All)\s*\(\s*(?:['"]([^'"]*)['"])?\s*\)"#,
    )
    .unwrap()
});

static METHOD_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*(?:async\s+)?([A-Za-z_$][A-Za-z0-9_$]*)\s*\(").unwrap()
});

static NESTJS_IMPORTS: Lazy<Vec<Regex>> =
    Lazy::new(|| vec![Regex::new(r"^@nestjs/").unwrap()]);
static NESTJS_FILES: Lazy<Vec<Regex>> =
    Lazy::new(|| vec![Regex::new(r"\.controller\.(ts|js)$").unwrap()]);
const LANGUAGES: &[Language] = &[Language::TypeScript, Language::JavaScript];

/// NestJS controllers: `@Controller('base')` classes whose methods carry HTTP
/// verb decorators.
pub struct NestjsExtractor;

impl NestjsExtractor {
    pub fn new() -> Self {
        Self
    }

    fn join_paths(base: &str, sub: &str) -> String {
        let base = base.trim_matches('/');
        let sub = sub.trim_matches('/');
        match (base.is_empty(), sub.is_empty()) {
            (true, true) => "/".to_string(),
            (true, false) => format!("/{}", sub),
            (false, true) => format!("/{}", base),
            (false, false) => format!("/{}/{}", base, sub),
        }
    }
}

impl EndpointExtractor for NestjsExtractor {
    fn framework(&self) -> Framework {
        Framework::Nestjs
    }

    fn import_patterns(&self) -> &[Regex] {
        &NESTJS_IMPORTS
    }

    fn file_patterns(&self) -> &[Regex] {
        &NESTJS_FILES
    }

    fn languages(&self) -> &[Language] {
        LANGUAGES
    }

    fn extract(&self, path: &str, content: &str) -> Vec<ExtractedEndpoint> {
        let base = CONTROLLER
            .captures(content)
            .and_then(|c| c.get(1).map(|m| m.as_str().to_string()))
            .unwrap_or_default();

        let mut endpoints = Vec::new();
        for captures in METHOD_DECORATOR.captures_iter(content) {
            let verb = captures[1].to_uppercase();
            let sub_path = captures.get(2).map(|m| m.as_str()).unwrap_or("");
            let offset = captures.get(0).unwrap().start();
            let start_line = line_of_offset(content, offset);

            // The decorated class method follows (possibly after other
            // decorators on intermediate lines).
            let after = &content[captures.get(0).unwrap().end()..];
            let handler = METHOD_NAME
                .captures_iter(after)
                .map(|c| c[1].to_string())
                .find(|name| !name.starts_with('@') && name != "constructor");

            let mut endpoint = ExtractedEndpoint::new(
                verb,
                Self::join_paths(&base, sub_path),
                path,
                start_line,
                start_line,
                Framework::Nestjs,
            );
            if let Some(name) = handler {
                endpoint = endpoint.with_handler(name, HandlerType::ClassMethod);
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
    fn test_nestjs_controller_routes() {
        let content = r#"
import { Controller, Get, Post } from '@nestjs/common';

@Controller('users')
export class UsersController {
    @Get(':id')
    findOne(@Param('id') id: string) {
        return this.service.findOne(id);
    }

    @Post()
    create(@Body() dto: CreateUserDto) {
        return this.service.create(dto);
    }
}
"#;
        let endpoints = NestjsExtractor::new().extract("users.controller.ts", content);
        assert_eq!(endpoints.len(), 2);
        let find_one = &endpoints[0];
        assert_eq!(find_one.http_method, "GET");
        assert_eq!(find_one.path, "/users/:id");
        assert_eq!(find_one.handler_name.as_deref(), Some("findOne"));
        assert_eq!(find_one.handler_type, HandlerType::ClassMethod);
        let create = &endpoints[1];
        assert_eq!(create.path, "/users");
        assert_eq!(create.handler_name.as_deref(), Some("create"));
    }

    #[test]
    fn test_controller_without_base_path() {
        let content = "@Controller()\nclass C {\n  @Get('health')\n  health() {}\n}\n";
        let endpoints = NestjsExtractor::new().extract("app.controller.ts", content);
        assert_eq!(endpoints[0].path, "/health");
    }
}
