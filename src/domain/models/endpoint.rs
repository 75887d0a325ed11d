use serde::{Deserialize, Serialize};

/// The web framework (or tool protocol) an endpoint was declared with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Framework {
    Express,
    Fastify,
    Koa,
    Fastapi,
    Flask,
    Django,
    Rails,
    Sinatra,
    Nestjs,
    Mcp,
    Unknown,
}

impl Framework {
    pub fn as_str(&self) -> &'static str {
        match self {
            Framework::Express => "express",
            Framework::Fastify => "fastify",
            Framework::Koa => "koa",
            Framework::Fastapi => "fastapi",
            Framework::Flask => "flask",
            Framework::Django => "django",
            Framework::Rails => "rails",
            Framework::Sinatra => "sinatra",
            Framework::Nestjs => "nestjs",
            Framework::Mcp => "mcp",
            Framework::Unknown => "unknown",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "express" => Framework::Express,
            "fastify" => Framework::Fastify,
            "koa" => Framework::Koa,
            "fastapi" => Framework::Fastapi,
            "flask" => Framework::Flask,
            "django" => Framework::Django,
            "rails" => Framework::Rails,
            "sinatra" => Framework::Sinatra,
            "nestjs" => Framework::Nestjs,
            "mcp" => Framework::Mcp,
            _ => Framework::Unknown,
        }
    }
}

impl std::fmt::Display for Framework {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How the route handler is attached to the declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandlerType {
    Inline,
    Reference,
    ControllerAction,
    ClassMethod,
}

impl HandlerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            HandlerType::Inline => "inline",
            HandlerType::Reference => "reference",
            HandlerType::ControllerAction => "controller_action",
            HandlerType::ClassMethod => "class_method",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "reference" => HandlerType::Reference,
            "controller_action" => HandlerType::ControllerAction,
            "class_method" => HandlerType::ClassMethod,
            _ => HandlerType::Inline,
        }
    }
}

/// Where an endpoint parameter is carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamLocation {
    Path,
    Query,
    Header,
    Cookie,
    Body,
}

impl ParamLocation {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamLocation::Path => "path",
            ParamLocation::Query => "query",
            ParamLocation::Header => "header",
            ParamLocation::Cookie => "cookie",
            ParamLocation::Body => "body",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "query" => ParamLocation::Query,
            "header" => ParamLocation::Header,
            "cookie" => ParamLocation::Cookie,
            "body" => ParamLocation::Body,
            _ => ParamLocation::Path,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointParam {
    pub name: String,
    pub location: ParamLocation,
    pub type_annotation: Option<String>,
    pub required: bool,
    pub default_value: Option<String>,
}

impl EndpointParam {
    pub fn path(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            location: ParamLocation::Path,
            type_annotation: None,
            required: true,
            default_value: None,
        }
    }
}

/// An endpoint as emitted by a framework extractor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedEndpoint {
    pub http_method: String,
    pub path: String,
    pub file_path: String,
    pub start_line: u32,
    pub end_line: u32,
    pub framework: Framework,
    pub handler_name: Option<String>,
    pub handler_type: HandlerType,
    pub middleware: Vec<String>,
    pub dependencies: Vec<String>,
    pub summary: Option<String>,
    pub tags: Vec<String>,
    pub response_model: Option<String>,
    pub body_schema: Option<String>,
    pub mcp_tool_name: Option<String>,
    pub mcp_input_schema: Option<String>,
    pub params: Vec<EndpointParam>,
}

impl ExtractedEndpoint {
    pub fn new(
        http_method: impl Into<String>,
        path: impl Into<String>,
        file_path: impl Into<String>,
        start_line: u32,
        end_line: u32,
        framework: Framework,
    ) -> Self {
        let path = path.into();
        let params = parse_path_params(&path)
            .into_iter()
            .map(EndpointParam::path)
            .collect();
        Self {
            http_method: http_method.into().to_uppercase(),
            path,
            file_path: file_path.into(),
            start_line,
            end_line,
            framework,
            handler_name: None,
            handler_type: HandlerType::Inline,
            middleware: Vec::new(),
            dependencies: Vec::new(),
            summary: None,
            tags: Vec::new(),
            response_model: None,
            body_schema: None,
            mcp_tool_name: None,
            mcp_input_schema: None,
            params,
        }
    }

    /// MCP tools normalise onto the endpoint shape with a pseudo-path.
    pub fn mcp_tool(
        tool_name: impl Into<String>,
        file_path: impl Into<String>,
        start_line: u32,
        end_line: u32,
    ) -> Self {
        let tool_name = tool_name.into();
        let mut endpoint = Self::new(
            "ALL",
            format!("mcp://{}", tool_name),
            file_path,
            start_line,
            end_line,
            Framework::Mcp,
        );
        endpoint.mcp_tool_name = Some(tool_name);
        endpoint
    }

    pub fn with_handler(mut self, name: impl Into<String>, handler_type: HandlerType) -> Self {
        self.handler_name = Some(name.into());
        self.handler_type = handler_type;
        self
    }

    pub fn path_params(&self) -> Vec<&str> {
        self.params
            .iter()
            .filter(|p| p.location == ParamLocation::Path)
            .map(|p| p.name.as_str())
            .collect()
    }
}

/// An endpoint row as persisted in the structure index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Endpoint {
    pub id: i64,
    pub commit_id: i64,
    pub http_method: String,
    pub path: String,
    pub file_path: String,
    pub start_line: u32,
    pub end_line: u32,
    pub framework: Framework,
    pub handler_name: Option<String>,
    pub handler_symbol_id: Option<i64>,
    pub handler_type: HandlerType,
    pub middleware: Vec<String>,
    pub dependencies: Vec<String>,
    pub summary: Option<String>,
    pub tags: Vec<String>,
    pub response_model: Option<String>,
    pub body_schema: Option<String>,
    pub mcp_tool_name: Option<String>,
    pub mcp_input_schema: Option<String>,
    pub params: Vec<EndpointParam>,
}

/// Parse path parameters from both `:name` and `{name}` conventions.
pub fn parse_path_params(path: &str) -> Vec<String> {
    let mut params = Vec::new();
    for segment in path.split('/') {
        if let Some(name) = segment.strip_prefix(':') {
            let name: String = name
                .chars()
                .take_while(|c| c.is_alphanumeric() || *c == '_')
                .collect();
            if !name.is_empty() {
                params.push(name);
            }
        } else if segment.starts_with('{') && segment.contains('}') {
            let inner = &segment[1..segment.find('}').unwrap_or(segment.len() - 1)];
            let name = inner.split(':').next().unwrap_or(inner).trim();
            if !name.is_empty() {
                params.push(name.to_string());
            }
        }
    }
    params
}

/// Wildcard matcher for endpoint path filters and file exclude patterns.
/// `*` matches any run of characters, including none.
pub fn wildcard_match(pattern: &str, candidate: &str) -> bool {
    fn inner(pattern: &[u8], candidate: &[u8]) -> bool {
        match (pattern.first(), candidate.first()) {
            (None, None) => true,
            (Some(b'*'), _) => {
                inner(&pattern[1..], candidate)
                    || (!candidate.is_empty() && inner(pattern, &candidate[1..]))
            }
            (Some(p), Some(c)) if p == c => inner(&pattern[1..], &candidate[1..]),
            _ => false,
        }
    }
    inner(pattern.as_bytes(), candidate.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_path_params_colon_style() {
        assert_eq!(parse_path_params("/users/:id/posts/:postId"), vec!["id", "postId"]);
    }

    #[test]
    fn test_parse_path_params_brace_style() {
        assert_eq!(parse_path_params("/items/{item_id}"), vec!["item_id"]);
        assert_eq!(parse_path_params("/f/{name:path}"), vec!["name"]);
    }

    #[test]
    fn test_parse_path_params_none() {
        assert!(parse_path_params("/healthz").is_empty());
    }

    #[test]
    fn test_endpoint_normalisation() {
        let endpoint = ExtractedEndpoint::new(
            "get",
            "/users/:id",
            "src/app.js",
            10,
            12,
            Framework::Express,
        )
        .with_handler("getUser", HandlerType::Reference);
        assert_eq!(endpoint.http_method, "GET");
        assert_eq!(endpoint.path_params(), vec!["id"]);
        assert_eq!(endpoint.handler_name.as_deref(), Some("getUser"));
    }

    #[test]
    fn test_mcp_tool_pseudo_path() {
        let endpoint = ExtractedEndpoint::mcp_tool("list_files", "server.ts", 3, 9);
        assert_eq!(endpoint.http_method, "ALL");
        assert_eq!(endpoint.path, "mcp://list_files");
        assert_eq!(endpoint.mcp_tool_name.as_deref(), Some("list_files"));
        assert_eq!(endpoint.framework, Framework::Mcp);
    }

    #[test]
    fn test_wildcard_match() {
        assert!(wildcard_match("/users/*", "/users/:id"));
        assert!(wildcard_match("*", "/anything"));
        assert!(wildcard_match("/a/*/c", "/a/b/c"));
        assert!(!wildcard_match("/users/*", "/accounts/1"));
        assert!(wildcard_match("*.test.js", "api.test.js"));
    }
}
