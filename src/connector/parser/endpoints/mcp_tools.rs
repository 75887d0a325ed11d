use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::{ExtractedEndpoint, Framework, Language};

use super::route_scan::{line_of_offset, statement_end_line};
use super::EndpointExtractor;

static TS_TOOL_CALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\.(?:tool|registerTool)\s*\(\s*['"`]([A-Za-z0-9_.-]+)['"`]"#).unwrap()
});

static PY_TOOL_DECORATOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)^\s*@(?:mcp\.)?tool\s*(?:\(\s*(?:name\s*=\s*)?['"]?([A-Za-z0-9_.-]*)['"]?)?"#)
        .unwrap()
});

static PY_FOLLOWING_DEF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*(?:async\s+)?def\s+([A-Za-z_][A-Za-z0-9_]*)").unwrap()
});

static MCP_IMPORTS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"^@modelcontextprotocol/").unwrap(),
        Regex::new(r"^mcp(\.|$)").unwrap(),
        Regex::new(r"^fastmcp$").unwrap(),
    ]
});
static MCP_FILES: Lazy<Vec<Regex>> = Lazy::new(Vec::new);
const LANGUAGES: &[Language] = &[
    Language::TypeScript,
    Language::JavaScript,
    Language::Python,
];

/// MCP tool declarations normalise onto the endpoint shape: pseudo-path
/// `mcp://<tool>` with HTTP method `ALL`.
pub struct McpToolExtractor;

impl McpToolExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl EndpointExtractor for McpToolExtractor {
    fn framework(&self) -> Framework {
        Framework::Mcp
    }

    fn import_patterns(&self) -> &[Regex] {
        &MCP_IMPORTS
    }

    fn file_patterns(&self) -> &[Regex] {
        &MCP_FILES
    }

    fn languages(&self) -> &[Language] {
        LANGUAGES
    }

    fn extract(&self, path: &str, content: &str) -> Vec<ExtractedEndpoint> {
        let mut endpoints = Vec::new();

        for captures in TS_TOOL_CALL.captures_iter(content) {
            let tool_name = captures[1].to_string();
            let offset = captures.get(0).unwrap().start();
            let start_line = line_of_offset(content, offset);
            let end_line = statement_end_line(content, offset, 100);
            endpoints.push(ExtractedEndpoint::mcp_tool(
                tool_name,
                path,
                start_line,
                end_line.max(start_line),
            ));
        }

        for captures in PY_TOOL_DECORATOR.captures_iter(content) {
            let explicit = captures.get(1).map(|m| m.as_str()).unwrap_or("");
            let offset = captures.get(0).unwrap().start();
            let start_line = line_of_offset(content, offset);
            let after = &content[captures.get(0).unwrap().end()..];
            let def_name = PY_FOLLOWING_DEF.captures(after).map(|c| c[1].to_string());
            let tool_name = if !explicit.is_empty() {
                explicit.to_string()
            } else {
                match def_name {
                    Some(name) => name,
                    None => continue,
                }
            };
            endpoints.push(ExtractedEndpoint::mcp_tool(
                tool_name, path, start_line, start_line,
            ));
        }

        endpoints
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ts_tool_registration() {
        let content = r#"
const server = new McpServer({ name: "files" });
server.tool("list_files", schema, async (args) => {
    return listFiles(args.path);
});
"#;
        let endpoints = McpToolExtractor::new().extract("server.ts", content);
        assert_eq!(endpoints.len(), 1);
        assert_eq!(endpoints[0].path, "mcp://list_files");
        assert_eq!(endpoints[0].http_method, "ALL");
        assert_eq!(endpoints[0].mcp_tool_name.as_deref(), Some("list_files"));
    }

    #[test]
    fn test_python_tool_decorator() {
        let content = r#"
@mcp.tool()
def search_notes(query: str) -> list:
    return store.search(query)
"#;
        let endpoints = McpToolExtractor::new().extract("tools.py", content);
        assert_eq!(endpoints.len(), 1);
        assert_eq!(endpoints[0].mcp_tool_name.as_deref(), Some("search_notes"));
    }
}
