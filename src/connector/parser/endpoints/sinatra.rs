use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::{ExtractedEndpoint, Framework, Language};

use super::route_scan::{block_end_line, line_of_offset};
use super::EndpointExtractor;

static ROUTE_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)^\s*(get|post|put|patch|delete|options|head)\s+['"]([^'"]+)['"]\s+do\b"#)
        .unwrap()
});

static SINATRA_IMPORTS: Lazy<Vec<Regex>> =
    Lazy::new(|| vec![Regex::new(r"^sinatra").unwrap()]);
static SINATRA_FILES: Lazy<Vec<Regex>> = Lazy::new(Vec::new);
const LANGUAGES: &[Language] = &[Language::Ruby];

/// Sinatra's `get '/path' do ... end` route blocks. Handlers are always
/// inline blocks.
pub struct SinatraExtractor;

impl SinatraExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl EndpointExtractor for SinatraExtractor {
    fn framework(&self) -> Framework {
        Framework::Sinatra
    }

    fn import_patterns(&self) -> &[Regex] {
        &SINATRA_IMPORTS
    }

    fn file_patterns(&self) -> &[Regex] {
        &SINATRA_FILES
    }

    fn languages(&self) -> &[Language] {
        LANGUAGES
    }

    fn extract(&self, path: &str, content: &str) -> Vec<ExtractedEndpoint> {
        let mut endpoints = Vec::new();
        for captures in ROUTE_BLOCK.captures_iter(content) {
            let offset = captures.get(0).unwrap().start();
            let start_line = line_of_offset(content, offset);
            let end_line = block_end_line(content, offset, 200);
            endpoints.push(ExtractedEndpoint::new(
                &captures[1],
                &captures[2],
                path,
                start_line,
                end_line.max(start_line),
                Framework::Sinatra,
            ));
        }
        endpoints
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::HandlerType;

    #[test]
    fn test_sinatra_route_blocks() {
        let content = r#"
require 'sinatra'

get '/todos/:id' do
  json todos[params[:id]]
end

post '/todos' do
  todos << parse_body
end
"#;
        let endpoints = SinatraExtractor::new().extract("app.rb", content);
        assert_eq!(endpoints.len(), 2);
        let get = &endpoints[0];
        assert_eq!(get.http_method, "GET");
        assert_eq!(get.path, "/todos/:id");
        assert_eq!(get.path_params(), vec!["id"]);
        assert_eq!(get.handler_type, HandlerType::Inline);
        assert!(get.end_line > get.start_line);
    }
}
