use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::{ExtractedEndpoint, Framework, HandlerType, Language};

use super::route_scan::line_of_offset;
use super::EndpointExtractor;

static VERB_ROUTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?m)^\s*(get|post|put|patch|delete|match)\s+['"]([^'"]+)['"](?:\s*,\s*to:\s*['"]([^'"]+)['"])?"#,
    )
    .unwrap()
});

static RESOURCES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*resources?\s+:([a-z_]+)").unwrap()
});

static RAILS_IMPORTS: Lazy<Vec<Regex>> = Lazy::new(|| vec![Regex::new(r"^rails$").unwrap()]);
static RAILS_FILES: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(^|/)config/routes\.rb$").unwrap(),
        Regex::new(r"(^|/)controllers/.*_controller\.rb$").unwrap(),
    ]
});
const LANGUAGES: &[Language] = &[Language::Ruby];

/// Rails `config/routes.rb`: explicit verb routes plus one-level `resources`
/// expansion into the conventional RESTful actions.
pub struct RailsExtractor;

impl RailsExtractor {
    pub fn new() -> Self {
        Self
    }

    fn restful_routes(resource: &str) -> Vec<(&'static str, String, String)> {
        vec![
            ("GET", format!("/{}", resource), format!("{}#index", resource)),
            ("GET", format!("/{}/:id", resource), format!("{}#show", resource)),
            ("POST", format!("/{}", resource), format!("{}#create", resource)),
            (
                "PATCH",
                format!("/{}/:id", resource),
                format!("{}#update", resource),
            ),
            (
                "DELETE",
                format!("/{}/:id", resource),
                format!("{}#destroy", resource),
            ),
        ]
    }
}

impl EndpointExtractor for RailsExtractor {
    fn framework(&self) -> Framework {
        Framework::Rails
    }

    fn import_patterns(&self) -> &[Regex] {
        &RAILS_IMPORTS
    }

    fn file_patterns(&self) -> &[Regex] {
        &RAILS_FILES
    }

    fn languages(&self) -> &[Language] {
        LANGUAGES
    }

    fn extract(&self, path: &str, content: &str) -> Vec<ExtractedEndpoint> {
        let mut endpoints = Vec::new();

        for captures in VERB_ROUTE.captures_iter(content) {
            let verb = match &captures[1] {
                "match" => "ALL",
                other => other,
            };
            let route = if captures[2].starts_with('/') {
                captures[2].to_string()
            } else {
                format!("/{}", &captures[2])
            };
            let start_line = line_of_offset(content, captures.get(0).unwrap().start());
            let mut endpoint = ExtractedEndpoint::new(
                verb,
                route,
                path,
                start_line,
                start_line,
                Framework::Rails,
            );
            if let Some(target) = captures.get(3) {
                endpoint =
                    endpoint.with_handler(target.as_str(), HandlerType::ControllerAction);
            }
            endpoints.push(endpoint);
        }

        for captures in RESOURCES.captures_iter(content) {
            let resource = &captures[1];
            let start_line = line_of_offset(content, captures.get(0).unwrap().start());
            for (verb, route, action) in Self::restful_routes(resource) {
                endpoints.push(
                    ExtractedEndpoint::new(
                        verb,
                        route,
                        path,
                        start_line,
                        start_line,
                        Framework::Rails,
                    )
                    .with_handler(action, HandlerType::ControllerAction),
                );
            }
        }

        endpoints
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rails_verb_routes() {
        let content = r#"
Rails.application.routes.draw do
  get 'login', to: 'sessions#new'
  post '/logout', to: 'sessions#destroy'
end
"#;
        let endpoints = RailsExtractor::new().extract("config/routes.rb", content);
        assert_eq!(endpoints.len(), 2);
        assert_eq!(endpoints[0].http_method, "GET");
        assert_eq!(endpoints[0].path, "/login");
        assert_eq!(endpoints[0].handler_name.as_deref(), Some("sessions#new"));
        assert_eq!(endpoints[0].handler_type, HandlerType::ControllerAction);
    }

    #[test]
    fn test_rails_resources_expansion() {
        let content = "Rails.application.routes.draw do\n  resources :users\nend\n";
        let endpoints = RailsExtractor::new().extract("config/routes.rb", content);
        assert_eq!(endpoints.len(), 5);
        assert!(endpoints
            .iter()
            .any(|e| e.http_method == "GET" && e.path == "/users/:id"));
        assert!(endpoints
            .iter()
            .any(|e| e.handler_name.as_deref() == Some("users#destroy")));
    }
}
