//! Route lookup.
//!
//! # Responsibilities
//! - Compile route configs into matcher lists once
//! - Find the backend responsible for a request
//!
//! # Design Decisions
//! - Immutable after construction; rebuilt wholesale on config reload
//! - Routes are checked in priority order (higher first), first match wins
//! - Explicit no-match rather than a silent default backend

use axum::body::Body;
use axum::http::Request;

use crate::config::schema::RouteConfig;
use crate::routing::matcher::{HostMatcher, Matcher, PathPrefixMatcher};

/// A route compiled from configuration.
#[derive(Debug)]
pub struct CompiledRoute {
    /// Route name, for logging.
    pub name: String,
    /// Backend id requests matching this route dispatch to.
    pub backend: String,
    matchers: Vec<Box<dyn Matcher>>,
}

impl CompiledRoute {
    fn matches(&self, req: &Request<Body>) -> bool {
        self.matchers.iter().all(|m| m.matches(req))
    }
}

/// Immutable routing table.
#[derive(Debug, Default)]
pub struct Router {
    routes: Vec<CompiledRoute>,
}

impl Router {
    /// Compile routes, ordered by descending priority.
    pub fn from_config(mut configs: Vec<RouteConfig>) -> Self {
        configs.sort_by(|a, b| b.priority.cmp(&a.priority));

        let routes = configs
            .into_iter()
            .map(|config| {
                let mut matchers: Vec<Box<dyn Matcher>> = Vec::new();
                if let Some(host) = config.host {
                    matchers.push(Box::new(HostMatcher::new(host)));
                }
                if let Some(prefix) = config.path_prefix {
                    matchers.push(Box::new(PathPrefixMatcher::new(prefix)));
                }
                CompiledRoute {
                    name: config.name,
                    backend: config.backend,
                    matchers,
                }
            })
            .collect();

        Self { routes }
    }

    /// Find the first route matching the request.
    pub fn match_request(&self, req: &Request<Body>) -> Option<&CompiledRoute> {
        self.routes.iter().find(|route| route.matches(req))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(name: &str, prefix: &str, backend: &str, priority: u32) -> RouteConfig {
        RouteConfig {
            name: name.to_string(),
            host: None,
            path_prefix: Some(prefix.to_string()),
            backend: backend.to_string(),
            priority,
        }
    }

    #[test]
    fn higher_priority_wins() {
        let router = Router::from_config(vec![
            route("catchall", "/", "web", 0),
            route("api", "/api", "api", 10),
        ]);

        let req = Request::builder()
            .uri("http://example.com/api/v1")
            .body(Body::default())
            .unwrap();
        assert_eq!(router.match_request(&req).unwrap().backend, "api");

        let req = Request::builder()
            .uri("http://example.com/index.html")
            .body(Body::default())
            .unwrap();
        assert_eq!(router.match_request(&req).unwrap().backend, "web");
    }

    #[test]
    fn no_match_is_explicit() {
        let router = Router::from_config(vec![route("api", "/api", "api", 0)]);
        let req = Request::builder()
            .uri("http://example.com/other")
            .body(Body::default())
            .unwrap();
        assert!(router.match_request(&req).is_none());
    }
}
