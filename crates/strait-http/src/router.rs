//! Route registration and URI matching.
//!
//! Patterns are literal paths with optional `:name` segments; each segment
//! compiles to a `([^/]+)` capture in an anchored regex. Literal
//! punctuation is escaped, so `.` in a pattern matches only `.`.

use std::collections::HashMap;
use std::sync::Arc;

use regex::Regex;

use crate::types::{Request, Response};

/// Named path parameters captured from the URI.
pub type RouteParams = HashMap<String, String>;

/// A route handler. Receives the parsed request and the captured params.
pub type Handler = Arc<dyn Fn(&Request, &RouteParams) -> Response + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("invalid route pattern {pattern}: {source}")]
    BadPattern {
        pattern: String,
        source: regex::Error,
    },
}

pub(crate) struct Route {
    pub pattern: String,
    regex: Regex,
    params: Vec<String>,
    pub handler: Handler,
}

/// Matches URIs against registered routes, first registration wins.
#[derive(Default)]
pub struct Router {
    routes: Vec<Route>,
}

fn compile_pattern(pattern: &str) -> (String, Vec<String>) {
    let mut regex = String::from("^");
    let mut params = Vec::new();
    let mut pos = 0;
    while pos < pattern.len() {
        if pattern[pos..].starts_with(':') {
            let end = pattern[pos..]
                .find('/')
                .map(|i| pos + i)
                .unwrap_or(pattern.len());
            params.push(pattern[pos + 1..end].to_string());
            regex.push_str("([^/]+)");
            pos = end;
        } else {
            let c = pattern[pos..].chars().next().unwrap_or('/');
            if c.is_ascii_punctuation() {
                regex.push('\\');
            }
            regex.push(c);
            pos += c.len_utf8();
        }
    }
    regex.push('$');
    (regex, params)
}

impl Router {
    pub fn new() -> Router {
        Router { routes: Vec::new() }
    }

    /// Register a route. `:name` segments become named params handed to the
    /// handler.
    pub fn register<H>(&mut self, pattern: &str, handler: H) -> Result<(), RouteError>
    where
        H: Fn(&Request, &RouteParams) -> Response + Send + Sync + 'static,
    {
        let (regex_text, params) = compile_pattern(pattern);
        let regex = Regex::new(&regex_text).map_err(|source| RouteError::BadPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        self.routes.push(Route {
            pattern: pattern.to_string(),
            regex,
            params,
            handler: Arc::new(handler),
        });
        Ok(())
    }

    /// Find the first route matching `uri`, with its captured params.
    pub(crate) fn match_route(&self, uri: &str) -> Option<(&Route, RouteParams)> {
        for route in &self.routes {
            if let Some(captures) = route.regex.captures(uri) {
                let params = route
                    .params
                    .iter()
                    .zip(captures.iter().skip(1))
                    .filter_map(|(name, capture)| {
                        capture.map(|c| (name.clone(), c.as_str().to_string()))
                    })
                    .collect();
                return Some((route, params));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StatusCode;

    fn ok_handler(_request: &Request, _params: &RouteParams) -> Response {
        Response::with_body(StatusCode::Ok, "ok")
    }

    #[test]
    fn literal_route_matches_exactly() {
        let mut router = Router::new();
        router.register("/hello", ok_handler).expect("register");

        assert!(router.match_route("/hello").is_some());
        assert!(router.match_route("/hello/there").is_none());
        assert!(router.match_route("/hell").is_none());
    }

    #[test]
    fn param_segments_are_captured() {
        let mut router = Router::new();
        router
            .register("/peers/:name", ok_handler)
            .expect("register");

        let (route, params) = router.match_route("/peers/alice").expect("match");
        assert_eq!(route.pattern, "/peers/:name");
        assert_eq!(params.get("name").map(String::as_str), Some("alice"));

        // A param never crosses a slash.
        assert!(router.match_route("/peers/alice/status").is_none());
    }

    #[test]
    fn multiple_params_capture_in_order() {
        let mut router = Router::new();
        router
            .register("/rooms/:room/users/:user", ok_handler)
            .expect("register");

        let (_, params) = router.match_route("/rooms/12/users/bob").expect("match");
        assert_eq!(params.get("room").map(String::as_str), Some("12"));
        assert_eq!(params.get("user").map(String::as_str), Some("bob"));
    }

    #[test]
    fn punctuation_in_patterns_is_literal() {
        let mut router = Router::new();
        router.register("/file.txt", ok_handler).expect("register");

        assert!(router.match_route("/file.txt").is_some());
        assert!(router.match_route("/fileXtxt").is_none());
    }

    #[test]
    fn first_registration_wins() {
        let mut router = Router::new();
        router.register("/a/:x", ok_handler).expect("register");
        router.register("/a/b", ok_handler).expect("register");

        let (route, _) = router.match_route("/a/b").expect("match");
        assert_eq!(route.pattern, "/a/:x");
    }

    #[test]
    fn trailing_param_extends_to_end() {
        let mut router = Router::new();
        router.register("/echo/:rest", ok_handler).expect("register");
        let (_, params) = router.match_route("/echo/abc-def_1").expect("match");
        assert_eq!(params.get("rest").map(String::as_str), Some("abc-def_1"));
    }
}
