//! Page match predicates.
//!
//! # Responsibilities
//! - Match method, exact path, path prefix and host
//! - Combine conditions with AND / OR semantics
//!
//! # Design Decisions
//! - Host matching is case-insensitive (RFC 9110 section 4.2.3)
//! - Path matching is case-sensitive and uses the logical (mount-stripped) path
//! - An empty `AndMatcher` always matches (wildcard)
//! - No regex, to keep matching linear

use std::fmt;

use axum::http::Method;

use crate::http::Event;

/// Trait for matching requests against conditions.
pub trait Matcher: Send + Sync + fmt::Debug {
    /// Returns true if the request matches this condition.
    fn matches(&self, event: &Event) -> bool;
}

/// Matches one of a set of methods.
#[derive(Debug, Clone)]
pub struct MethodMatcher {
    methods: Vec<Method>,
}

impl MethodMatcher {
    pub fn new(methods: impl IntoIterator<Item = Method>) -> Self {
        Self {
            methods: methods.into_iter().collect(),
        }
    }
}

impl Matcher for MethodMatcher {
    fn matches(&self, event: &Event) -> bool {
        self.methods.contains(event.method())
    }
}

/// Matches the Host header.
#[derive(Debug, Clone)]
pub struct HostMatcher {
    expected_host: String,
}

impl HostMatcher {
    /// The host is normalized to lowercase for case-insensitive matching.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            expected_host: host.into().to_lowercase(),
        }
    }
}

impl Matcher for HostMatcher {
    fn matches(&self, event: &Event) -> bool {
        event
            .host()
            .map(|h| h == self.expected_host)
            .unwrap_or(false)
    }
}

/// Matches the request path prefix on segment boundaries: `/api` matches
/// `/api` and `/api/v1` but not `/apix`.
#[derive(Debug, Clone)]
pub struct PathPrefixMatcher {
    prefix: String,
}

impl PathPrefixMatcher {
    pub fn new(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        Self {
            prefix: prefix.trim_end_matches('/').to_string(),
        }
    }
}

impl Matcher for PathPrefixMatcher {
    fn matches(&self, event: &Event) -> bool {
        match event.path().strip_prefix(&self.prefix) {
            Some(rest) => rest.is_empty() || rest.starts_with('/') || self.prefix.is_empty(),
            None => false,
        }
    }
}

/// Matches one exact path.
#[derive(Debug, Clone)]
pub struct ExactPathMatcher {
    path: String,
}

impl ExactPathMatcher {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

impl Matcher for ExactPathMatcher {
    fn matches(&self, event: &Event) -> bool {
        event.path() == self.path
    }
}

/// Combines multiple matchers with AND semantics.
#[derive(Debug, Default)]
pub struct AndMatcher {
    matchers: Vec<Box<dyn Matcher>>,
}

impl AndMatcher {
    pub fn new(matchers: Vec<Box<dyn Matcher>>) -> Self {
        Self { matchers }
    }

    pub fn and(mut self, matcher: impl Matcher + 'static) -> Self {
        self.matchers.push(Box::new(matcher));
        self
    }
}

impl Matcher for AndMatcher {
    fn matches(&self, event: &Event) -> bool {
        self.matchers.iter().all(|m| m.matches(event))
    }
}

/// Combines multiple matchers with OR semantics. Empty never matches.
#[derive(Debug, Default)]
pub struct AnyMatcher {
    matchers: Vec<Box<dyn Matcher>>,
}

impl AnyMatcher {
    pub fn new(matchers: Vec<Box<dyn Matcher>>) -> Self {
        Self { matchers }
    }
}

impl Matcher for AnyMatcher {
    fn matches(&self, event: &Event) -> bool {
        self.matchers.iter().any(|m| m.matches(event))
    }
}

/// Shorthand for a method + exact path predicate.
pub fn route(method: Method, path: impl Into<String>) -> AndMatcher {
    AndMatcher::default()
        .and(MethodMatcher::new([method]))
        .and(ExactPathMatcher::new(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::EventOptions;
    use axum::body::Body;
    use axum::http::Request;

    fn event(method: Method, uri: &str, host: &str) -> Event {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("Host", host)
            .body(Body::empty())
            .unwrap();
        Event::from_request(request, None, &EventOptions::default())
    }

    #[test]
    fn test_host_matcher() {
        let matcher = HostMatcher::new("example.com");
        assert!(matcher.matches(&event(Method::GET, "/", "example.com")));
        assert!(matcher.matches(&event(Method::GET, "/", "EXAMPLE.COM:8080")));
        assert!(!matcher.matches(&event(Method::GET, "/", "other.com")));
    }

    #[test]
    fn test_path_prefix_matcher() {
        let matcher = PathPrefixMatcher::new("/api");
        assert!(matcher.matches(&event(Method::GET, "/api/v1", "h")));
        assert!(matcher.matches(&event(Method::GET, "/api", "h")));
        assert!(!matcher.matches(&event(Method::GET, "/apix", "h")));
        assert!(!matcher.matches(&event(Method::GET, "/images", "h")));
        assert!(PathPrefixMatcher::new("/").matches(&event(Method::GET, "/anything", "h")));
    }

    #[test]
    fn get_only_route_does_not_match_post() {
        let matcher = route(Method::GET, "/shared");
        assert!(matcher.matches(&event(Method::GET, "/shared", "h")));
        assert!(!matcher.matches(&event(Method::POST, "/shared", "h")));
        assert!(!matcher.matches(&event(Method::GET, "/other", "h")));
    }

    #[test]
    fn any_matcher_is_or() {
        let matcher = AnyMatcher::new(vec![
            Box::new(ExactPathMatcher::new("/a")),
            Box::new(ExactPathMatcher::new("/b")),
        ]);
        assert!(matcher.matches(&event(Method::GET, "/b", "h")));
        assert!(!matcher.matches(&event(Method::GET, "/c", "h")));
        assert!(!AnyMatcher::default().matches(&event(Method::GET, "/a", "h")));
        assert!(AndMatcher::default().matches(&event(Method::GET, "/a", "h")));
    }
}
