//! Route matching logic.
//!
//! # Responsibilities
//! - Match a request path against a compiled pattern
//! - Match the request method against an optional filter
//! - Rank patterns so resolution order is independent of declaration order
//!
//! # Design Decisions
//! - Three pattern classes, most specific first: exact literal paths,
//!   segment patterns with `{param}` placeholders, `/*` wildcard prefixes
//! - Path matching is case-sensitive
//! - No regex: matching is a prefix or segment-wise comparison

use std::cmp::Reverse;

use axum::http::Method;
use thiserror::Error;

/// Error type for route patterns.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    #[error("pattern '{0}' must start with '/'")]
    NotAbsolute(String),

    #[error("pattern '{0}': '*' is only allowed as the final segment")]
    MisplacedWildcard(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Param,
}

/// A compiled path pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathPattern {
    /// `/healthcheck`
    Exact(String),
    /// `/templates/{id}/preview`
    Segments(Vec<Segment>),
    /// `/auth/*`, stored as `/auth`
    Prefix(String),
}

impl PathPattern {
    pub fn parse(pattern: &str) -> Result<Self, PatternError> {
        if !pattern.starts_with('/') {
            return Err(PatternError::NotAbsolute(pattern.to_string()));
        }

        if let Some(prefix) = pattern.strip_suffix("/*") {
            if prefix.contains('*') {
                return Err(PatternError::MisplacedWildcard(pattern.to_string()));
            }
            return Ok(PathPattern::Prefix(prefix.to_string()));
        }
        if pattern.contains('*') {
            return Err(PatternError::MisplacedWildcard(pattern.to_string()));
        }

        let segments: Vec<Segment> = pattern
            .split('/')
            .skip(1)
            .map(|segment| {
                if segment.starts_with('{') && segment.ends_with('}') {
                    Segment::Param
                } else {
                    Segment::Literal(segment.to_string())
                }
            })
            .collect();

        if segments.iter().any(|s| *s == Segment::Param) {
            Ok(PathPattern::Segments(segments))
        } else {
            Ok(PathPattern::Exact(pattern.to_string()))
        }
    }

    /// Returns true if `path` matches this pattern.
    pub fn matches(&self, path: &str) -> bool {
        match self {
            PathPattern::Exact(expected) => path == expected,
            PathPattern::Prefix(prefix) => match path.strip_prefix(prefix.as_str()) {
                Some(rest) => rest.is_empty() || rest.starts_with('/'),
                None => false,
            },
            PathPattern::Segments(segments) => {
                let mut parts = path.split('/').skip(1);
                let all_match = segments.iter().all(|segment| match (segment, parts.next()) {
                    (Segment::Literal(expected), Some(actual)) => expected == actual,
                    (Segment::Param, Some(actual)) => !actual.is_empty(),
                    (_, None) => false,
                });
                all_match && parts.next().is_none()
            }
        }
    }

    /// Sort key: class first, then longer literal content first.
    pub(crate) fn rank(&self) -> (u8, Reverse<usize>) {
        match self {
            PathPattern::Exact(path) => (0, Reverse(path.len())),
            PathPattern::Segments(segments) => {
                let literal: usize = segments
                    .iter()
                    .map(|s| match s {
                        Segment::Literal(l) => l.len() + 1,
                        Segment::Param => 0,
                    })
                    .sum();
                (1, Reverse(literal))
            }
            PathPattern::Prefix(prefix) => (2, Reverse(prefix.len())),
        }
    }
}

/// Matches the request method. `GET` also admits `HEAD`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodFilter {
    Any,
    Only(Method),
}

impl MethodFilter {
    pub fn matches(&self, method: &Method) -> bool {
        match self {
            MethodFilter::Any => true,
            MethodFilter::Only(expected) => {
                expected == method || (*expected == Method::GET && *method == Method::HEAD)
            }
        }
    }
}
