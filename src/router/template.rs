//! Path templates with named placeholders.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// One segment of a path template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Matches a concrete path segment exactly (case-sensitive).
    Literal(String),
    /// Matches any single non-empty segment and binds it under the name.
    Placeholder(String),
}

/// Errors that can occur while parsing a path template.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    /// The template does not start with `/`.
    #[error("Template must start with '/': {0}")]
    MissingLeadingSlash(String),

    /// The template contains an empty segment (`//`).
    #[error("Template contains an empty segment: {0}")]
    EmptySegment(String),

    /// A placeholder has no name (`{}`).
    #[error("Placeholder has an empty name in template: {0}")]
    EmptyPlaceholder(String),

    /// The same placeholder name appears twice in one template.
    #[error("Duplicate placeholder name: {0}")]
    DuplicatePlaceholder(String),

    /// A segment mixes braces with other text or leaves a brace unclosed.
    #[error("Malformed template segment: {0}")]
    MalformedSegment(String),
}

/// A parsed path template such as `/users/{id}`.
///
/// A template has a fixed number of segments (no wildcards); each segment is
/// either a literal or a named placeholder, and placeholder names are unique
/// within one template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    segments: Vec<Segment>,
}

impl PathTemplate {
    /// The ordered segments of this template.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Match a concrete request path against this template.
    ///
    /// Returns the placeholder bindings on success, or `None` on the first
    /// segment mismatch; no partial bindings are ever observable.
    pub fn matches(&self, path: &str) -> Option<HashMap<String, String>> {
        let trimmed = path.strip_prefix('/').unwrap_or(path);
        let parts: Vec<&str> = if trimmed.is_empty() {
            Vec::new()
        } else {
            trimmed.split('/').collect()
        };

        if parts.len() != self.segments.len() {
            return None;
        }

        let mut params = HashMap::new();
        for (segment, part) in self.segments.iter().zip(&parts) {
            match segment {
                Segment::Literal(text) => {
                    if text.as_str() != *part {
                        return None;
                    }
                }
                Segment::Placeholder(name) => {
                    if part.is_empty() {
                        return None;
                    }
                    params.insert(name.clone(), (*part).to_string());
                }
            }
        }

        Some(params)
    }

    /// Structural equality: same arity, equal literals, placeholders at the
    /// same positions regardless of their names. Used to detect duplicate
    /// registrations.
    pub(crate) fn same_shape(&self, other: &Self) -> bool {
        self.segments.len() == other.segments.len()
            && self
                .segments
                .iter()
                .zip(&other.segments)
                .all(|(a, b)| match (a, b) {
                    (Segment::Literal(x), Segment::Literal(y)) => x == y,
                    (Segment::Placeholder(_), Segment::Placeholder(_)) => true,
                    _ => false,
                })
    }
}

impl FromStr for PathTemplate {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s
            .strip_prefix('/')
            .ok_or_else(|| TemplateError::MissingLeadingSlash(s.to_string()))?;

        let mut segments = Vec::new();
        if rest.is_empty() {
            // The root template `/` has zero segments.
            return Ok(Self { segments });
        }

        let mut seen = HashSet::new();
        for raw in rest.split('/') {
            if raw.is_empty() {
                return Err(TemplateError::EmptySegment(s.to_string()));
            }

            if let Some(inner) = raw.strip_prefix('{') {
                let name = inner
                    .strip_suffix('}')
                    .ok_or_else(|| TemplateError::MalformedSegment(raw.to_string()))?;
                if name.is_empty() {
                    return Err(TemplateError::EmptyPlaceholder(s.to_string()));
                }
                if name.contains(['{', '}']) {
                    return Err(TemplateError::MalformedSegment(raw.to_string()));
                }
                if !seen.insert(name.to_string()) {
                    return Err(TemplateError::DuplicatePlaceholder(name.to_string()));
                }
                segments.push(Segment::Placeholder(name.to_string()));
            } else if raw.contains(['{', '}']) {
                return Err(TemplateError::MalformedSegment(raw.to_string()));
            } else {
                segments.push(Segment::Literal(raw.to_string()));
            }
        }

        Ok(Self { segments })
    }
}

impl fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return f.write_str("/");
        }
        for segment in &self.segments {
            write!(f, "/{segment}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Literal(text) => f.write_str(text),
            Segment::Placeholder(name) => write!(f, "{{{name}}}"),
        }
    }
}
