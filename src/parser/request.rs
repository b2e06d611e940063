//! HTTP request parsing and representation.

use std::str::FromStr;

use crate::parser::error::Error;
use crate::parser::headers::Headers;
use crate::parser::method::Method;
use crate::parser::version::HttpVersion;

/// Represents a parsed HTTP request head.
///
/// The body is deliberately not part of this type: body bytes are delivered
/// to the dispatch layer as chunks by the transport, after the head has been
/// parsed.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// The HTTP method (GET, POST, etc.)
    pub method: Method,
    /// The request path, without the query string
    pub path: String,
    /// The HTTP version
    pub version: HttpVersion,
    /// The HTTP headers
    pub headers: Headers,
    /// Query parameters in original order; duplicate names are preserved
    pub query_params: Vec<(String, String)>,
}

impl HttpRequest {
    /// Create a new HTTP request from a request target.
    ///
    /// The target may carry a query string (`/users/123?foo=bar`); it is
    /// split off the path and parsed into ordered `(name, value)` pairs.
    pub fn new(method: Method, target: impl Into<String>, version: HttpVersion, headers: Headers) -> Self {
        let target = target.into();
        let (path, query_params) = match target.split_once('?') {
            Some((path, query)) => (path.to_string(), parse_query(query)),
            None => (target, Vec::new()),
        };

        Self {
            method,
            path,
            version,
            headers,
            query_params,
        }
    }

    /// All header values registered under `name` (case-insensitive).
    pub fn header_values(&self, name: &str) -> Vec<&str> {
        self.headers.get_all(name)
    }

    /// All query parameter values for `name`, in original order.
    pub fn query_values(&self, name: &str) -> Vec<&str> {
        self.query_params
            .iter()
            .filter(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// The declared body length, if a valid Content-Length header is present.
    pub fn content_length(&self) -> Option<usize> {
        self.headers
            .first("Content-Length")
            .and_then(|v| v.trim().parse().ok())
    }
}

/// Parse a raw query string into ordered `(name, value)` pairs.
///
/// Duplicate names are preserved in their original order, never deduplicated
/// or overwritten. Empty components between `&`s are skipped; a component
/// without `=` yields an empty value.
pub fn parse_query(raw: &str) -> Vec<(String, String)> {
    raw.split('&')
        .filter(|s| !s.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => (k.to_string(), v.to_string()),
            None => (pair.to_string(), String::new()),
        })
        .collect()
}

/// Parse an HTTP request head from a byte slice.
///
/// Parses the request line and headers up to the blank line separating the
/// head from the body, and returns the parsed request together with the byte
/// offset at which the body begins. Any bytes past that offset belong to the
/// body and are the transport's to deliver.
pub fn parse_request(input: &[u8]) -> Result<(HttpRequest, usize), Error> {
    // Locate the end of the head. Without a blank line the whole input is
    // treated as head (a request with no body).
    let body_offset = input
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .map(|pos| pos + 4)
        .unwrap_or(input.len());

    let head = match std::str::from_utf8(&input[..body_offset]) {
        Ok(s) => s,
        Err(_) => return Err(Error::MalformedRequestLine("Invalid UTF-8".to_string())),
    };

    let mut lines = head.lines();

    // Parse the request line
    let request_line = match lines.next() {
        Some(line) => line,
        None => return Err(Error::EmptyRequest),
    };

    let parts: Vec<&str> = request_line.split_whitespace().collect();
    if parts.len() != 3 {
        return Err(Error::MalformedRequestLine(request_line.to_string()));
    }

    let method = Method::from_str(parts[0])?;

    let target = parts[1];
    if target.is_empty() {
        return Err(Error::InvalidPath);
    }

    let version = HttpVersion::from_str(parts[2])?;

    // Parse the headers
    let mut headers = Headers::new();
    for line in lines {
        // Empty line indicates the end of headers
        if line.is_empty() {
            break;
        }

        let parts: Vec<&str> = line.splitn(2, ':').collect();
        if parts.len() != 2 {
            return Err(Error::InvalidHeaderFormat);
        }

        headers.append(parts[0].trim(), parts[1].trim());
    }

    // Check for required headers
    if version == HttpVersion::Http11 && !headers.contains("Host") {
        return Err(Error::MissingHeader("Host".to_string()));
    }

    Ok((HttpRequest::new(method, target, version, headers), body_offset))
}
