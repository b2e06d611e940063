//! HTTP request parser module.
//!
//! This module provides the request head model (method, path, version,
//! headers, query parameters) and a parser that splits a raw buffer into a
//! request head and the offset where the body begins.

mod error;
mod headers;
mod method;
mod request;
mod version;

// Re-export public items
pub use error::Error;
pub use headers::Headers;
pub use method::Method;
pub use request::HttpRequest;
pub use version::HttpVersion;

// Re-export the parsing functions
pub use request::{parse_query, parse_request};
