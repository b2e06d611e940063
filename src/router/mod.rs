//! Request routing module.
//!
//! This module provides path templates with named placeholders
//! (`/users/{id}`) and a registry that maps `(verb, template)` pairs to
//! handler capabilities. Lookup returns the first structural match in
//! registration order together with the extracted path and query parameters.

mod router;
mod template;

// Re-export public items
pub use router::{MatchedComponents, Router, RouterError};
pub use template::{PathTemplate, Segment, TemplateError};
