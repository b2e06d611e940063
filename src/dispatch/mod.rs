//! Typed request dispatch.
//!
//! Handlers come in exactly two shapes: bodyless handlers, served as soon as
//! their route matches, and body-aware handlers, served once the request
//! body has been assembled from the transport's chunk stream. Each handler
//! declares its own parameter type, bound at registration time; the
//! [`Coordinator`] orchestrates routing, binding, body assembly, and
//! invocation for one request at a time.

mod body;
mod capability;
mod coordinator;
mod tests;

// Re-export public items
pub use body::{BodyAssembly, BodyEvent, Flow, StreamError};
pub use capability::{
    BodyHandler, BodyParams, BodylessHandler, BodylessParams, Capability, HandlerError, Json,
    RequestContext, ResponseBody,
};
pub use coordinator::{BodyStream, Coordinator, Dispatch, ResponseSink, ResponseWriter};
