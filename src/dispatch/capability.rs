//! Handler capabilities and typed parameter binding.
//!
//! A capability is a registered handler in one of exactly two shapes: a
//! bodyless handler, invoked as soon as the route matches, or a body-aware
//! handler, invoked once the request body has been fully assembled. Each
//! handler declares its own parameter type; binding happens against that
//! exact type, fixed at registration, so dispatch never downcasts.

use std::collections::HashMap;

use serde::Serialize;
use thiserror::Error;

use crate::dispatch::body::Flow;
use crate::dispatch::coordinator::ResponseWriter;
use crate::parser::{Headers, HttpRequest};
use crate::router::MatchedComponents;
use crate::server::HttpResponse;

/// A fault reported by a handler's serve operation. Converted to a 500
/// response at the dispatch boundary, never retried.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct HandlerError {
    message: String,
}

impl HandlerError {
    /// Create a handler fault with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(err.to_string())
    }
}

/// Parameter object for a bodyless handler.
///
/// Construction may fail (missing or invalid required field); a `None`
/// return becomes a 400 response and the handler is never invoked.
pub trait BodylessParams: Sized {
    fn from_parts(
        path_params: &HashMap<String, String>,
        query_params: &[(String, String)],
        headers: &Headers,
    ) -> Option<Self>;
}

/// Parameter object for a body-aware handler; also sees the assembled body.
pub trait BodyParams: Sized {
    fn from_parts(
        path_params: &HashMap<String, String>,
        query_params: &[(String, String)],
        headers: &Headers,
        body: &[u8],
    ) -> Option<Self>;
}

/// Per-request view handed to a handler alongside its bound parameters.
#[derive(Debug, Clone, Copy)]
pub struct RequestContext<'a> {
    components: &'a MatchedComponents,
}

impl<'a> RequestContext<'a> {
    pub(crate) fn new(components: &'a MatchedComponents) -> Self {
        Self { components }
    }

    /// The raw placeholder binding for `name`, if the template captured one.
    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.components.path_params.get(name).map(String::as_str)
    }

    /// All raw query values for `name`, in original order.
    pub fn query_values(&self, name: &str) -> Vec<&str> {
        self.components
            .query_params
            .iter()
            .filter(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// The full matched components.
    pub fn components(&self) -> &MatchedComponents {
        self.components
    }
}

/// A response body produced by a body-aware handler.
pub trait ResponseBody: Send {
    /// Serialize the body; `None` means the response is sent without one.
    fn to_bytes(&self) -> Option<Vec<u8>>;
}

impl ResponseBody for String {
    fn to_bytes(&self) -> Option<Vec<u8>> {
        Some(self.clone().into_bytes())
    }
}

impl ResponseBody for &'static str {
    fn to_bytes(&self) -> Option<Vec<u8>> {
        Some(self.as_bytes().to_vec())
    }
}

impl ResponseBody for Vec<u8> {
    fn to_bytes(&self) -> Option<Vec<u8>> {
        Some(self.clone())
    }
}

/// JSON response body backed by any serializable value.
pub struct Json<T>(pub T);

impl<T: Serialize + Send> ResponseBody for Json<T> {
    fn to_bytes(&self) -> Option<Vec<u8>> {
        serde_json::to_vec(&self.0).ok()
    }
}

/// A handler that never consumes a request body.
///
/// Invoked immediately after the route matches and its parameters bind; the
/// handler writes its response directly through the [`ResponseWriter`].
pub trait BodylessHandler: Send + Sync + 'static {
    type Params: BodylessParams;

    fn serve(
        &self,
        request: &HttpRequest,
        context: &RequestContext<'_>,
        params: Self::Params,
        response: &mut ResponseWriter<'_>,
    ) -> Result<(), HandlerError>;
}

/// A handler that consumes the request body.
///
/// Invoked exactly once, after the final body chunk has been observed; it
/// returns response metadata plus a body object which the dispatcher
/// serializes and writes.
pub trait BodyHandler: Send + Sync + 'static {
    type Params: BodyParams;

    /// Cooperative cancellation hook, consulted after each appended chunk.
    /// Return [`Flow::Stop`] to abandon the stream; the current chunk is
    /// still acknowledged first.
    fn poll_chunk(&self, _received: usize) -> Flow {
        Flow::Continue
    }

    fn serve(
        &self,
        request: &HttpRequest,
        context: &RequestContext<'_>,
        params: Self::Params,
    ) -> Result<(HttpResponse, Box<dyn ResponseBody>), HandlerError>;
}

/// Outcome of invoking an erased capability.
#[derive(Debug)]
pub(crate) enum DispatchError {
    /// Parameter construction failed; becomes a 400.
    Binding,
    /// The handler itself faulted; becomes a 500.
    Handler(HandlerError),
}

pub(crate) trait ErasedBodyless: Send + Sync {
    fn invoke(
        &self,
        request: &HttpRequest,
        components: &MatchedComponents,
        writer: &mut ResponseWriter<'_>,
    ) -> Result<(), DispatchError>;
}

impl<H: BodylessHandler> ErasedBodyless for H {
    fn invoke(
        &self,
        request: &HttpRequest,
        components: &MatchedComponents,
        writer: &mut ResponseWriter<'_>,
    ) -> Result<(), DispatchError> {
        let params = H::Params::from_parts(
            &components.path_params,
            &components.query_params,
            &request.headers,
        )
        .ok_or(DispatchError::Binding)?;
        let context = RequestContext::new(components);
        self.serve(request, &context, params, writer)
            .map_err(DispatchError::Handler)
    }
}

pub(crate) trait ErasedBody: Send + Sync {
    fn poll_chunk(&self, received: usize) -> Flow;

    fn invoke(
        &self,
        request: &HttpRequest,
        components: &MatchedComponents,
        body: &[u8],
    ) -> Result<(HttpResponse, Box<dyn ResponseBody>), DispatchError>;
}

impl<H: BodyHandler> ErasedBody for H {
    fn poll_chunk(&self, received: usize) -> Flow {
        BodyHandler::poll_chunk(self, received)
    }

    fn invoke(
        &self,
        request: &HttpRequest,
        components: &MatchedComponents,
        body: &[u8],
    ) -> Result<(HttpResponse, Box<dyn ResponseBody>), DispatchError> {
        let params = H::Params::from_parts(
            &components.path_params,
            &components.query_params,
            &request.headers,
            body,
        )
        .ok_or(DispatchError::Binding)?;
        let context = RequestContext::new(components);
        self.serve(request, &context, params)
            .map_err(DispatchError::Handler)
    }
}

pub(crate) enum CapabilityKind {
    Bodyless(Box<dyn ErasedBodyless>),
    BodyAware(Box<dyn ErasedBody>),
}

/// A registered handler, erased to one of the two dispatch shapes.
///
/// The shape decision is made once, at match time; bodyless capabilities are
/// served immediately while body-aware ones receive the assembled body.
pub struct Capability {
    pub(crate) kind: CapabilityKind,
}

impl Capability {
    pub(crate) fn bodyless<H: BodylessHandler>(handler: H) -> Self {
        Self {
            kind: CapabilityKind::Bodyless(Box::new(handler)),
        }
    }

    pub(crate) fn with_body<H: BodyHandler>(handler: H) -> Self {
        Self {
            kind: CapabilityKind::BodyAware(Box::new(handler)),
        }
    }

    /// true if this capability never consumes a request body.
    pub fn is_bodyless(&self) -> bool {
        matches!(self.kind, CapabilityKind::Bodyless(_))
    }
}
