//! Request handling coordination.
//!
//! The [`Coordinator`] ties the pieces together for one request: route
//! lookup, the bodyless/body-aware shape decision, parameter binding,
//! handler invocation, and response synthesis for every failure. Routing and
//! binding failures become 404/400 responses; handler faults become 500s;
//! nothing is retried.

use log::{debug, error};

use crate::dispatch::body::{BodyAssembly, BodyEvent, Flow, StreamError};
use crate::dispatch::capability::{CapabilityKind, DispatchError, ErasedBody};
use crate::parser::HttpRequest;
use crate::router::{MatchedComponents, Router};
use crate::server::{HttpResponse, StatusCode};

/// Destination for completed responses.
///
/// Every response the coordinator produces flows through the sink; the
/// transport decides what a "send" means (serialize to a socket buffer,
/// record for a test, ...).
pub trait ResponseSink: Send {
    fn send(&mut self, response: HttpResponse);
}

/// Writer handed to bodyless handlers; forwards to the sink and remembers
/// what was written so the dispatch outcome can carry it.
pub struct ResponseWriter<'a> {
    sink: &'a mut dyn ResponseSink,
    sent: Option<HttpResponse>,
}

impl<'a> ResponseWriter<'a> {
    pub(crate) fn new(sink: &'a mut dyn ResponseSink) -> Self {
        Self { sink, sent: None }
    }

    /// Write a response. If called more than once every response reaches the
    /// sink; the last one is reported as the dispatch outcome.
    pub fn send(&mut self, response: HttpResponse) {
        self.sink.send(response.clone());
        self.sent = Some(response);
    }

    pub(crate) fn into_sent(self) -> Option<HttpResponse> {
        self.sent
    }
}

/// Outcome of [`Coordinator::handle`].
pub enum Dispatch<'a> {
    /// The response was produced (and written to the sink) synchronously.
    Immediate(HttpResponse),
    /// The matched handler consumes a body; the transport must drive the
    /// stream with chunk/end events.
    StreamBody(BodyStream<'a>),
}

/// Orchestrates routing, binding, body assembly, and handler invocation.
///
/// Owns the route registry, which is read-only from here on; a coordinator
/// can therefore serve any number of concurrent requests, each with its own
/// per-request state.
pub struct Coordinator {
    router: Router,
}

impl Coordinator {
    /// Create a coordinator over a fully registered router.
    pub fn new(router: Router) -> Self {
        Self { router }
    }

    /// The underlying route registry.
    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Handle one request.
    ///
    /// Bodyless dispatch completes synchronously and returns
    /// [`Dispatch::Immediate`]. Body-aware dispatch returns
    /// [`Dispatch::StreamBody`]; the transport then feeds body events and
    /// the response is written once `End` is observed.
    pub fn handle<'a>(
        &'a self,
        request: HttpRequest,
        sink: &'a mut dyn ResponseSink,
    ) -> Dispatch<'a> {
        let Some((components, capability)) = self.router.route(&request) else {
            debug!(
                "No route for {method} {path}",
                method = request.method,
                path = request.path
            );
            let response = not_found(&request.path);
            sink.send(response.clone());
            return Dispatch::Immediate(response);
        };

        match &capability.kind {
            CapabilityKind::Bodyless(handler) => {
                let mut writer = ResponseWriter::new(&mut *sink);
                let outcome = handler.invoke(&request, &components, &mut writer);
                let sent = writer.into_sent();

                let response = match outcome {
                    Ok(()) => match sent {
                        Some(response) => return Dispatch::Immediate(response),
                        None => {
                            error!(
                                "Handler for {path} completed without writing a response",
                                path = request.path
                            );
                            internal_error()
                        }
                    },
                    Err(DispatchError::Binding) => bad_request(),
                    Err(DispatchError::Handler(fault)) => {
                        error!("Handler fault for {path}: {fault}", path = request.path);
                        internal_error()
                    }
                };
                sink.send(response.clone());
                Dispatch::Immediate(response)
            }
            CapabilityKind::BodyAware(handler) => Dispatch::StreamBody(BodyStream {
                request,
                components,
                handler: handler.as_ref(),
                sink,
                assembly: BodyAssembly::new(),
            }),
        }
    }
}

/// Continuation for a body-aware request.
///
/// Closed over the matched route, the capability, the request, and the
/// response sink; holds no other resources between events. The transport
/// drives it with [`BodyEvent`]s and must stop after the first
/// [`Flow::Stop`].
pub struct BodyStream<'a> {
    request: HttpRequest,
    components: MatchedComponents,
    handler: &'a dyn ErasedBody,
    sink: &'a mut dyn ResponseSink,
    assembly: BodyAssembly,
}

impl BodyStream<'_> {
    /// Feed one body event.
    ///
    /// Chunks are appended and acknowledged; `End` finalizes the buffer,
    /// binds parameters, invokes the handler exactly once, and writes the
    /// response via the sink. Events after a terminal state are protocol
    /// violations.
    pub fn on_event(&mut self, event: BodyEvent<'_>) -> Result<Flow, StreamError> {
        match event {
            BodyEvent::Chunk { data, ack } => {
                self.assembly.push_chunk(data)?;
                // Acknowledge before consulting the stop hook
                ack();
                if self.handler.poll_chunk(self.assembly.len()) == Flow::Stop {
                    debug!(
                        "Body stream for {path} stopped by handler after {received} bytes",
                        path = self.request.path,
                        received = self.assembly.len()
                    );
                    self.assembly.abort();
                    return Ok(Flow::Stop);
                }
                Ok(Flow::Continue)
            }
            BodyEvent::End => {
                let body = self.assembly.finish()?;
                let response = match self.handler.invoke(&self.request, &self.components, &body) {
                    Ok((head, body_object)) => match body_object.to_bytes() {
                        Some(bytes) => head.with_body_bytes(bytes),
                        None => head,
                    },
                    Err(DispatchError::Binding) => bad_request(),
                    Err(DispatchError::Handler(fault)) => {
                        error!(
                            "Handler fault for {path}: {fault}",
                            path = self.request.path
                        );
                        internal_error()
                    }
                };
                self.sink.send(response);
                Ok(Flow::Stop)
            }
        }
    }

    /// Transport-initiated abort (peer gone, body over limit, ...). The
    /// buffer is discarded; further events are protocol violations.
    pub fn abort(&mut self) {
        self.assembly.abort();
    }

    /// Body bytes accumulated so far.
    pub fn received(&self) -> usize {
        self.assembly.len()
    }
}

fn not_found(path: &str) -> HttpResponse {
    HttpResponse::new(StatusCode::NotFound)
        .with_content_type("text/plain")
        .with_body_string(format!("Not found: {path}"))
}

fn bad_request() -> HttpResponse {
    HttpResponse::new(StatusCode::BadRequest)
        .with_content_type("text/plain")
        .with_body_string("Failed to bind request parameters")
}

fn internal_error() -> HttpResponse {
    HttpResponse::new(StatusCode::InternalServerError)
        .with_content_type("text/plain")
        .with_body_string("Internal server error")
}
