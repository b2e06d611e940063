//! A minimal HTTP routing and typed-dispatch library.
//!
//! This library matches incoming requests against registered path templates,
//! extracts path, query, and header parameters, and dispatches to typed
//! handlers. Handlers come in exactly two shapes: bodyless handlers served
//! as soon as their route matches, and body-aware handlers served once the
//! request body has been assembled incrementally from transport chunks.
//!
//! # Features
//!
//! - Path templates with named placeholders (`/users/{id}`), matched in
//!   registration order
//! - Ordered, duplicate-preserving query parameters and multi-value,
//!   case-insensitive headers
//! - Per-route parameter types bound at registration time; binding failures
//!   become 400 responses without invoking the handler
//! - Incremental body assembly with per-chunk acknowledgement, cooperative
//!   cancellation, and exactly-once handler invocation
//! - A tokio-based server transport with connection limiting and graceful
//!   shutdown
//!
//! # Examples
//!
//! ## Routing and bodyless dispatch
//!
//! ```
//! use std::collections::HashMap;
//! use microroute_rs::{
//!     BodylessHandler, BodylessParams, Coordinator, Dispatch, HandlerError, Headers,
//!     HttpRequest, HttpResponse, HttpVersion, Method, RequestContext, ResponseSink,
//!     ResponseWriter, Router, StatusCode,
//! };
//!
//! struct GreetParams {
//!     name: String,
//! }
//!
//! impl BodylessParams for GreetParams {
//!     fn from_parts(
//!         path_params: &HashMap<String, String>,
//!         _query_params: &[(String, String)],
//!         _headers: &Headers,
//!     ) -> Option<Self> {
//!         Some(Self {
//!             name: path_params.get("name")?.clone(),
//!         })
//!     }
//! }
//!
//! struct Greet;
//!
//! impl BodylessHandler for Greet {
//!     type Params = GreetParams;
//!
//!     fn serve(
//!         &self,
//!         _request: &HttpRequest,
//!         _context: &RequestContext<'_>,
//!         params: GreetParams,
//!         response: &mut ResponseWriter<'_>,
//!     ) -> Result<(), HandlerError> {
//!         response.send(
//!             HttpResponse::new(StatusCode::Ok)
//!                 .with_content_type("text/plain")
//!                 .with_body_string(format!("Hello, {}!", params.name)),
//!         );
//!         Ok(())
//!     }
//! }
//!
//! struct Recorder(Vec<HttpResponse>);
//!
//! impl ResponseSink for Recorder {
//!     fn send(&mut self, response: HttpResponse) {
//!         self.0.push(response);
//!     }
//! }
//!
//! let mut router = Router::new();
//! router.add_bodyless(Method::GET, "/greet/{name}", Greet).unwrap();
//! let coordinator = Coordinator::new(router);
//!
//! let request = HttpRequest::new(Method::GET, "/greet/world", HttpVersion::Http11, Headers::new());
//! let mut sink = Recorder(Vec::new());
//! match coordinator.handle(request, &mut sink) {
//!     Dispatch::Immediate(response) => assert_eq!(response.status, StatusCode::Ok),
//!     Dispatch::StreamBody(_) => unreachable!("bodyless route"),
//! }
//! assert_eq!(sink.0.len(), 1);
//! ```
//!
//! Body-aware handlers implement [`BodyHandler`] instead and are registered
//! with [`Router::add_with_body`]; see the `demos` directory for a complete
//! server, including body streaming.

// Export the parser module
pub mod parser;

// Export the router module
pub mod router;

// Export the dispatch module
pub mod dispatch;

// Export the server module
pub mod server;

// Re-export commonly used items for convenience
pub use dispatch::{
    BodyAssembly, BodyEvent, BodyHandler, BodyParams, BodyStream, BodylessHandler,
    BodylessParams, Capability, Coordinator, Dispatch, Flow, HandlerError, Json, RequestContext,
    ResponseBody, ResponseSink, ResponseWriter, StreamError,
};
pub use parser::{
    parse_query, parse_request, Error as ParserError, Headers, HttpRequest, HttpVersion, Method,
};
pub use router::{
    MatchedComponents, PathTemplate, Router, RouterError, Segment, TemplateError,
};
pub use server::{
    BufferedSink, Error as ServerError, HttpResponse, HttpServer, ServerConfig, StatusCode,
};
