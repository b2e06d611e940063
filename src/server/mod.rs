//! HTTP server module.
//!
//! This module provides the response model, server configuration, and a
//! tokio-based transport that drives the routing/dispatch core.

mod config;
mod error;
mod http_server;
mod response;

// Re-export public items
pub use config::ServerConfig;
pub use error::Error;
pub use http_server::{BufferedSink, HttpServer};
pub use response::{HttpResponse, StatusCode};
