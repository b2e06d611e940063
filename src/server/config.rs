//! Server configuration.

use std::net::SocketAddr;

/// HTTP server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// The address to bind to.
    pub addr: SocketAddr,
    /// The maximum number of concurrent connections.
    pub max_connections: usize,
    /// The read buffer size.
    pub read_buffer_size: usize,
    /// The maximum accepted request body size, in bytes. Larger bodies are
    /// rejected with 413 and the stream is aborted.
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:8080".parse().expect("default addr is valid"),
            max_connections: 1024,
            read_buffer_size: 8192,
            max_body_size: 1024 * 1024,
        }
    }
}
