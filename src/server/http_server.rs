//! HTTP server implementation.
//!
//! A tokio transport in front of the routing/dispatch core: it accepts
//! connections, parses request heads, hands requests to the
//! [`Coordinator`], and drives body-aware dispatch by feeding socket reads
//! to the body stream as chunk events.

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use log::{debug, error, info, warn};

use crate::dispatch::{BodyEvent, BodyStream, Coordinator, Dispatch, Flow, ResponseSink};
use crate::parser::parse_request;
use crate::server::config::ServerConfig;
use crate::server::error::Error;
use crate::server::response::{HttpResponse, StatusCode};

/// Response sink that serializes responses into an output buffer.
///
/// The buffer is flushed to the socket once the request's dispatch has
/// completed.
#[derive(Debug, Default)]
pub struct BufferedSink {
    out: Vec<u8>,
}

impl BufferedSink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// The serialized bytes of every response sent so far.
    pub fn as_bytes(&self) -> &[u8] {
        &self.out
    }

    /// Consume the sink, returning the serialized bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.out
    }
}

impl ResponseSink for BufferedSink {
    fn send(&mut self, response: HttpResponse) {
        self.out.extend_from_slice(&response.to_bytes());
    }
}

/// An HTTP server.
pub struct HttpServer {
    /// The server configuration.
    pub config: ServerConfig,
    /// The request coordinator; its route registry is fixed at construction.
    pub coordinator: Arc<Coordinator>,
}

impl HttpServer {
    /// Create a new HTTP server over a fully registered coordinator.
    pub fn new(config: ServerConfig, coordinator: Coordinator) -> Self {
        Self {
            config,
            coordinator: Arc::new(coordinator),
        }
    }

    /// Display the registered endpoints.
    fn display_server_info(&self) {
        info!(
            "microroute-rs {version}",
            version = env!("CARGO_PKG_VERSION")
        );
        info!("Registered endpoints:");
        for (verb, template) in self.coordinator.router().endpoints() {
            info!("  {verb} {template}");
        }
    }

    /// Set up the TCP listener.
    async fn setup_listener(&self) -> Result<TcpListener, Error> {
        let listener = TcpListener::bind(&self.config.addr).await?;
        info!("Server listening on http://{addr}", addr = self.config.addr);
        Ok(listener)
    }

    /// Set up a Ctrl+C handler for graceful shutdown.
    fn setup_ctrl_c_handler(shutdown_tx: Arc<mpsc::Sender<()>>, tasks: &mut JoinSet<()>) {
        tasks.spawn(async move {
            match signal::ctrl_c().await {
                Ok(()) => {
                    info!("Received Ctrl+C, initiating graceful shutdown");
                    let _ = shutdown_tx.send(()).await;
                }
                Err(e) => {
                    error!("Error setting up Ctrl+C handler: {e}");
                }
            }
        });
    }

    /// Handle a new connection.
    async fn handle_new_connection(
        mut socket: tokio::net::TcpStream,
        addr: SocketAddr,
        semaphore: Arc<tokio::sync::Semaphore>,
        coordinator: Arc<Coordinator>,
        config: ServerConfig,
        shutdown_tx: Arc<mpsc::Sender<()>>,
        tasks: &mut JoinSet<()>,
    ) {
        // Try to acquire a permit from the semaphore
        let permit = match semaphore.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                warn!("Connection limit reached, rejecting connection from {addr}");
                let response = HttpResponse::new(StatusCode::ServiceUnavailable)
                    .with_content_type("text/plain")
                    .with_body_string("Server is at capacity, please try again later");
                let _ = socket.write_all(&response.to_bytes()).await;
                return;
            }
        };

        let shutdown_tx = shutdown_tx.clone();

        // Spawn a task to handle the connection
        tasks.spawn(async move {
            // The permit is dropped when the task completes, releasing the semaphore slot
            let _permit = permit;

            if let Err(e) = Self::handle_connection(&mut socket, &coordinator, &config).await {
                error!("Error handling connection: {e}");

                // If there's a critical error, signal shutdown
                if matches!(e, Error::IoError(_)) {
                    info!("Critical I/O error, initiating shutdown");
                    let _ = shutdown_tx.send(()).await;
                }
            }
        });
    }

    /// Handle connection errors.
    async fn handle_connection_error(e: std::io::Error) -> bool {
        error!("Error accepting connection: {e}");

        // If there's a critical error, signal to break the loop
        if e.kind() == std::io::ErrorKind::BrokenPipe {
            error!("Critical error accepting connection, shutting down");
            return true;
        }

        // For other errors, wait a bit before retrying
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
        false
    }

    /// Perform graceful shutdown.
    async fn perform_shutdown(tasks: &mut JoinSet<()>) {
        info!("Waiting for {len} active connections to complete...", len = tasks.len());
        let shutdown_timeout = tokio::time::Duration::from_secs(30);
        let _ = tokio::time::timeout(shutdown_timeout, async {
            while let Some(res) = tasks.join_next().await {
                if let Err(e) = res {
                    error!("Task failed during shutdown: {e}");
                }
            }
        })
        .await;

        info!("Server shutdown complete");
    }

    /// Start the server and listen for incoming connections.
    pub async fn start(&self) -> Result<(), Error> {
        // Display server information
        self.display_server_info();

        // Set up the TCP listener
        let listener = self.setup_listener().await?;

        // Create a semaphore to limit concurrent connections
        let semaphore = Arc::new(tokio::sync::Semaphore::new(self.config.max_connections));

        // Create a channel for shutdown signaling
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let shutdown_tx = Arc::new(shutdown_tx);

        // Use JoinSet to keep track of all spawned tasks
        let mut tasks = JoinSet::new();

        // Set up a Ctrl+C handler for graceful shutdown
        Self::setup_ctrl_c_handler(shutdown_tx.clone(), &mut tasks);

        loop {
            tokio::select! {
                // Check for shutdown signal
                _ = shutdown_rx.recv() => {
                    info!("Shutting down server...");
                    break;
                }

                // Accept new connections
                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((socket, addr)) => {
                            Self::handle_new_connection(
                                socket,
                                addr,
                                semaphore.clone(),
                                self.coordinator.clone(),
                                self.config.clone(),
                                shutdown_tx.clone(),
                                &mut tasks
                            ).await;
                        },
                        Err(e) => {
                            if Self::handle_connection_error(e).await {
                                break;
                            }
                        }
                    }
                }
            }
        }

        // Perform graceful shutdown
        Self::perform_shutdown(&mut tasks).await;

        Ok(())
    }

    /// Handle a single connection.
    pub async fn handle_connection(
        socket: &mut (impl AsyncRead + AsyncWrite + Unpin),
        coordinator: &Coordinator,
        config: &ServerConfig,
    ) -> Result<(), Error> {
        let mut buf = vec![0; config.read_buffer_size];

        // Read data from the socket
        let n = socket.read(&mut buf).await?;
        if n == 0 {
            return Ok(()); // Connection closed
        }

        // Parse the request head; bytes past the head boundary are body bytes
        let (request, body_offset) = match parse_request(&buf[..n]) {
            Ok(parsed) => parsed,
            Err(e) => {
                let response = HttpResponse::new(StatusCode::BadRequest)
                    .with_content_type("text/plain")
                    .with_body_string(format!("Error parsing request: {e}"));
                socket.write_all(&response.to_bytes()).await?;
                return Err(Error::ParseError(e));
            }
        };

        let method = request.method;
        let path = request.path.clone();
        let content_length = request.content_length();

        let mut sink = BufferedSink::new();
        let result = match coordinator.handle(request, &mut sink) {
            Dispatch::Immediate(response) => {
                debug!("{method} {path} -> {status}", status = response.status as u16);
                Ok(())
            }
            Dispatch::StreamBody(mut stream) => {
                Self::drive_body(
                    socket,
                    &mut stream,
                    &mut buf,
                    (body_offset, n),
                    content_length,
                    config.max_body_size,
                )
                .await
            }
        };

        // Flush whatever the dispatch wrote
        socket.write_all(sink.as_bytes()).await?;
        result
    }

    /// Feed the request body to a body-aware dispatch as chunk events.
    ///
    /// Bytes already read along with the head are replayed as the first
    /// chunk; the socket is then read until `content_length` bytes have been
    /// delivered or the stream stops. A body-consuming route needs a valid
    /// Content-Length; without one the request is answered 411.
    async fn drive_body(
        socket: &mut (impl AsyncRead + AsyncWrite + Unpin),
        stream: &mut BodyStream<'_>,
        buf: &mut [u8],
        first_chunk: (usize, usize),
        content_length: Option<usize>,
        max_body_size: usize,
    ) -> Result<(), Error> {
        let Some(content_length) = content_length else {
            warn!("Body-consuming route requested without a usable Content-Length, rejecting");
            stream.abort();
            let response = HttpResponse::new(StatusCode::LengthRequired)
                .with_content_type("text/plain")
                .with_body_string("Content-Length is required for this route");
            socket.write_all(&response.to_bytes()).await?;
            return Ok(());
        };

        if content_length > max_body_size {
            warn!("Request body of {content_length} bytes exceeds limit of {max_body_size}, rejecting");
            stream.abort();
            let response = HttpResponse::new(StatusCode::PayloadTooLarge)
                .with_content_type("text/plain")
                .with_body_string("Request body exceeds the configured limit");
            socket.write_all(&response.to_bytes()).await?;
            return Ok(());
        }

        let mut remaining = content_length;
        let mut acked = 0usize;
        let mut flow = Flow::Continue;

        // Replay body bytes that arrived with the head
        let (start, end) = first_chunk;
        if end > start && remaining > 0 {
            let take = (end - start).min(remaining);
            let mut ack = || acked += 1;
            flow = stream.on_event(BodyEvent::Chunk {
                data: &buf[start..start + take],
                ack: &mut ack,
            })?;
            remaining -= take;
        }

        // Read the rest of the body from the socket
        while flow == Flow::Continue && remaining > 0 {
            let n = socket.read(&mut buf[..]).await?;
            if n == 0 {
                let received = stream.received();
                stream.abort();
                return Err(Error::IncompleteBody {
                    expected: content_length,
                    received,
                });
            }
            let take = n.min(remaining);
            let mut ack = || acked += 1;
            flow = stream.on_event(BodyEvent::Chunk {
                data: &buf[..take],
                ack: &mut ack,
            })?;
            remaining -= take;
        }

        if flow == Flow::Continue {
            stream.on_event(BodyEvent::End)?;
        } else {
            debug!("Body stream stopped after {acked} acknowledged chunks");
        }
        Ok(())
    }
}
