//! Incremental body assembly.
//!
//! Body bytes arrive as ordered chunks from the transport. [`BodyAssembly`]
//! accumulates them through a small state machine with exactly-once
//! completion: `Idle → Streaming → Completed`, with `Aborted` reachable from
//! the two non-terminal states. Terminal states reject every further event.

use thiserror::Error;

/// Flow decision returned to the transport after each body event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Keep delivering events.
    Continue,
    /// Cease delivering events for this request.
    Stop,
}

/// Errors raised by the body assembly protocol.
///
/// These are fatal for the request's connection and never retried.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StreamError {
    /// An event arrived after the stream reached a terminal state.
    #[error("body event received after stream was {0}")]
    Terminal(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamState {
    Idle,
    Streaming,
    Completed,
    Aborted,
}

/// One body event delivered by the transport.
pub enum BodyEvent<'a> {
    /// One delivery of body bytes, with the transport's acknowledge callback.
    /// The callback releases the chunk's transport-side resources and is
    /// invoked exactly once per chunk.
    Chunk {
        data: &'a [u8],
        ack: &'a mut dyn FnMut(),
    },
    /// The body is complete; no further chunks follow.
    End,
}

/// Append-only buffer for one in-flight request body.
///
/// Scoped to a single request and never shared; the buffer is finalized
/// exactly once by [`finish`](Self::finish), after which it is immutable.
#[derive(Debug)]
pub struct BodyAssembly {
    state: StreamState,
    buffer: Vec<u8>,
}

impl Default for BodyAssembly {
    fn default() -> Self {
        Self::new()
    }
}

impl BodyAssembly {
    /// Create an idle assembly with an empty buffer.
    pub fn new() -> Self {
        Self {
            state: StreamState::Idle,
            buffer: Vec::new(),
        }
    }

    /// Append one chunk of body bytes.
    pub fn push_chunk(&mut self, data: &[u8]) -> Result<(), StreamError> {
        match self.state {
            StreamState::Idle | StreamState::Streaming => {
                self.state = StreamState::Streaming;
                self.buffer.extend_from_slice(data);
                Ok(())
            }
            StreamState::Completed => Err(StreamError::Terminal("completed")),
            StreamState::Aborted => Err(StreamError::Terminal("aborted")),
        }
    }

    /// Finalize the buffer and return the assembled body.
    ///
    /// Valid from `Idle` (empty body) or `Streaming`; the assembly becomes
    /// `Completed` and rejects all further events.
    pub fn finish(&mut self) -> Result<Vec<u8>, StreamError> {
        match self.state {
            StreamState::Idle | StreamState::Streaming => {
                self.state = StreamState::Completed;
                Ok(std::mem::take(&mut self.buffer))
            }
            StreamState::Completed => Err(StreamError::Terminal("completed")),
            StreamState::Aborted => Err(StreamError::Terminal("aborted")),
        }
    }

    /// Abandon the stream and discard the buffer.
    ///
    /// A no-op once the assembly is already terminal.
    pub fn abort(&mut self) {
        if matches!(self.state, StreamState::Idle | StreamState::Streaming) {
            self.state = StreamState::Aborted;
            self.buffer.clear();
        }
    }

    /// Bytes accumulated so far.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// true if no bytes have been accumulated.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// true once the assembly is `Completed` or `Aborted`.
    pub fn is_terminal(&self) -> bool {
        matches!(self.state, StreamState::Completed | StreamState::Aborted)
    }
}
