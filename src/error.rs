//! Error types for the fixture server.
//!
//! Everything in here is fatal for the session. Recoverable protocol
//! conditions (unknown methods, out-of-order requests) never reach this
//! type; they are answered on the wire instead.

use std::time::Duration;
use thiserror::Error;

/// A peer broke the framing or envelope contract.
///
/// Kept apart from [`Error::Io`] and [`Error::Json`] so callers can tell a
/// misbehaving client from a broken stream.
#[derive(Debug, Error)]
pub enum ProtocolViolation {
    /// Header line did not start with `Content-Length:`.
    #[error("expected Content-Length header, got {line:?}")]
    MissingContentLength { line: String },

    /// Header value was not a non-negative decimal integer.
    #[error("invalid Content-Length value {value:?}")]
    InvalidContentLength { value: String },

    /// Header or separator line ran past the line limit without a newline.
    #[error("header line longer than {limit} bytes")]
    HeaderTooLong { limit: usize },

    /// Declared body length exceeds the configured limit.
    #[error("frame body of {length} bytes exceeds limit of {limit} bytes")]
    FrameTooLarge { length: usize, limit: usize },

    /// Input ended after a header but before the full body arrived.
    #[error("stream ended inside a frame (expected {expected} body bytes)")]
    TruncatedFrame { expected: usize },

    /// Header or body bytes were not valid UTF-8.
    #[error("frame is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    /// Body was not a JSON-RPC request or notification.
    #[error("invalid envelope: {0}")]
    InvalidEnvelope(#[source] serde_json::Error),
}

/// Main error type for a session.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error on the input or output stream.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error while building a response.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Peer violated the framing contract.
    #[error("protocol violation: {0}")]
    Protocol(#[from] ProtocolViolation),

    /// No frame arrived within the configured read timeout.
    #[error("no input within {0:?}")]
    ReadTimeout(Duration),
}

impl Error {
    /// Whether this error was caused by malformed peer input.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(self, Error::Protocol(_))
    }
}

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
