//! Content-Length frame codec.
//!
//! Wire format:
//!
//! ```text
//! Content-Length: <decimal byte count>\r\n
//! \r\n
//! <exactly that many bytes of UTF-8 JSON>
//! ```

use bytes::BytesMut;
use serde::Serialize;
use std::future::Future;
use std::io::ErrorKind;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::trace;

use super::envelope::Envelope;
use crate::error::{Error, ProtocolViolation, Result};

/// Literal every header line must start with.
pub const HEADER_TAG: &str = "Content-Length:";

/// Default upper bound on a single frame body.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 16 * 1024 * 1024; // 16MB

/// Longest accepted header or separator line, terminator included.
pub const MAX_HEADER_LINE: usize = 1024;

/// Parse a header line into the declared body length.
///
/// The line may still carry its `\r\n` terminator.
pub fn parse_header(line: &str) -> std::result::Result<usize, ProtocolViolation> {
    let value = line
        .strip_prefix(HEADER_TAG)
        .ok_or_else(|| ProtocolViolation::MissingContentLength {
            line: line.trim_end().to_string(),
        })?
        .trim();

    value
        .parse::<usize>()
        .map_err(|_| ProtocolViolation::InvalidContentLength {
            value: value.to_string(),
        })
}

/// Reads frames from a buffered input stream.
///
/// Owns the line and body buffers so a partially read frame never leaks
/// into the next one.
pub struct FrameReader<R> {
    reader: R,
    line: Vec<u8>,
    body: BytesMut,
    max_frame_size: usize,
    read_timeout: Option<Duration>,
}

impl<R> FrameReader<R>
where
    R: AsyncBufRead + Unpin,
{
    pub fn new(reader: R) -> Self {
        FrameReader {
            reader,
            line: Vec::with_capacity(64),
            body: BytesMut::with_capacity(4096),
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            read_timeout: None,
        }
    }

    pub fn with_max_frame_size(mut self, max_frame_size: usize) -> Self {
        self.max_frame_size = max_frame_size;
        self
    }

    /// Bound each blocking read. `None` waits forever.
    pub fn with_read_timeout(mut self, read_timeout: Option<Duration>) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    /// Read and decode the next frame.
    ///
    /// Returns `Ok(None)` when the input ends cleanly before a header line.
    pub async fn read_frame(&mut self) -> Result<Option<Envelope>> {
        if self.read_line().await? == 0 {
            return Ok(None);
        }

        let header = std::str::from_utf8(&self.line).map_err(ProtocolViolation::from)?;
        let length = parse_header(header)?;
        if length > self.max_frame_size {
            return Err(ProtocolViolation::FrameTooLarge {
                length,
                limit: self.max_frame_size,
            }
            .into());
        }

        // Blank separator line, content not checked
        if self.read_line().await? == 0 {
            return Err(ProtocolViolation::TruncatedFrame { expected: length }.into());
        }

        self.body.clear();
        self.body.resize(length, 0);
        match timed(self.read_timeout, self.reader.read_exact(&mut self.body[..])).await {
            Ok(_) => {}
            Err(Error::Io(e)) if e.kind() == ErrorKind::UnexpectedEof => {
                return Err(ProtocolViolation::TruncatedFrame { expected: length }.into());
            }
            Err(e) => return Err(e),
        }
        trace!(bytes = length, "Read frame");

        let text = std::str::from_utf8(&self.body).map_err(ProtocolViolation::from)?;
        Ok(Some(Envelope::decode(text)?))
    }

    /// Read one line of at most [`MAX_HEADER_LINE`] bytes into `self.line`.
    async fn read_line(&mut self) -> Result<usize> {
        self.line.clear();
        let mut limited = (&mut self.reader).take(MAX_HEADER_LINE as u64);
        let n = timed(self.read_timeout, limited.read_until(b'\n', &mut self.line)).await?;
        if n == MAX_HEADER_LINE && self.line.last() != Some(&b'\n') {
            return Err(ProtocolViolation::HeaderTooLong {
                limit: MAX_HEADER_LINE,
            }
            .into());
        }
        Ok(n)
    }
}

async fn timed<F, T>(limit: Option<Duration>, fut: F) -> Result<T>
where
    F: Future<Output = std::io::Result<T>>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| Error::ReadTimeout(limit))?
            .map_err(Error::from),
        None => fut.await.map_err(Error::from),
    }
}

/// Encode a value as one complete frame, header and body contiguous.
pub fn encode_frame<T: Serialize>(value: &T) -> Result<BytesMut> {
    let body = serde_json::to_vec(value)?;
    let header = format!("{HEADER_TAG} {}\r\n\r\n", body.len());

    let mut buf = BytesMut::with_capacity(header.len() + body.len());
    buf.extend_from_slice(header.as_bytes());
    buf.extend_from_slice(&body);
    Ok(buf)
}

/// Result of writing one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStatus {
    /// Frame written and flushed; total bytes on the wire.
    Written(usize),
    /// The peer closed its read side.
    PeerClosed,
}

/// Write one frame in a single `write_all` and flush.
pub async fn write_frame<W, T>(writer: &mut W, value: &T) -> Result<WriteStatus>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let frame = encode_frame(value)?;

    let written = async {
        writer.write_all(&frame).await?;
        writer.flush().await
    }
    .await;

    match written {
        Ok(()) => {
            trace!(bytes = frame.len(), "Wrote frame");
            Ok(WriteStatus::Written(frame.len()))
        }
        Err(e) if is_peer_closed(&e) => Ok(WriteStatus::PeerClosed),
        Err(e) => Err(e.into()),
    }
}

fn is_peer_closed(err: &std::io::Error) -> bool {
    matches!(err.kind(), ErrorKind::BrokenPipe | ErrorKind::ConnectionReset)
}
