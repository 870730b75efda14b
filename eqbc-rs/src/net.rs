//! Async line transport.
//!
//! [`LineCodec`] is the pure part: it turns raw bytes into `\n`-terminated
//! lines and is testable without any I/O.  [`LineReader`] and [`LineWriter`]
//! wrap the two halves of a connection; [`connect_plain`] opens a TCP
//! connection and splits it so the read loop and the write path never share
//! a handle.
//!
//! Lines are otherwise passed through untouched, with two exceptions: a `\r`
//! directly before the `\n` is dropped so CRLF servers print cleanly, and a
//! fragment that reaches [`MAX_LINE`] bytes without a `\n` is delivered as a
//! line of its own.

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::framer::OutboundMessage;

// ── NetEvent ──────────────────────────────────────────────────────────────────

/// Events produced by [`LineReader::recv`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetEvent {
    /// One line from the server, terminator stripped.
    Line(String),
    /// The server closed the connection.
    Closed,
}

// ── LineCodec (pure, testable) ────────────────────────────────────────────────

/// Longest fragment buffered before it is delivered without a terminator.
pub const MAX_LINE: usize = 64 * 1024;

/// Newline framing for the inbound byte stream.
#[derive(Debug, Default)]
pub struct LineCodec {
    /// Bytes received since the last `\n`.
    line_buf: Vec<u8>,
}

impl LineCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes, returning every line they complete.
    ///
    /// A `\r` directly before the `\n` is dropped; blank lines are kept.
    /// Invalid UTF-8 is replaced rather than rejected.
    pub fn feed(&mut self, raw: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        for &b in raw {
            if b == b'\n' {
                if self.line_buf.last() == Some(&b'\r') {
                    self.line_buf.pop();
                }
                let line = std::mem::take(&mut self.line_buf);
                lines.push(String::from_utf8_lossy(&line).into_owned());
            } else {
                self.line_buf.push(b);
                if self.line_buf.len() >= MAX_LINE {
                    let line = std::mem::take(&mut self.line_buf);
                    lines.push(String::from_utf8_lossy(&line).into_owned());
                }
            }
        }
        lines
    }

    /// Whether an unterminated fragment is buffered.
    pub fn has_pending(&self) -> bool {
        !self.line_buf.is_empty()
    }

    /// Take the unterminated fragment, if any (used at end of stream).
    pub fn finish(&mut self) -> Option<String> {
        if self.line_buf.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.line_buf);
        Some(String::from_utf8_lossy(&rest).into_owned())
    }
}

// ── LineReader ────────────────────────────────────────────────────────────────

const READ_BUF: usize = 8192;

/// The read half of a connection.
pub struct LineReader<R> {
    stream: R,
    codec: LineCodec,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    pub fn new(stream: R) -> Self {
        Self { stream, codec: LineCodec::new() }
    }

    /// Read from the server and decode into [`NetEvent`]s.
    ///
    /// On EOF, a buffered fragment is delivered as a final line followed by
    /// [`NetEvent::Closed`].  Returns `Err` on I/O error.
    pub async fn recv(&mut self) -> io::Result<Vec<NetEvent>> {
        let mut raw = [0u8; READ_BUF];
        let n = self.stream.read(&mut raw).await?;
        if n == 0 {
            let mut events: Vec<NetEvent> = self.codec.finish().map(NetEvent::Line).into_iter().collect();
            events.push(NetEvent::Closed);
            return Ok(events);
        }
        Ok(self.codec.feed(&raw[..n]).into_iter().map(NetEvent::Line).collect())
    }
}

// ── LineWriter ────────────────────────────────────────────────────────────────

/// The write half of a connection.
pub struct LineWriter {
    stream: Box<dyn AsyncWrite + Send + Unpin>,
}

impl LineWriter {
    pub fn new<W: AsyncWrite + Send + Unpin + 'static>(stream: W) -> Self {
        Self { stream: Box::new(stream) }
    }

    /// Write `bytes` verbatim and flush.
    pub async fn send_raw(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.stream.write_all(bytes).await?;
        self.stream.flush().await
    }

    /// Write one framed message and flush.
    pub async fn send(&mut self, msg: &OutboundMessage) -> io::Result<()> {
        self.send_raw(&msg.to_wire()).await
    }

    /// Shut down the write direction.
    pub async fn shutdown(&mut self) -> io::Result<()> {
        self.stream.shutdown().await
    }
}

// ── Connecting ────────────────────────────────────────────────────────────────

/// Open a plain TCP connection to `host:port` and split it.
pub async fn connect_plain(
    host: &str,
    port: u16,
) -> io::Result<(LineReader<tokio::net::tcp::OwnedReadHalf>, LineWriter)> {
    let stream = TcpStream::connect((host, port)).await?;
    let (read, write) = stream.into_split();
    Ok((LineReader::new(read), LineWriter::new(write)))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
