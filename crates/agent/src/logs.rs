//! Line-by-line reading of the agent's live log stream.
//!
//! `GET /v1/agent/monitor` answers with a body that never ends on its own: the
//! agent keeps writing log lines until the client disconnects or the agent
//! shuts down. [`LogStreamReader`] owns that body and turns it into a lazy,
//! forward-only sequence of lines.
//!
//! The stream and its partial-line buffer are held together in one session
//! slot. Every way out of the reader (end of data, a read or decode error,
//! cancellation, an explicit [`LogStreamReader::release`], or being dropped)
//! empties that slot, and emptying an empty slot does nothing. The underlying
//! connection is therefore closed exactly once.
//!
//! A line longer than [`MAX_LINE_BYTES`] (or the limit set with
//! [`LogStreamReader::with_max_line_bytes`]) is a decode error, so a stream
//! that never sends `\n` cannot grow the buffer without bound.

use futures::Stream;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::errors::TransportError;
use crate::transport::ByteStream;

/// Default upper bound on a single log line, terminator included.
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Where a [`LogStreamReader`] is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    /// The stream is open; more lines may follow.
    Open,
    /// The stream has been closed and its resources dropped.
    Released,
}

struct StreamSession<R> {
    reader: BufReader<R>,
    /// Bytes of a line whose terminator has not arrived yet.
    pending: Vec<u8>,
}

/// A non-restartable sequence of text lines read from an open byte stream.
///
/// Lines are returned without their `\n` (or `\r\n`) terminator, in the order
/// the agent wrote them. A final line with no terminator is still returned
/// before the sequence ends.
pub struct LogStreamReader<R = ByteStream> {
    session: Option<StreamSession<R>>,
    cancel: Option<CancellationToken>,
    max_line_bytes: usize,
}

impl<R> LogStreamReader<R>
where
    R: AsyncRead + Unpin,
{
    /// Takes exclusive ownership of an already-open stream.
    pub fn new(stream: R) -> Self {
        Self {
            session: Some(StreamSession {
                reader: BufReader::new(stream),
                pending: Vec::new(),
            }),
            cancel: None,
            max_line_bytes: MAX_LINE_BYTES,
        }
    }

    /// Aborts pending and future reads when `token` is cancelled.
    ///
    /// A read interrupted this way releases the stream and returns
    /// [`TransportError::Cancelled`].
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Replaces the [`MAX_LINE_BYTES`] limit on a single line.
    pub fn with_max_line_bytes(mut self, limit: usize) -> Self {
        self.max_line_bytes = limit.max(1);
        self
    }

    /// Whether the stream is still open.
    pub fn state(&self) -> ReaderState {
        if self.session.is_some() {
            ReaderState::Open
        } else {
            ReaderState::Released
        }
    }

    /// Waits for the next complete line.
    ///
    /// Returns `Ok(None)` once the agent has closed the stream, and on every
    /// call after the reader has been released. Errors release the stream
    /// before they are returned.
    ///
    /// Dropping the returned future part-way keeps any bytes already read;
    /// they are carried into the next call.
    pub async fn next_line(&mut self) -> Result<Option<String>, TransportError> {
        let outcome = match self.session.as_mut() {
            None => return Ok(None),
            Some(session) => {
                read_line(session, self.cancel.as_ref(), self.max_line_bytes).await
            }
        };

        match outcome {
            Ok(Some(line)) => Ok(Some(line)),
            Ok(None) => {
                self.release();
                Ok(None)
            }
            Err(err) => {
                self.release();
                Err(err)
            }
        }
    }

    /// Closes the stream and drops the line buffer. Safe to call repeatedly.
    pub fn release(&mut self) {
        if let Some(session) = self.session.take() {
            drop(session);
            debug!("log stream released");
        }
    }

    /// Converts the reader into a [`Stream`] of lines.
    ///
    /// The stream ends after the first error, since the reader has released
    /// its resources by then.
    pub fn into_stream(self) -> impl Stream<Item = Result<String, TransportError>> {
        futures::stream::unfold(self, |mut reader| async move {
            match reader.next_line().await {
                Ok(Some(line)) => Some((Ok(line), reader)),
                Ok(None) => None,
                Err(err) => Some((Err(err), reader)),
            }
        })
    }
}

impl<R> Drop for LogStreamReader<R> {
    fn drop(&mut self) {
        if self.session.take().is_some() {
            debug!("log stream released on drop");
        }
    }
}

impl<R> std::fmt::Debug for LogStreamReader<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogStreamReader")
            .field("open", &self.session.is_some())
            .field("cancellable", &self.cancel.is_some())
            .finish()
    }
}

/// Reads one line into `session.pending`; `Ok(None)` means end of data.
async fn read_line<R>(
    session: &mut StreamSession<R>,
    cancel: Option<&CancellationToken>,
    max_line_bytes: usize,
) -> Result<Option<String>, TransportError>
where
    R: AsyncRead + Unpin,
{
    let StreamSession { reader, pending } = session;

    // One byte past the limit is enough to tell an overlong line apart.
    let budget = (max_line_bytes + 1).saturating_sub(pending.len()) as u64;
    let mut limited = (&mut *reader).take(budget);
    let read = match cancel {
        Some(token) => tokio::select! {
            biased;
            _ = token.cancelled() => return Err(TransportError::Cancelled),
            read = limited.read_until(b'\n', pending) => read?,
        },
        None => limited.read_until(b'\n', pending).await?,
    };

    if pending.len() > max_line_bytes && pending.last() != Some(&b'\n') {
        return Err(TransportError::Decode {
            message: format!("log line exceeds {max_line_bytes} bytes"),
        });
    }
    if read == 0 && pending.is_empty() {
        return Ok(None);
    }

    let mut bytes = std::mem::take(pending);
    if bytes.last() == Some(&b'\n') {
        bytes.pop();
        if bytes.last() == Some(&b'\r') {
            bytes.pop();
        }
    }
    String::from_utf8(bytes)
        .map(Some)
        .map_err(|e| TransportError::Decode {
            message: format!("log line is not valid UTF-8: {e}"),
        })
}
