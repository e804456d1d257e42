use std::io::SeekFrom;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_util::Stream;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;

use crate::core::error::StorageError;
use crate::storage::fs::OpenFile;

use super::range::ResolvedRange;

/// Read buffer size for file streaming.
pub const STREAM_CHUNK_BYTES: usize = 64 * 1024;

// ---------------------------------------------------------------------------
// Length-guarded body stream
// ---------------------------------------------------------------------------

/// Wraps a chunk stream and enforces that exactly `expected` bytes flow
/// through it.
///
/// Over-delivery is truncated at the boundary and the stream ends there,
/// so the body can never exceed the Content-Length already sent. Under-
/// delivery (the file shrank mid-stream) surfaces as an I/O error, which
/// aborts the connection rather than silently handing the client a short
/// body that still claimed the full length.
pub struct LengthGuard<S> {
    inner: S,
    expected: u64,
    emitted: u64,
    done: bool,
}

impl<S> LengthGuard<S> {
    pub fn new(inner: S, expected: u64) -> Self {
        Self {
            inner,
            expected,
            emitted: 0,
            done: false,
        }
    }

    /// Bytes emitted so far.
    pub fn emitted(&self) -> u64 {
        self.emitted
    }
}

impl<S> Stream for LengthGuard<S>
where
    S: Stream<Item = std::io::Result<Bytes>> + Unpin,
{
    type Item = std::io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.done {
            return Poll::Ready(None);
        }

        match Pin::new(&mut self.inner).poll_next(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Some(Ok(mut chunk))) => {
                let remaining = self.expected - self.emitted;
                if chunk.len() as u64 > remaining {
                    chunk.truncate(remaining as usize);
                }
                self.emitted += chunk.len() as u64;
                if self.emitted == self.expected {
                    self.done = true;
                }
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(e))) => {
                self.done = true;
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                self.done = true;
                if self.emitted < self.expected {
                    Poll::Ready(Some(Err(std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        format!(
                            "media file truncated: emitted {} of {} bytes",
                            self.emitted, self.expected
                        ),
                    ))))
                } else {
                    Poll::Ready(None)
                }
            }
        }
    }
}

/// The body stream type the stream endpoint serves.
pub type SpanStream = LengthGuard<ReaderStream<tokio::io::Take<tokio::fs::File>>>;

/// Position an opened file at the resolved span and return a stream that
/// emits exactly the span's bytes. The `take` bounds what the reader can
/// ever pull from disk; the guard turns a short file into a hard error.
pub async fn span_stream(opened: OpenFile, range: &ResolvedRange) -> Result<SpanStream, StorageError> {
    let mut file = opened.file;
    file.seek(SeekFrom::Start(range.start)).await?;
    let limited = file.take(range.len);
    Ok(LengthGuard::new(
        ReaderStream::with_capacity(limited, STREAM_CHUNK_BYTES),
        range.len,
    ))
}
