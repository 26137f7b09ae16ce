//! Text-message adapter
//!
//! [`TextAdapter`] gives byte-oriented callers a `write(bytes)` /
//! `read() -> bytes` interface over a message connection. Every outbound
//! message is sent as text; inbound messages of any other kind are consumed
//! and dropped.
//!
//! The adapter takes no locks. Both operations need `&mut self`, so one
//! adapter value has at most one writer and one reader at a time; callers
//! that share an adapter between tasks must wrap it in their own mutex.

use std::io;
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tracing::trace;

use crate::connection::{Duplex, MessageKind, MessageSink, MessageSource, MessageWriter};

/// Errors returned by [`TextAdapter`] operations
#[derive(Error, Debug)]
pub enum AdapterError {
    /// The connection could not supply a writer or the next message
    #[error("connection error: {0}")]
    Connection(#[source] io::Error),

    /// Writing into, or finalizing, an open outbound message failed
    #[error("write failed after {written} bytes: {source}")]
    Write {
        written: usize,
        #[source]
        source: io::Error,
    },

    /// More consecutive non-text messages arrived than the configured limit
    #[error("no text message after skipping {skipped} non-text messages")]
    SkipLimitExceeded { skipped: usize },
}

impl AdapterError {
    /// Bytes the underlying writer accepted before the failure
    pub fn bytes_written(&self) -> usize {
        match self {
            AdapterError::Write { written, .. } => *written,
            _ => 0,
        }
    }

    /// The transport error, if this failure came from one
    pub fn io_error(&self) -> Option<&io::Error> {
        match self {
            AdapterError::Connection(source) | AdapterError::Write { source, .. } => Some(source),
            AdapterError::SkipLimitExceeded { .. } => None,
        }
    }
}

/// Stream-style read/write over the text messages of a connection
///
/// The adapter does not own the connection's lifecycle: pass `&mut conn` to
/// keep ownership, or hand over a connection and get it back with
/// [`into_inner`](TextAdapter::into_inner).
#[derive(Debug)]
pub struct TextAdapter<C> {
    conn: C,
    skip_limit: Option<usize>,
}

impl<C> TextAdapter<C> {
    pub fn new(conn: C) -> Self {
        Self {
            conn,
            skip_limit: None,
        }
    }

    /// Fail a `read` once more than `limit` consecutive non-text messages
    /// have been discarded. Without a limit the skip loop is unbounded.
    pub fn with_skip_limit(mut self, limit: usize) -> Self {
        self.skip_limit = Some(limit);
        self
    }

    pub fn skip_limit(&self) -> Option<usize> {
        self.skip_limit
    }

    pub fn connection(&self) -> &C {
        &self.conn
    }

    pub fn connection_mut(&mut self) -> &mut C {
        &mut self.conn
    }

    pub fn into_inner(self) -> C {
        self.conn
    }
}

impl<R, W> TextAdapter<Duplex<R, W>> {
    /// Split into a read-only and a write-only adapter sharing the skip limit
    pub fn split(self) -> (TextAdapter<R>, TextAdapter<W>) {
        let (source, sink) = self.conn.into_split();
        (
            TextAdapter {
                conn: source,
                skip_limit: self.skip_limit,
            },
            TextAdapter {
                conn: sink,
                skip_limit: self.skip_limit,
            },
        )
    }
}

impl<C: MessageSink> TextAdapter<C> {
    /// Send `data` as exactly one text message
    ///
    /// The outbound message is always closed, even when the write fails.
    /// Returns `data.len()` on success.
    pub async fn write(&mut self, data: &[u8]) -> Result<usize, AdapterError> {
        let mut writer = self
            .conn
            .next_writer(MessageKind::Text)
            .await
            .map_err(AdapterError::Connection)?;

        let written = write_payload(writer.as_mut(), data).await;
        let closed = writer.close().await;

        match (written, closed) {
            (Ok(n), Ok(())) => Ok(n),
            (Err(err), _) => Err(err),
            (Ok(n), Err(source)) => Err(AdapterError::Write { written: n, source }),
        }
    }
}

async fn write_payload(writer: &mut dyn MessageWriter, data: &[u8]) -> Result<usize, AdapterError> {
    let mut written = 0;
    while written < data.len() {
        match writer.write(&data[written..]).await {
            Ok(0) => {
                return Err(AdapterError::Write {
                    written,
                    source: io::ErrorKind::WriteZero.into(),
                })
            }
            Ok(n) => written += n,
            Err(source) => return Err(AdapterError::Write { written, source }),
        }
    }
    Ok(written)
}

impl<C: MessageSource> TextAdapter<C> {
    /// Return the complete payload of the next inbound text message
    ///
    /// Non-text messages met on the way are consumed and dropped. Connection
    /// errors are returned immediately, never skipped.
    pub async fn read(&mut self) -> Result<Vec<u8>, AdapterError> {
        let mut skipped = 0;
        loop {
            let mut message = self
                .conn
                .next_message()
                .await
                .map_err(AdapterError::Connection)?;

            if message.kind != MessageKind::Text {
                skipped += 1;
                trace!(kind = %message.kind, skipped, "discarding non-text message");
                if self.skip_limit.is_some_and(|limit| skipped > limit) {
                    return Err(AdapterError::SkipLimitExceeded { skipped });
                }
                continue;
            }

            let mut payload = Vec::new();
            message
                .reader
                .read_to_end(&mut payload)
                .await
                .map_err(AdapterError::Connection)?;
            return Ok(payload);
        }
    }
}
