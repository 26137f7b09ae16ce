//! Pumps between line-oriented byte streams and text adapters

use anyhow::Result;
use std::io;
use textsock_shared::{AdapterError, MessageSink, MessageSource, TextAdapter};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::trace;

/// Send each input line (without its newline) as one text message
///
/// Returns the number of messages sent once the input is exhausted.
pub async fn pump_input<I, W>(input: I, writer: &mut TextAdapter<W>) -> Result<usize>
where
    I: AsyncBufRead + Unpin,
    W: MessageSink,
{
    let mut lines = input.lines();
    let mut sent = 0;
    while let Some(line) = lines.next_line().await? {
        writer.write(line.as_bytes()).await?;
        sent += 1;
        trace!(sent, len = line.len(), "sent line");
    }
    Ok(sent)
}

/// Write each inbound text message to `output` as one line
///
/// A peer closing the connection ends the pump normally and returns the
/// number of messages written; any other failure is an error.
pub async fn pump_output<R, O>(reader: &mut TextAdapter<R>, mut output: O) -> Result<usize>
where
    R: MessageSource,
    O: AsyncWrite + Unpin,
{
    let mut received = 0;
    loop {
        let message = match reader.read().await {
            Ok(message) => message,
            Err(e) if is_closed(&e) => return Ok(received),
            Err(e) => return Err(e.into()),
        };
        output.write_all(&message).await?;
        output.write_all(b"\n").await?;
        output.flush().await?;
        received += 1;
    }
}

/// Whether a read failure just means the peer went away
pub fn is_closed(err: &AdapterError) -> bool {
    matches!(
        err.io_error().map(io::Error::kind),
        Some(
            io::ErrorKind::UnexpectedEof
                | io::ErrorKind::ConnectionAborted
                | io::ErrorKind::ConnectionReset
        )
    )
}
