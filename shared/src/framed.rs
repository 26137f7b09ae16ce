//! Message connection over any byte stream, using the length-prefixed codec

use async_trait::async_trait;
use bytes::BytesMut;
use std::io;
use std::io::Cursor;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tracing::{debug, trace};

use crate::codec::{self, FrameDecoder, MAX_MESSAGE_SIZE};
use crate::connection::{
    Duplex, InboundMessage, MessageKind, MessageSink, MessageSource, MessageWriter, SinkFault,
};

/// Split a byte stream into a framed message connection
pub fn connect<T>(io: T) -> Duplex<FramedSource<ReadHalf<T>>, FramedSink<WriteHalf<T>>>
where
    T: AsyncRead + AsyncWrite + Send,
{
    let (reader, writer) = tokio::io::split(io);
    Duplex::new(FramedSource::new(reader), FramedSink::new(writer))
}

/// Inbound half: decodes frames from an `AsyncRead`
pub struct FramedSource<R> {
    reader: R,
    decoder: FrameDecoder,
    read_buf: Vec<u8>,
}

impl<R> FramedSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            decoder: FrameDecoder::new(),
            read_buf: vec![0u8; 4096],
        }
    }
}

#[async_trait]
impl<R: AsyncRead + Send + Unpin> MessageSource for FramedSource<R> {
    async fn next_message<'a>(&'a mut self) -> io::Result<InboundMessage<'a>> {
        loop {
            // First try to decode from existing buffer
            if let Some(frame) = self.decoder.decode_next()? {
                trace!(kind = %frame.kind, len = frame.payload.len(), "decoded frame");
                return Ok(InboundMessage {
                    kind: frame.kind,
                    reader: Box::new(Cursor::new(frame.payload)),
                });
            }

            let n = self.reader.read(&mut self.read_buf).await?;
            if n == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed by peer",
                ));
            }
            self.decoder.extend(&self.read_buf[..n]);
        }
    }
}

/// Outbound half: encodes one frame per message onto an `AsyncWrite`
///
/// A failed frame write or a shutdown is sticky: later writer requests fail
/// before anything is buffered.
pub struct FramedSink<W> {
    writer: W,
    out: BytesMut,
    fault: SinkFault,
}

impl<W> FramedSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            out: BytesMut::with_capacity(4096),
            fault: SinkFault::default(),
        }
    }
}

#[async_trait]
impl<W: AsyncWrite + Send + Unpin> MessageSink for FramedSink<W> {
    async fn next_writer<'a>(
        &'a mut self,
        kind: MessageKind,
    ) -> io::Result<Box<dyn MessageWriter + 'a>> {
        self.fault.check()?;
        Ok(Box::new(FramedMessageWriter {
            sink: self,
            kind,
            payload: BytesMut::new(),
            closed: false,
        }))
    }

    async fn shutdown(&mut self) -> io::Result<()> {
        let result = self.writer.shutdown().await;
        if let Err(e) = &result {
            self.fault.record(e);
        }
        self.fault.record(&io::Error::new(
            io::ErrorKind::BrokenPipe,
            "connection already shut down",
        ));
        debug!("framed connection shut down");
        result
    }
}

struct FramedMessageWriter<'a, W> {
    sink: &'a mut FramedSink<W>,
    kind: MessageKind,
    payload: BytesMut,
    closed: bool,
}

#[async_trait]
impl<'w, W: AsyncWrite + Send + Unpin> MessageWriter for FramedMessageWriter<'w, W> {
    async fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.closed {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "message already closed",
            ));
        }
        if self.payload.len() + buf.len() >= MAX_MESSAGE_SIZE as usize {
            return Err(codec::CodecError::MessageTooLarge(self.payload.len() + buf.len()).into());
        }
        self.payload.extend_from_slice(buf);
        Ok(buf.len())
    }

    async fn close(&mut self) -> io::Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let FramedSink { writer, out, fault } = &mut *self.sink;
        out.clear();
        codec::encode_into(self.kind, &self.payload, out)?;
        if let Err(e) = send_frame(writer, out).await {
            fault.record(&e);
            return Err(e);
        }
        trace!(kind = %self.kind, len = self.payload.len(), "sent frame");
        Ok(())
    }
}

async fn send_frame<W: AsyncWrite + Unpin>(writer: &mut W, frame: &[u8]) -> io::Result<()> {
    writer.write_all(frame).await?;
    writer.flush().await
}
