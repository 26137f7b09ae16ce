//! Capability traits for full-duplex message connections
//!
//! A message connection carries discrete, typed frames instead of an
//! undifferentiated byte stream. The outbound side hands out one scoped
//! [`MessageWriter`] per message; the inbound side yields one
//! [`InboundMessage`] per frame. Handshake, keepalive and teardown are the
//! implementation's business.

use async_trait::async_trait;
use std::fmt;
use std::io;
use tokio::io::AsyncRead;

/// Discriminator carried by every message frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Text,
    Binary,
}

impl MessageKind {
    /// Wire opcode, matching the WebSocket data opcodes
    pub fn opcode(self) -> u8 {
        match self {
            MessageKind::Text => 0x1,
            MessageKind::Binary => 0x2,
        }
    }

    pub fn from_opcode(opcode: u8) -> Option<Self> {
        match opcode {
            0x1 => Some(MessageKind::Text),
            0x2 => Some(MessageKind::Binary),
            _ => None,
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageKind::Text => write!(f, "text"),
            MessageKind::Binary => write!(f, "binary"),
        }
    }
}

/// One in-progress outbound message
///
/// Bytes written are part of a single frame. The frame is only complete once
/// [`close`](MessageWriter::close) returns; a writer that is dropped without
/// closing sends nothing.
#[async_trait]
pub trait MessageWriter: Send {
    /// Append bytes to the message, returning how many were accepted
    async fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Finalize the message and flush it to the transport
    async fn close(&mut self) -> io::Result<()>;
}

/// A received message frame and a reader over its payload
pub struct InboundMessage<'a> {
    pub kind: MessageKind,
    pub reader: Box<dyn AsyncRead + Send + Unpin + 'a>,
}

impl fmt::Debug for InboundMessage<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InboundMessage")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// Outbound half of a message connection
#[async_trait]
pub trait MessageSink: Send {
    /// Open a new outbound message of the given kind
    async fn next_writer<'a>(
        &'a mut self,
        kind: MessageKind,
    ) -> io::Result<Box<dyn MessageWriter + 'a>>;

    /// Tell the peer no more messages will follow
    ///
    /// Every later `next_writer` call fails.
    async fn shutdown(&mut self) -> io::Result<()>;
}

/// Inbound half of a message connection
#[async_trait]
pub trait MessageSource: Send {
    /// Wait for the next data message
    ///
    /// Fails when the connection is closed, faulted, or the peer violated
    /// the framing protocol.
    async fn next_message<'a>(&'a mut self) -> io::Result<InboundMessage<'a>>;
}

#[async_trait]
impl<T: MessageSink + ?Sized> MessageSink for &mut T {
    async fn next_writer<'a>(
        &'a mut self,
        kind: MessageKind,
    ) -> io::Result<Box<dyn MessageWriter + 'a>> {
        (**self).next_writer(kind).await
    }

    async fn shutdown(&mut self) -> io::Result<()> {
        (**self).shutdown().await
    }
}

#[async_trait]
impl<T: MessageSink + ?Sized> MessageSink for Box<T> {
    async fn next_writer<'a>(
        &'a mut self,
        kind: MessageKind,
    ) -> io::Result<Box<dyn MessageWriter + 'a>> {
        (**self).next_writer(kind).await
    }

    async fn shutdown(&mut self) -> io::Result<()> {
        (**self).shutdown().await
    }
}

#[async_trait]
impl<T: MessageSource + ?Sized> MessageSource for &mut T {
    async fn next_message<'a>(&'a mut self) -> io::Result<InboundMessage<'a>> {
        (**self).next_message().await
    }
}

#[async_trait]
impl<T: MessageSource + ?Sized> MessageSource for Box<T> {
    async fn next_message<'a>(&'a mut self) -> io::Result<InboundMessage<'a>> {
        (**self).next_message().await
    }
}

/// First fatal failure on an outbound half
///
/// Once recorded, every later writer request fails with the same kind and
/// message instead of buffering a message that can never be sent.
#[derive(Debug, Default)]
pub(crate) struct SinkFault(Option<(io::ErrorKind, String)>);

impl SinkFault {
    pub(crate) fn check(&self) -> io::Result<()> {
        match &self.0 {
            Some((kind, message)) => Err(io::Error::new(*kind, message.clone())),
            None => Ok(()),
        }
    }

    /// Keep the first failure; later ones are consequences of it
    pub(crate) fn record(&mut self, err: &io::Error) {
        if self.0.is_none() {
            self.0 = Some((err.kind(), err.to_string()));
        }
    }
}

/// Type-erased outbound half
pub type BoxSink = Box<dyn MessageSink>;

/// Type-erased inbound half
pub type BoxSource = Box<dyn MessageSource>;

/// A full-duplex connection assembled from an inbound and an outbound half
#[derive(Debug)]
pub struct Duplex<R, W> {
    pub source: R,
    pub sink: W,
}

impl<R, W> Duplex<R, W> {
    pub fn new(source: R, sink: W) -> Self {
        Self { source, sink }
    }

    /// Take the halves apart so each can be driven by its own task
    pub fn into_split(self) -> (R, W) {
        (self.source, self.sink)
    }
}

impl<R, W> Duplex<R, W>
where
    R: MessageSource + 'static,
    W: MessageSink + 'static,
{
    /// Erase the concrete halves, e.g. to mix transports in one collection
    pub fn boxed(self) -> Duplex<BoxSource, BoxSink> {
        Duplex {
            source: Box::new(self.source),
            sink: Box::new(self.sink),
        }
    }
}

#[async_trait]
impl<R: Send, W: MessageSink> MessageSink for Duplex<R, W> {
    async fn next_writer<'a>(
        &'a mut self,
        kind: MessageKind,
    ) -> io::Result<Box<dyn MessageWriter + 'a>> {
        self.sink.next_writer(kind).await
    }

    async fn shutdown(&mut self) -> io::Result<()> {
        self.sink.shutdown().await
    }
}

#[async_trait]
impl<R: MessageSource, W: Send> MessageSource for Duplex<R, W> {
    async fn next_message<'a>(&'a mut self) -> io::Result<InboundMessage<'a>> {
        self.source.next_message().await
    }
}
