//! Message connection over a WebSocket stream (tokio-tungstenite)
//!
//! Text and binary data messages map one-to-one onto [`MessageKind`]s.
//! Ping/pong replies are handled by tungstenite itself; control frames are
//! never surfaced. A close frame from the peer ends the inbound side with a
//! `ConnectionAborted` error.

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use std::io;
use std::io::Cursor;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::tungstenite::error::ProtocolError;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, trace};

use crate::connection::{
    Duplex, InboundMessage, MessageKind, MessageSink, MessageSource, MessageWriter, SinkFault,
};

/// Split an established WebSocket into a message connection
pub fn split<S>(stream: WebSocketStream<S>) -> Duplex<WsSource<S>, WsSink<S>>
where
    S: AsyncRead + AsyncWrite + Send + Unpin,
{
    let (sink, stream) = stream.split();
    Duplex::new(
        WsSource { stream },
        WsSink {
            sink,
            fault: SinkFault::default(),
        },
    )
}

/// Map a tungstenite failure onto the closest `io::ErrorKind`
///
/// A peer that drops the socket without a close frame is a reset, not a
/// protocol violation.
pub fn into_io_error(err: WsError) -> io::Error {
    match err {
        WsError::Io(e) => e,
        WsError::ConnectionClosed
        | WsError::AlreadyClosed
        | WsError::Protocol(ProtocolError::SendAfterClosing) => {
            io::Error::new(io::ErrorKind::ConnectionAborted, err)
        }
        WsError::Protocol(ProtocolError::ResetWithoutClosingHandshake) => {
            io::Error::new(io::ErrorKind::ConnectionReset, err)
        }
        WsError::Protocol(_) | WsError::Capacity(_) => io::Error::new(io::ErrorKind::InvalidData, err),
        other => io::Error::other(other),
    }
}

fn closed_by_peer(frame: Option<CloseFrame<'static>>) -> io::Error {
    let reason = match frame {
        Some(frame) => format!(
            "websocket closed by peer (code {}: {})",
            u16::from(frame.code),
            frame.reason
        ),
        None => "websocket closed by peer".to_string(),
    };
    io::Error::new(io::ErrorKind::ConnectionAborted, reason)
}

/// Inbound half of a WebSocket connection
pub struct WsSource<S> {
    stream: SplitStream<WebSocketStream<S>>,
}

#[async_trait]
impl<S> MessageSource for WsSource<S>
where
    S: AsyncRead + AsyncWrite + Send + Unpin,
{
    async fn next_message<'a>(&'a mut self) -> io::Result<InboundMessage<'a>> {
        loop {
            let message = match self.stream.next().await {
                Some(result) => result.map_err(into_io_error)?,
                None => {
                    return Err(io::Error::new(
                        io::ErrorKind::ConnectionAborted,
                        "websocket stream ended",
                    ))
                }
            };

            let (kind, payload) = match message {
                Message::Text(text) => (MessageKind::Text, Bytes::from(text)),
                Message::Binary(data) => (MessageKind::Binary, Bytes::from(data)),
                Message::Close(frame) => {
                    debug!(?frame, "received close frame");
                    return Err(closed_by_peer(frame));
                }
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {
                    trace!("skipping control frame");
                    continue;
                }
            };

            return Ok(InboundMessage {
                kind,
                reader: Box::new(Cursor::new(payload)),
            });
        }
    }
}

/// Outbound half of a WebSocket connection
///
/// After a failed send or a close frame, no further writers are handed out.
pub struct WsSink<S> {
    sink: SplitSink<WebSocketStream<S>, Message>,
    fault: SinkFault,
}

#[async_trait]
impl<S> MessageSink for WsSink<S>
where
    S: AsyncRead + AsyncWrite + Send + Unpin,
{
    async fn next_writer<'a>(
        &'a mut self,
        kind: MessageKind,
    ) -> io::Result<Box<dyn MessageWriter + 'a>> {
        self.fault.check()?;
        Ok(Box::new(WsMessageWriter {
            sink: &mut self.sink,
            fault: &mut self.fault,
            kind,
            payload: BytesMut::new(),
            closed: false,
        }))
    }

    /// Send a close frame and flush it
    async fn shutdown(&mut self) -> io::Result<()> {
        let result = self.sink.close().await.map_err(into_io_error);
        if let Err(e) = &result {
            self.fault.record(e);
        }
        self.fault.record(&io::Error::new(
            io::ErrorKind::ConnectionAborted,
            "websocket close frame already sent",
        ));
        debug!("sent close frame");
        result
    }
}

struct WsMessageWriter<'a, S> {
    sink: &'a mut SplitSink<WebSocketStream<S>, Message>,
    fault: &'a mut SinkFault,
    kind: MessageKind,
    payload: BytesMut,
    closed: bool,
}

#[async_trait]
impl<'w, S> MessageWriter for WsMessageWriter<'w, S>
where
    S: AsyncRead + AsyncWrite + Send + Unpin,
{
    async fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.closed {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "message already closed",
            ));
        }
        self.payload.extend_from_slice(buf);
        Ok(buf.len())
    }

    async fn close(&mut self) -> io::Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let payload = self.payload.split().to_vec();
        let len = payload.len();
        let message = match self.kind {
            MessageKind::Text => {
                let text = String::from_utf8(payload)
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
                Message::Text(text)
            }
            MessageKind::Binary => Message::Binary(payload),
        };

        if let Err(e) = self.sink.send(message).await.map_err(into_io_error) {
            self.fault.record(&e);
            return Err(e);
        }
        trace!(kind = %self.kind, len, "sent websocket message");
        Ok(())
    }
}
