//! textsock shared library
//!
//! This crate provides the text-message adapter and the message connections
//! it runs over, shared by the textsock client and relay server.
//!
//! - [`adapter`]: `write(bytes)` / `read() -> bytes` over text messages
//! - [`connection`]: capability traits a message connection provides
//! - [`ws`]: WebSocket-backed connection (tokio-tungstenite)
//! - [`framed`] and [`codec`]: length-prefixed frames over any byte stream

pub mod adapter;
pub mod codec;
pub mod connection;
pub mod framed;
pub mod ws;

pub use adapter::{AdapterError, TextAdapter};
pub use connection::{
    BoxSink, BoxSource, Duplex, InboundMessage, MessageKind, MessageSink, MessageSource,
    MessageWriter,
};

/// Default listen/connect parameters shared by client and server
pub mod defaults {
    /// Default server port
    pub const PORT: u16 = 8080;

    /// Default client connect timeout in seconds
    pub const CONNECT_TIMEOUT_SECS: u64 = 5;

    /// Default server timeout for delivering one relayed message, in milliseconds
    pub const SEND_TIMEOUT_MS: u64 = 5_000;
}
