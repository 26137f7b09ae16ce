//! Transport trait abstraction for pluggable message connections

use anyhow::Result;
use async_trait::async_trait;
use textsock_shared::{Duplex, MessageSink, MessageSource};

/// Factory for creating message connections
#[async_trait]
pub trait TransportConnector: Send + Sync {
    /// Inbound half of the connections this connector produces
    type Source: MessageSource + 'static;
    /// Outbound half of the connections this connector produces
    type Sink: MessageSink + 'static;

    /// Attempt to connect, returning an open connection on success
    async fn connect(&self) -> Result<Duplex<Self::Source, Self::Sink>>;

    /// Human-readable name for this transport
    fn name(&self) -> &'static str;
}
