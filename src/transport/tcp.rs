//! Framed TCP transport for servers speaking length-prefixed frames

use crate::transport::traits::TransportConnector;
use anyhow::{Context, Result};
use async_trait::async_trait;
use textsock_shared::framed::{FramedSink, FramedSource};
use textsock_shared::Duplex;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

/// TCP connector for connecting to a framed server address
pub struct TcpConnector {
    address: String,
}

impl TcpConnector {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }
}

#[async_trait]
impl TransportConnector for TcpConnector {
    type Source = FramedSource<OwnedReadHalf>;
    type Sink = FramedSink<OwnedWriteHalf>;

    async fn connect(&self) -> Result<Duplex<Self::Source, Self::Sink>> {
        let stream = TcpStream::connect(&self.address)
            .await
            .with_context(|| format!("failed to connect to {}", self.address))?;
        stream.set_nodelay(true)?;
        let (reader, writer) = stream.into_split();
        Ok(Duplex::new(FramedSource::new(reader), FramedSink::new(writer)))
    }

    fn name(&self) -> &'static str {
        "TCP"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use textsock_shared::{framed, TextAdapter};
    use tokio::net::TcpListener;

    #[test]
    fn test_tcp_connector_name() {
        assert_eq!(TcpConnector::new("127.0.0.1:9000").name(), "TCP");
    }

    #[tokio::test]
    async fn test_connects_to_framed_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");

        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.expect("accept");
            let mut adapter = TextAdapter::new(framed::connect(socket));
            let line = adapter.read().await.expect("read");
            adapter.write(&line).await.expect("write");
        });

        let conn = TcpConnector::new(addr.to_string())
            .connect()
            .await
            .expect("connect");
        let mut adapter = TextAdapter::new(conn);
        adapter.write(b"over tcp").await.expect("write");
        assert_eq!(adapter.read().await.expect("read"), b"over tcp");
        server.await.expect("server");
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        drop(listener);

        assert!(TcpConnector::new(addr.to_string()).connect().await.is_err());
    }
}
