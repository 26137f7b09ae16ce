//! WebSocket transport

use crate::transport::traits::TransportConnector;
use anyhow::{Context, Result};
use async_trait::async_trait;
use textsock_shared::ws::{self, WsSink, WsSource};
use textsock_shared::Duplex;
use tokio::net::TcpStream;
use tokio_tungstenite::MaybeTlsStream;
use tracing::debug;

type WsStream = MaybeTlsStream<TcpStream>;

/// WebSocket connector for a `ws://` URL
pub struct WsConnector {
    url: String,
}

impl WsConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl TransportConnector for WsConnector {
    type Source = WsSource<WsStream>;
    type Sink = WsSink<WsStream>;

    async fn connect(&self) -> Result<Duplex<Self::Source, Self::Sink>> {
        let (stream, response) = tokio_tungstenite::connect_async(self.url.as_str())
            .await
            .with_context(|| format!("websocket handshake with {} failed", self.url))?;
        debug!(status = %response.status(), "websocket handshake complete");
        Ok(ws::split(stream))
    }

    fn name(&self) -> &'static str {
        "WebSocket"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use textsock_shared::TextAdapter;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_connects_to_websocket_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");

        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.expect("accept");
            let stream = tokio_tungstenite::accept_async(socket)
                .await
                .expect("handshake");
            let mut adapter = TextAdapter::new(ws::split(stream));
            let line = adapter.read().await.expect("read");
            adapter.write(&line).await.expect("write");
        });

        let connector = WsConnector::new(format!("ws://{addr}/"));
        assert_eq!(connector.name(), "WebSocket");

        let mut adapter = TextAdapter::new(connector.connect().await.expect("connect"));
        adapter.write(b"over websocket").await.expect("write");
        assert_eq!(adapter.read().await.expect("read"), b"over websocket");
        server.await.expect("server");
    }
}
