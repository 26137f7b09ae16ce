//! Individual client session handling

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use textsock_shared::{AdapterError, BoxSink, BoxSource, Duplex, TextAdapter};
use tokio::sync::Mutex;

pub type SessionId = u64;

/// Handle to send text messages to a specific session
///
/// Clones share one writer; the mutex serializes concurrent senders so each
/// message goes out whole.
#[derive(Clone)]
pub struct SessionHandle {
    pub id: SessionId,
    pub addr: SocketAddr,
    pub connected_at: Instant,
    writer: Arc<Mutex<TextAdapter<BoxSink>>>,
}

impl SessionHandle {
    /// Send one text message to this session
    pub async fn send(&self, data: &[u8]) -> Result<usize, AdapterError> {
        let mut writer = self.writer.lock().await;
        writer.write(data).await
    }
}

/// Active client session: the read side plus a handle to the write side
pub struct Session {
    pub handle: SessionHandle,
    reader: TextAdapter<BoxSource>,
}

impl Session {
    pub fn new(
        id: SessionId,
        addr: SocketAddr,
        conn: Duplex<BoxSource, BoxSink>,
        skip_limit: Option<usize>,
    ) -> Self {
        let mut adapter = TextAdapter::new(conn);
        if let Some(limit) = skip_limit {
            adapter = adapter.with_skip_limit(limit);
        }
        let (reader, writer) = adapter.split();

        let handle = SessionHandle {
            id,
            addr,
            connected_at: Instant::now(),
            writer: Arc::new(Mutex::new(writer)),
        };

        Self { handle, reader }
    }

    /// Get a cloneable handle for sending messages
    pub fn get_handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    /// Read the next text message from this session
    pub async fn recv(&mut self) -> Result<Vec<u8>, AdapterError> {
        self.reader.read().await
    }

    pub fn id(&self) -> SessionId {
        self.handle.id
    }

    pub fn addr(&self) -> SocketAddr {
        self.handle.addr
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use textsock_shared::{framed, MessageKind, MessageSink, MessageWriter};

    fn test_addr() -> SocketAddr {
        "127.0.0.1:40000".parse().expect("addr")
    }

    #[tokio::test]
    async fn test_session_send_and_recv() {
        let (client_io, server_io) = tokio::io::duplex(1024);
        let mut session = Session::new(7, test_addr(), framed::connect(server_io).boxed(), None);
        let mut client = TextAdapter::new(framed::connect(client_io));

        assert_eq!(session.id(), 7);
        assert_eq!(session.addr(), test_addr());

        client.write(b"from client").await.expect("client write");
        assert_eq!(session.recv().await.expect("recv"), b"from client");

        session.get_handle().send(b"from server").await.expect("send");
        assert_eq!(client.read().await.expect("client read"), b"from server");
    }

    #[tokio::test]
    async fn test_session_skip_limit() {
        let (client_io, server_io) = tokio::io::duplex(1024);
        let mut session = Session::new(1, test_addr(), framed::connect(server_io).boxed(), Some(0));
        let mut client = framed::connect(client_io);

        let mut writer = client
            .next_writer(MessageKind::Binary)
            .await
            .expect("writer");
        writer.write(b"X").await.expect("write");
        writer.close().await.expect("close");

        let err = session.recv().await.expect_err("limit");
        assert!(matches!(err, AdapterError::SkipLimitExceeded { skipped: 1 }));
    }
}
