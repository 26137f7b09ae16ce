//! Session manager for tracking all connected clients

use super::connection::{SessionHandle, SessionId};
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use textsock_shared::defaults;
use tokio::sync::RwLock;
use tracing::warn;

/// Manages all active client sessions
pub struct SessionManager {
    /// Map of session id -> session handle
    sessions: Arc<RwLock<HashMap<SessionId, SessionHandle>>>,
    next_id: AtomicU64,
    send_timeout: Duration,
}

impl SessionManager {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            next_id: AtomicU64::new(1),
            send_timeout: Duration::from_millis(defaults::SEND_TIMEOUT_MS),
        }
    }

    /// Bound each broadcast delivery; a peer slower than this is dropped
    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    /// Allocate an id for a newly accepted connection
    pub fn next_id(&self) -> SessionId {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    pub async fn register(&self, handle: SessionHandle) {
        let mut sessions = self.sessions.write().await;
        sessions.insert(handle.id, handle);
    }

    pub async fn unregister(&self, id: SessionId) {
        let mut sessions = self.sessions.write().await;
        sessions.remove(&id);
    }

    pub async fn get(&self, id: SessionId) -> Option<SessionHandle> {
        let sessions = self.sessions.read().await;
        sessions.get(&id).cloned()
    }

    /// Send a text message to a specific session
    pub async fn send_to(&self, id: SessionId, data: &[u8]) -> anyhow::Result<usize> {
        let handle = self
            .get(id)
            .await
            .ok_or_else(|| anyhow::anyhow!("Session not connected: {}", id))?;
        Ok(handle.send(data).await?)
    }

    /// Send a text message to every session, returning how many received it
    ///
    /// Deliveries run concurrently. A session that does not accept the
    /// message within the send timeout is unregistered, since a cancelled
    /// send may have left a partial frame on its transport.
    pub async fn broadcast(&self, data: &[u8]) -> usize {
        // Snapshot the handles so a slow peer does not hold the map lock
        let handles: Vec<SessionHandle> = self.sessions.read().await.values().cloned().collect();

        let deliveries = handles.iter().map(|handle| async move {
            (handle, tokio::time::timeout(self.send_timeout, handle.send(data)).await)
        });

        let mut delivered = 0;
        let mut stalled = Vec::new();
        for (handle, outcome) in join_all(deliveries).await {
            match outcome {
                Ok(Ok(_)) => delivered += 1,
                Ok(Err(e)) => {
                    warn!(session = handle.id, addr = %handle.addr, error = %e, "broadcast failed")
                }
                Err(_) => {
                    warn!(
                        session = handle.id,
                        addr = %handle.addr,
                        timeout_ms = self.send_timeout.as_millis() as u64,
                        "dropping stalled session"
                    );
                    stalled.push(handle.id);
                }
            }
        }

        if !stalled.is_empty() {
            let mut sessions = self.sessions.write().await;
            for id in stalled {
                sessions.remove(&id);
            }
        }
        delivered
    }

    /// Ids of all connected sessions, in ascending order
    pub async fn connected_sessions(&self) -> Vec<SessionId> {
        let sessions = self.sessions.read().await;
        let mut ids: Vec<SessionId> = sessions.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Session;
    use std::net::SocketAddr;
    use textsock_shared::{framed, BoxSink, BoxSource, Duplex, TextAdapter};
    use tokio::io::DuplexStream;

    type ClientAdapter = TextAdapter<
        Duplex<
            framed::FramedSource<tokio::io::ReadHalf<DuplexStream>>,
            framed::FramedSink<tokio::io::WriteHalf<DuplexStream>>,
        >,
    >;

    fn pair(manager: &SessionManager) -> (Session, ClientAdapter) {
        let (client_io, server_io) = tokio::io::duplex(1024);
        let conn: Duplex<BoxSource, BoxSink> = framed::connect(server_io).boxed();
        let addr: SocketAddr = "127.0.0.1:40001".parse().expect("addr");
        let session = Session::new(manager.next_id(), addr, conn, None);
        (session, TextAdapter::new(framed::connect(client_io)))
    }

    #[tokio::test]
    async fn test_register_and_unregister() {
        let manager = SessionManager::new();
        let (first, _c1) = pair(&manager);
        let (second, _c2) = pair(&manager);

        manager.register(first.get_handle()).await;
        manager.register(second.get_handle()).await;
        assert_eq!(manager.count().await, 2);
        assert_eq!(
            manager.connected_sessions().await,
            vec![first.id(), second.id()]
        );
        assert!(manager.get(first.id()).await.is_some());

        manager.unregister(first.id()).await;
        assert_eq!(manager.count().await, 1);
        assert!(manager.get(first.id()).await.is_none());
    }

    #[tokio::test]
    async fn test_send_to() {
        let manager = SessionManager::new();
        let (session, mut client) = pair(&manager);
        manager.register(session.get_handle()).await;

        let n = manager.send_to(session.id(), b"direct").await.expect("send");
        assert_eq!(n, 6);
        assert_eq!(client.read().await.expect("read"), b"direct");

        assert!(manager.send_to(999, b"nobody").await.is_err());
    }

    #[tokio::test]
    async fn test_broadcast_reaches_everyone() {
        let manager = SessionManager::new();
        let (first, mut c1) = pair(&manager);
        let (second, mut c2) = pair(&manager);
        manager.register(first.get_handle()).await;
        manager.register(second.get_handle()).await;

        assert_eq!(manager.broadcast(b"all hands").await, 2);
        assert_eq!(c1.read().await.expect("c1"), b"all hands");
        assert_eq!(c2.read().await.expect("c2"), b"all hands");
    }

    #[tokio::test]
    async fn test_broadcast_skips_stalled_peer() {
        let manager = SessionManager::new().with_send_timeout(Duration::from_millis(100));
        let (healthy, mut reader) = pair(&manager);

        // The stalled client never reads, so its 64-byte pipe fills up
        let (stalled_io, server_io) = tokio::io::duplex(64);
        let addr: SocketAddr = "127.0.0.1:40003".parse().expect("addr");
        let stalled = Session::new(manager.next_id(), addr, framed::connect(server_io).boxed(), None);
        let _stalled_io = stalled_io;

        manager.register(healthy.get_handle()).await;
        manager.register(stalled.get_handle()).await;

        let payload = [b'a'; 1000];
        let delivered = tokio::time::timeout(Duration::from_secs(2), manager.broadcast(&payload))
            .await
            .expect("broadcast must not hang on a stalled peer");

        assert_eq!(delivered, 1);
        assert_eq!(reader.read().await.expect("healthy"), payload);
        assert!(manager.get(stalled.id()).await.is_none());
        assert!(manager.get(healthy.id()).await.is_some());
    }
}
