//! Per-session relay loop

use crate::config::RelayMode;
use crate::session::{Session, SessionManager};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Read text messages from a registered session until it fails, relaying
/// each one according to `mode`. Unregisters the session on exit.
pub async fn run_session(mut session: Session, manager: Arc<SessionManager>, mode: RelayMode) {
    let id = session.id();
    let addr = session.addr();

    loop {
        let message = match session.recv().await {
            Ok(message) => message,
            Err(e) => {
                info!(session = id, %addr, reason = %e, "session ended");
                break;
            }
        };
        debug!(session = id, len = message.len(), "received text message");

        match mode {
            RelayMode::Echo => {
                if let Err(e) = manager.send_to(id, &message).await {
                    warn!(session = id, %addr, error = %e, "echo failed");
                    break;
                }
            }
            RelayMode::Broadcast => {
                let delivered = manager.broadcast(&message).await;
                debug!(session = id, delivered, "broadcast message");
            }
        }
    }

    manager.unregister(id).await;
    let remaining = manager.count().await;
    let uptime = session.handle.connected_at.elapsed();
    info!(
        session = id,
        %addr,
        uptime_ms = uptime.as_millis() as u64,
        remaining,
        "session closed"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use std::time::Duration;
    use textsock_shared::{framed, MessageKind, MessageSink, MessageWriter, TextAdapter};

    fn addr() -> SocketAddr {
        "127.0.0.1:40002".parse().expect("addr")
    }

    #[tokio::test]
    async fn test_echo_mode() {
        let manager = Arc::new(SessionManager::new());
        let (client_io, server_io) = tokio::io::duplex(1024);
        let session = Session::new(manager.next_id(), addr(), framed::connect(server_io).boxed(), None);
        manager.register(session.get_handle()).await;
        let task = tokio::spawn(run_session(session, manager.clone(), RelayMode::Echo));

        let mut client = framed::connect(client_io);
        let mut writer = client.next_writer(MessageKind::Binary).await.expect("writer");
        writer.write(b"ignored").await.expect("write");
        writer.close().await.expect("close");
        drop(writer);

        let mut adapter = TextAdapter::new(client);
        adapter.write(b"ping").await.expect("write");
        assert_eq!(adapter.read().await.expect("echo"), b"ping");

        drop(adapter);
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("session should end")
            .expect("task");
        assert_eq!(manager.count().await, 0);
    }

    #[tokio::test]
    async fn test_broadcast_mode() {
        let manager = Arc::new(SessionManager::new());
        let mut clients = Vec::new();
        let mut tasks = Vec::new();

        for _ in 0..2 {
            let (client_io, server_io) = tokio::io::duplex(1024);
            let session =
                Session::new(manager.next_id(), addr(), framed::connect(server_io).boxed(), None);
            manager.register(session.get_handle()).await;
            tasks.push(tokio::spawn(run_session(
                session,
                manager.clone(),
                RelayMode::Broadcast,
            )));
            clients.push(TextAdapter::new(framed::connect(client_io)));
        }

        clients[0].write(b"hello all").await.expect("write");
        for client in clients.iter_mut() {
            assert_eq!(client.read().await.expect("read"), b"hello all");
        }

        drop(clients);
        for task in tasks {
            tokio::time::timeout(Duration::from_secs(5), task)
                .await
                .expect("session should end")
                .expect("task");
        }
        assert_eq!(manager.count().await, 0);
    }
}
