mod config;
mod relay;
mod session;

use anyhow::Context;
use clap::Parser;
use config::{Protocol, ServerConfig};
use session::{Session, SessionManager};
use std::net::SocketAddr;
use std::sync::Arc;
use textsock_shared::{framed, ws, BoxSink, BoxSource, Duplex};
use tokio::net::{TcpListener, TcpStream};

use tracing::{debug, error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let config = ServerConfig::parse();

    let listener = TcpListener::bind(&config.listen)
        .await
        .with_context(|| format!("failed to bind {}", config.listen))?;
    info!(
        listen = %config.listen,
        protocol = ?config.protocol,
        mode = ?config.mode,
        max_skipped = ?config.max_skipped,
        send_timeout_ms = config.send_timeout_ms,
        "Server listening"
    );

    let manager = Arc::new(SessionManager::new().with_send_timeout(config.send_timeout()));

    loop {
        let (socket, addr) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                error!(error = %e, "accept failed");
                continue;
            }
        };
        info!(%addr, "Connection from");

        let manager = manager.clone();
        let config = config.clone();
        tokio::spawn(async move {
            if let Err(e) = serve_connection(socket, addr, &config, manager).await {
                warn!(%addr, error = %e, "connection setup failed");
            }
        });
    }
}

async fn serve_connection(
    socket: TcpStream,
    addr: SocketAddr,
    config: &ServerConfig,
    manager: Arc<SessionManager>,
) -> anyhow::Result<()> {
    let conn = open_connection(socket, config.protocol).await?;
    let session = Session::new(manager.next_id(), addr, conn, config.max_skipped);
    manager.register(session.get_handle()).await;
    let active = manager.connected_sessions().await;
    info!(session = session.id(), %addr, total = active.len(), "session registered");
    debug!(sessions = ?active, "active sessions");

    relay::run_session(session, manager, config.mode).await;
    Ok(())
}

async fn open_connection(
    socket: TcpStream,
    protocol: Protocol,
) -> anyhow::Result<Duplex<BoxSource, BoxSink>> {
    match protocol {
        Protocol::Ws => {
            let stream = tokio_tungstenite::accept_async(socket)
                .await
                .context("websocket handshake failed")?;
            Ok(ws::split(stream).boxed())
        }
        Protocol::Framed => Ok(framed::connect(socket).boxed()),
    }
}
