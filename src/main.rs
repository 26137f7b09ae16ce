mod bridge;
mod config;
mod transport;

use anyhow::{Context, Result};
use clap::Parser;
use config::{ClientConfig, Endpoint};
use textsock_shared::{MessageSink, TextAdapter};
use tokio::io::BufReader;
use transport::{TcpConnector, TransportConnector, WsConnector};

use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries message payloads, so logs go to stderr
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let config = ClientConfig::parse();

    match config.endpoint()? {
        Endpoint::WebSocket(url) => run(WsConnector::new(url), &config).await,
        Endpoint::Framed(address) => run(TcpConnector::new(address), &config).await,
    }
}

async fn run<C: TransportConnector>(connector: C, config: &ClientConfig) -> Result<()> {
    let conn = tokio::time::timeout(config.connect_timeout(), connector.connect())
        .await
        .with_context(|| format!("timed out connecting to {}", config.url))??;
    info!(url = %config.url, transport = connector.name(), "Connected");

    let mut adapter = TextAdapter::new(conn);
    if let Some(limit) = config.max_skipped {
        adapter = adapter.with_skip_limit(limit);
    }
    let (mut reader, mut writer) = adapter.split();

    let mut output = tokio::spawn(async move {
        bridge::pump_output(&mut reader, tokio::io::stdout()).await
    });

    tokio::select! {
        sent = bridge::pump_input(BufReader::new(tokio::io::stdin()), &mut writer) => {
            let sent = sent?;
            info!(sent, "Input closed");
            if let Err(e) = writer.connection_mut().shutdown().await {
                warn!(error = %e, "Failed to close connection");
            }
            // Print replies still in flight until the peer acknowledges the close
            match tokio::time::timeout(config.connect_timeout(), &mut output).await {
                Ok(Ok(Ok(received))) => debug!(received, "Output drained"),
                Ok(Ok(Err(e))) => warn!(error = %e, "Connection failed while closing"),
                Ok(Err(e)) => warn!(error = %e, "Output task failed"),
                Err(_) => {
                    warn!("Peer did not close in time");
                    output.abort();
                }
            }
        }
        received = &mut output => {
            match received? {
                Ok(received) => info!(received, "Server closed connection"),
                Err(e) => warn!(error = %e, "Connection failed"),
            }
        }
    }

    Ok(())
}
