//! Command-line configuration for the line client

use anyhow::{bail, Result};
use clap::Parser;
use std::time::Duration;
use textsock_shared::defaults;

#[derive(Debug, Clone, Parser)]
#[command(name = "textsock", about = "Send stdin lines as text messages and print the replies")]
pub struct ClientConfig {
    /// Server to connect to: ws://host:port/path or tcp://host:port
    #[arg(long, default_value_t = format!("ws://127.0.0.1:{}", defaults::PORT))]
    pub url: String,

    #[arg(long, default_value_t = defaults::CONNECT_TIMEOUT_SECS)]
    pub connect_timeout_secs: u64,

    /// Give up on a read after this many consecutive non-text messages
    #[arg(long)]
    pub max_skipped: Option<usize>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: format!("ws://127.0.0.1:{}", defaults::PORT),
            connect_timeout_secs: defaults::CONNECT_TIMEOUT_SECS,
            max_skipped: None,
        }
    }
}

impl ClientConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn endpoint(&self) -> Result<Endpoint> {
        Endpoint::parse(&self.url)
    }
}

/// Where and how to connect
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// WebSocket URL, passed to the handshake as-is
    WebSocket(String),
    /// host:port of a framed TCP server
    Framed(String),
}

impl Endpoint {
    pub fn parse(url: &str) -> Result<Self> {
        if url.starts_with("ws://") {
            return Ok(Endpoint::WebSocket(url.to_string()));
        }
        if let Some(address) = url.strip_prefix("tcp://") {
            if address.is_empty() {
                bail!("missing address in {url}");
            }
            return Ok(Endpoint::Framed(address.to_string()));
        }
        bail!("unsupported url {url}: expected ws:// or tcp://")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_parsing() {
        assert_eq!(
            Endpoint::parse("ws://localhost:8080/term").unwrap(),
            Endpoint::WebSocket("ws://localhost:8080/term".into())
        );
        assert_eq!(
            Endpoint::parse("tcp://10.0.0.1:9000").unwrap(),
            Endpoint::Framed("10.0.0.1:9000".into())
        );
        assert!(Endpoint::parse("tcp://").is_err());
        assert!(Endpoint::parse("wss://secure.example").is_err());
        assert!(Endpoint::parse("http://localhost").is_err());
    }

    #[test]
    fn test_default_config() {
        let config = ClientConfig::parse_from(["textsock"]);
        assert_eq!(config.url, ClientConfig::default().url);
        assert_eq!(config.connect_timeout(), Duration::from_secs(5));
        assert_eq!(config.max_skipped, None);
        assert!(matches!(config.endpoint(), Ok(Endpoint::WebSocket(_))));
    }
}
