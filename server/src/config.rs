//! Command-line configuration for the relay server

use clap::{Parser, ValueEnum};
use std::time::Duration;
use textsock_shared::defaults;

/// Wire protocol spoken by accepted connections
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Protocol {
    /// WebSocket text/binary messages
    Ws,
    /// Length-prefixed frames over raw TCP
    Framed,
}

/// What the server does with each text message it reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RelayMode {
    /// Send the message back to the session it came from
    Echo,
    /// Send the message to every connected session
    Broadcast,
}

#[derive(Debug, Clone, Parser)]
#[command(name = "textsock-server", about = "Relay text messages between socket clients")]
pub struct ServerConfig {
    /// Address to listen on
    #[arg(long, default_value_t = format!("0.0.0.0:{}", defaults::PORT))]
    pub listen: String,

    #[arg(long, value_enum, default_value_t = Protocol::Ws)]
    pub protocol: Protocol,

    #[arg(long, value_enum, default_value_t = RelayMode::Echo)]
    pub mode: RelayMode,

    /// Drop a session after this many consecutive non-text messages
    #[arg(long)]
    pub max_skipped: Option<usize>,

    /// Drop a session that takes longer than this to accept a broadcast
    #[arg(long, default_value_t = defaults::SEND_TIMEOUT_MS)]
    pub send_timeout_ms: u64,
}

impl ServerConfig {
    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: format!("0.0.0.0:{}", defaults::PORT),
            protocol: Protocol::Ws,
            mode: RelayMode::Echo,
            max_skipped: None,
            send_timeout_ms: defaults::SEND_TIMEOUT_MS,
        }
    }
}
