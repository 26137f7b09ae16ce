pub mod tcp;
pub mod traits;
pub mod ws;

pub use tcp::TcpConnector;
pub use traits::TransportConnector;
pub use ws::WsConnector;
