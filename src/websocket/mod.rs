// WebSocket module - Transport seam and the tokio-tungstenite implementation
mod connector;
mod factory;
mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use connector::WebSocketConnector;
pub use factory::{WebSocketFactory, WsStream};
pub use transport::{Connector, TransportEvent, TransportEvents, TransportHandle};
