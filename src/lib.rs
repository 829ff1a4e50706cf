//! # Alarm Feed
//!
//! Client for a real-time alarm feed delivered over a single WebSocket stream.
//!
//! The core is [`ConnectionManager`], which keeps one logical connection alive:
//! it reconnects with exponential backoff, bounds each attempt with a connect
//! timeout, queues outbound frames until the connection opens, and ignores
//! events from attempts it has already abandoned.
//!
//! ## Example
//!
//! ```no_run
//! use alarm_feed::{AlarmBoard, AlarmEvent, ConnectionEvent, ConnectionManager, ConnectionOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let manager = ConnectionManager::new(
//!         "wss://monitor.example.com/alarms",
//!         ConnectionOptions::default(),
//!     )?;
//!     let mut events = manager.subscribe();
//!     manager.start();
//!
//!     let mut board = AlarmBoard::new();
//!     while let Ok(event) = events.recv().await {
//!         if let ConnectionEvent::Message(frame) = event {
//!             board.apply(&AlarmEvent::from_frame(&frame)?);
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod alarm;
pub mod client;
pub mod infrastructure;
pub mod messaging;
pub mod pagination;
pub mod types;
pub mod websocket;

pub use alarm::{Alarm, AlarmBoard, AlarmEvent, AlarmSeverity};
pub use client::{
    ConnectionManager, ConnectionManagerBuilder, ConnectionOptions, ConnectionState,
    ConnectionStatus, RetryPolicy,
};
pub use infrastructure::ResourceClient;
pub use messaging::{Callbacks, ConnectionEvent};
pub use pagination::{Page, PageMeta, PageQuery};
pub use types::{ConnectionError, InboundFrame, OutboundFrame, Result, StreamError};
pub use websocket::{Connector, WebSocketConnector};
