// Module declarations
mod builder;
mod connection;
mod core;
mod state;

// Public API exports
pub use builder::{ConnectionManagerBuilder, ConnectionOptions, RetryPolicy};
pub use connection::{ConnectionState, ConnectionStatus};
pub use core::ConnectionManager;
pub(crate) use state::{Command, Input};
