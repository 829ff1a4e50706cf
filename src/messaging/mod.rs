// Messaging module - Lifecycle events and their delivery
mod dispatcher;
pub mod event;

pub(crate) use dispatcher::EventDispatcher;
pub use event::{Callbacks, ConnectionEvent};
