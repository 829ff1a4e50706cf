use crate::types::{ConnectionError, InboundFrame};
use std::sync::Arc;

/// Lifecycle notifications pushed to subscribers of a `ConnectionManager`.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    /// The connection reached `Open` and the outbound queue was flushed
    Opened,
    /// The current connection went away
    Closed,
    /// A well-formed inbound frame
    Message(InboundFrame),
    /// Any failure; see [`ConnectionError`]
    Error(ConnectionError),
}

impl ConnectionEvent {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Opened => "open",
            Self::Closed => "close",
            Self::Message(_) => "message",
            Self::Error(_) => "error",
        }
    }
}

type Notify = Arc<dyn Fn() + Send + Sync + 'static>;
type FrameCallback = Arc<dyn Fn(&InboundFrame) + Send + Sync + 'static>;
type ErrorCallback = Arc<dyn Fn(&ConnectionError) + Send + Sync + 'static>;

/// Optional lifecycle callbacks.
///
/// Callbacks run inline on the connection manager task, so they must return
/// quickly and must not block.
#[derive(Clone, Default)]
pub struct Callbacks {
    on_open: Option<Notify>,
    on_close: Option<Notify>,
    on_message: Option<FrameCallback>,
    on_error: Option<ErrorCallback>,
}

impl Callbacks {
    pub fn on_open<F>(mut self, callback: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_open = Some(Arc::new(callback));
        self
    }

    pub fn on_close<F>(mut self, callback: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_close = Some(Arc::new(callback));
        self
    }

    pub fn on_message<F>(mut self, callback: F) -> Self
    where
        F: Fn(&InboundFrame) + Send + Sync + 'static,
    {
        self.on_message = Some(Arc::new(callback));
        self
    }

    pub fn on_error<F>(mut self, callback: F) -> Self
    where
        F: Fn(&ConnectionError) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(callback));
        self
    }

    pub(crate) fn trigger(&self, event: &ConnectionEvent) {
        match event {
            ConnectionEvent::Opened => {
                if let Some(callback) = &self.on_open {
                    callback();
                }
            }
            ConnectionEvent::Closed => {
                if let Some(callback) = &self.on_close {
                    callback();
                }
            }
            ConnectionEvent::Message(frame) => {
                if let Some(callback) = &self.on_message {
                    callback(frame);
                }
            }
            ConnectionEvent::Error(error) => {
                if let Some(callback) = &self.on_error {
                    callback(error);
                }
            }
        }
    }
}

impl std::fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Callbacks")
            .field("on_open", &self.on_open.is_some())
            .field("on_close", &self.on_close.is_some())
            .field("on_message", &self.on_message.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}
