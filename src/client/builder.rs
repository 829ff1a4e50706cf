use super::core::{ConnectionManager, run};
use super::state::ManagerState;
use super::ConnectionStatus;
use crate::infrastructure::Backoff;
use crate::messaging::{Callbacks, EventDispatcher};
use crate::types::{
    ConnectionError, DEFAULT_BASE_DELAY, DEFAULT_CONNECT_TIMEOUT, DEFAULT_MAX_ATTEMPTS,
    DEFAULT_SHOULD_RECONNECT, EVENT_CHANNEL_CAPACITY, InboundFrame, Result, StreamError,
};
use crate::websocket::{Connector, WebSocketConnector};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use url::Url;

/// Consumer-facing reconnection options. Durations are in milliseconds;
/// `None` picks the default.
#[derive(Debug, Clone)]
pub struct ConnectionOptions {
    pub should_reconnect: bool,
    pub max_attempts: Option<u32>,
    pub base_delay: Option<u64>,
    pub connect_timeout: Option<u64>,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            should_reconnect: DEFAULT_SHOULD_RECONNECT,
            max_attempts: None,
            base_delay: None,
            connect_timeout: None,
        }
    }
}

/// Resolved, immutable retry configuration of one manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub should_reconnect: bool,
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub connect_timeout: Duration,
}

impl RetryPolicy {
    /// Wait before automatic retry `attempt` (1-indexed)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        Backoff::delay_for(self.base_delay, attempt)
    }

    pub(crate) fn backoff(&self) -> Backoff {
        Backoff::new(self.base_delay, self.max_attempts)
    }
}

impl From<&ConnectionOptions> for RetryPolicy {
    fn from(options: &ConnectionOptions) -> Self {
        Self {
            should_reconnect: options.should_reconnect,
            max_attempts: options.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS),
            base_delay: Duration::from_millis(options.base_delay.unwrap_or(DEFAULT_BASE_DELAY)),
            connect_timeout: Duration::from_millis(
                options.connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT),
            ),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&ConnectionOptions::default())
    }
}

/// Builder for ConnectionManager that handles initialization
pub struct ConnectionManagerBuilder {
    endpoint: String,
    policy: RetryPolicy,
    connector: Arc<dyn Connector>,
    callbacks: Callbacks,
}

impl ConnectionManagerBuilder {
    /// Create a new builder
    pub fn new(endpoint: impl Into<String>, options: ConnectionOptions) -> Result<Self> {
        let endpoint = endpoint.into();

        // Streaming needs a ws:// or wss:// endpoint
        let url = Url::parse(&endpoint)?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(StreamError::InvalidEndpoint(format!(
                "expected a ws:// or wss:// URL, got scheme '{}'",
                url.scheme()
            )));
        }

        Ok(Self {
            endpoint,
            policy: RetryPolicy::from(&options),
            connector: Arc::new(WebSocketConnector),
            callbacks: Callbacks::default(),
        })
    }

    /// Replace the transport, e.g. with a different WebSocket stack
    pub fn with_connector(mut self, connector: impl Connector) -> Self {
        self.connector = Arc::new(connector);
        self
    }

    pub fn on_open<F>(mut self, callback: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.callbacks = self.callbacks.on_open(callback);
        self
    }

    pub fn on_close<F>(mut self, callback: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.callbacks = self.callbacks.on_close(callback);
        self
    }

    pub fn on_message<F>(mut self, callback: F) -> Self
    where
        F: Fn(&InboundFrame) + Send + Sync + 'static,
    {
        self.callbacks = self.callbacks.on_message(callback);
        self
    }

    pub fn on_error<F>(mut self, callback: F) -> Self
    where
        F: Fn(&ConnectionError) + Send + Sync + 'static,
    {
        self.callbacks = self.callbacks.on_error(callback);
        self
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Build the manager and spawn its task. Must be called inside a tokio
    /// runtime. The manager stays `Idle` until `start()`.
    pub fn build(self) -> ConnectionManager {
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::idle());
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let dispatcher = EventDispatcher::new(status_tx, events_tx.clone(), self.callbacks);
        let machine = ManagerState::new(
            self.endpoint.clone(),
            self.policy,
            self.connector,
            inbox_tx.downgrade(),
            dispatcher,
        );
        tokio::spawn(run(machine, inbox_rx));

        ConnectionManager::from_parts(self.endpoint, inbox_tx, status_rx, events_tx)
    }
}
