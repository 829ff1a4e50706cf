use std::time::Duration;
use thiserror::Error;

/// Errors returned from fallible calls into the crate.
#[derive(Error, Debug)]
pub enum StreamError {
    /// WebSocket protocol error (handshake failed, invalid frame, etc.)
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    /// General connection error with descriptive message
    #[error("Connection error: {0}")]
    Connection(String),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP request error (paginated resource calls)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// URL parsing error (malformed endpoint URL)
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// Endpoint parsed but is not usable for streaming
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// The connection manager task is no longer running
    #[error("Connection manager has shut down")]
    ManagerClosed,
}

/// Convenience type alias for `Result<T, StreamError>`.
pub type Result<T> = std::result::Result<T, StreamError>;

/// Failures observed on the stream, surfaced to consumers through the status
/// watch, the event broadcast and the `on_error` callback.
///
/// None of these are fatal. Only [`ConnectionError::RetriesExhausted`] stays put
/// until the consumer calls `start()` or `reconnect()`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// The attempt did not reach `Open` within the connect timeout
    #[error("connection attempt timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// The underlying transport reported an error
    #[error("transport error: {0}")]
    Transport(String),

    /// Automatic backoff used up every attempt without reaching `Open`
    #[error("gave up reconnecting after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },

    /// An inbound frame could not be parsed; the connection is unaffected
    #[error("malformed inbound message: {0}")]
    MalformedMessage(String),

    /// A frame could not be handed to the open transport
    #[error("failed to send message: {0}")]
    SendFailed(String),
}

impl ConnectionError {
    /// Whether this error is recorded as the connection's last error.
    ///
    /// Parse and send failures are reported but never replace the reason the
    /// stream is down.
    pub fn is_connection_level(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_) | Self::Transport(_) | Self::RetriesExhausted { .. }
        )
    }
}
