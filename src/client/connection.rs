use crate::types::{ConnectionError, InboundFrame};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Never started
    Idle,
    Connecting,
    Open,
    Closing,
    Closed,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closing => "closing",
            Self::Closed => "closed",
        }
    }

    /// Whether a physical connection attempt is in flight or established
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Connecting | Self::Open)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of everything a consumer renders about the stream.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    /// Why the stream is not connected, if known
    pub last_error: Option<ConnectionError>,
    pub last_message: Option<InboundFrame>,
    /// Automatic retries used since the last successful open or manual reconnect
    pub retry_attempt: u32,
    /// Frames waiting for the next open
    pub queued: usize,
}

impl ConnectionStatus {
    pub fn idle() -> Self {
        Self {
            state: ConnectionState::Idle,
            last_error: None,
            last_message: None,
            retry_attempt: 0,
            queued: 0,
        }
    }

    /// Whether `send` transmits immediately instead of queueing
    pub fn is_usable(&self) -> bool {
        self.state == ConnectionState::Open
    }

    pub fn has_given_up(&self) -> bool {
        matches!(
            self.last_error,
            Some(ConnectionError::RetriesExhausted { .. })
        )
    }
}

impl Default for ConnectionStatus {
    fn default() -> Self {
        Self::idle()
    }
}
