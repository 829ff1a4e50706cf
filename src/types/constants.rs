/// Inbound alarm feed event strings (magic strings layer)
pub mod feed_events {
    pub const ALARM_CREATED: &str = "alarm_created";
    pub const ALARM_UPDATED: &str = "alarm_updated";
    pub const ALARM_RESOLVED: &str = "alarm_resolved";
}

/// Outbound action strings
pub mod feed_actions {
    pub const PING: &str = "ping";
    pub const ACKNOWLEDGE: &str = "acknowledge";
}

/// Default for automatic reconnection after an unexpected close
pub const DEFAULT_SHOULD_RECONNECT: bool = true;

/// Default cap on consecutive automatic retries
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default seed delay for exponential backoff (milliseconds)
pub const DEFAULT_BASE_DELAY: u64 = 1000;

/// Default per-attempt connect budget (milliseconds)
pub const DEFAULT_CONNECT_TIMEOUT: u64 = 10000;

/// Capacity of the lifecycle event broadcast channel
pub const EVENT_CHANNEL_CAPACITY: usize = 100;

/// Default page size for paginated resources
pub const DEFAULT_PAGE_LIMIT: u32 = 10;
