// Infrastructure module - Core background services and utilities
pub mod http;
pub mod task_manager;
pub mod timer;

pub use http::{ResourceClient, ws_to_http_endpoint};
pub use task_manager::TaskManager;
pub use timer::Backoff;
pub(crate) use timer::ScheduledTimer;
