pub mod constants;
pub mod error;
pub mod message;

pub use constants::*;
pub use error::{ConnectionError, Result, StreamError};
pub use message::{InboundFrame, OutboundFrame};
