use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::constants::feed_actions;

/// A frame received from the streaming endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InboundFrame {
    pub event: String,
    #[serde(default)]
    pub data: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl InboundFrame {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
            extra: Map::new(),
        }
    }

    /// Parse a text frame. Anything that is not a JSON object with an `event`
    /// string is rejected.
    pub fn parse(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

/// A frame sent to the streaming endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutboundFrame {
    pub action: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl OutboundFrame {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            fields: Map::new(),
        }
    }

    pub fn ping() -> Self {
        Self::new(feed_actions::PING)
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }
}
