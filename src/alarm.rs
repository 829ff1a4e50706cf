//! Alarm feed vocabulary carried over the stream.
//!
//! Inbound `alarm_*` frames decode into [`AlarmEvent`]s. An [`AlarmBoard`] folds
//! them into the list the dashboard renders. The board falls back to
//! [`AlarmEvent::canned`] data while the stream is unavailable.

use crate::types::constants::{feed_actions, feed_events};
use crate::types::{InboundFrame, OutboundFrame};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlarmSeverity {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alarm {
    pub id: String,
    pub site_id: String,
    pub severity: AlarmSeverity,
    pub message: String,
    pub raised_at: DateTime<Utc>,
    #[serde(default)]
    pub acknowledged: bool,
}

/// Typed view of an inbound frame
#[derive(Debug, Clone, PartialEq)]
pub enum AlarmEvent {
    Created(Alarm),
    Updated(Alarm),
    Resolved(Alarm),
    /// Any event this crate does not model
    Other(InboundFrame),
}

impl AlarmEvent {
    /// Decode a frame; an `alarm_*` event whose data is not an alarm is an error
    pub fn from_frame(frame: &InboundFrame) -> serde_json::Result<Self> {
        let decode = || serde_json::from_value::<Alarm>(frame.data.clone());
        Ok(match frame.event.as_str() {
            feed_events::ALARM_CREATED => Self::Created(decode()?),
            feed_events::ALARM_UPDATED => Self::Updated(decode()?),
            feed_events::ALARM_RESOLVED => Self::Resolved(decode()?),
            _ => Self::Other(frame.clone()),
        })
    }

    pub fn alarm(&self) -> Option<&Alarm> {
        match self {
            Self::Created(alarm) | Self::Updated(alarm) | Self::Resolved(alarm) => Some(alarm),
            Self::Other(_) => None,
        }
    }

    /// Static alarms shown when the stream cannot be reached
    pub fn canned() -> Vec<Alarm> {
        let at = |secs: i64| DateTime::from_timestamp(secs, 0).unwrap_or_default();
        vec![
            Alarm {
                id: "canned-1".to_string(),
                site_id: "site-north".to_string(),
                severity: AlarmSeverity::Critical,
                message: "Generator offline".to_string(),
                raised_at: at(1_704_096_000),
                acknowledged: false,
            },
            Alarm {
                id: "canned-2".to_string(),
                site_id: "site-east".to_string(),
                severity: AlarmSeverity::Warning,
                message: "Battery below 30%".to_string(),
                raised_at: at(1_704_099_600),
                acknowledged: false,
            },
            Alarm {
                id: "canned-3".to_string(),
                site_id: "site-west".to_string(),
                severity: AlarmSeverity::Info,
                message: "Scheduled maintenance window".to_string(),
                raised_at: at(1_704_103_200),
                acknowledged: true,
            },
        ]
    }
}

/// Outbound frame acknowledging an alarm at `at`
pub fn acknowledge(alarm_id: &str, at: DateTime<Utc>) -> OutboundFrame {
    OutboundFrame::new(feed_actions::ACKNOWLEDGE)
        .with_field("alarm_id", alarm_id)
        .with_field("timestamp", at.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// Active alarms keyed by id
#[derive(Debug, Clone, Default)]
pub struct AlarmBoard {
    alarms: BTreeMap<String, Alarm>,
}

impl AlarmBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_canned() -> Self {
        let mut board = Self::new();
        for alarm in AlarmEvent::canned() {
            board.alarms.insert(alarm.id.clone(), alarm);
        }
        board
    }

    pub fn apply(&mut self, event: &AlarmEvent) {
        match event {
            AlarmEvent::Created(alarm) | AlarmEvent::Updated(alarm) => {
                self.alarms.insert(alarm.id.clone(), alarm.clone());
            }
            AlarmEvent::Resolved(alarm) => {
                self.alarms.remove(&alarm.id);
            }
            AlarmEvent::Other(frame) => {
                tracing::debug!("Ignoring non-alarm event '{}'", frame.event);
            }
        }
    }

    /// Most severe first, newest first within a severity
    pub fn active(&self) -> Vec<&Alarm> {
        let mut alarms: Vec<&Alarm> = self.alarms.values().collect();
        alarms.sort_by(|a, b| {
            b.severity
                .cmp(&a.severity)
                .then_with(|| b.raised_at.cmp(&a.raised_at))
        });
        alarms
    }

    pub fn len(&self) -> usize {
        self.alarms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alarms.is_empty()
    }
}
