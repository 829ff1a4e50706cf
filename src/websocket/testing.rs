use super::transport::{Connector, TransportEvents, TransportHandle};
use crate::infrastructure::TaskManager;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::time::Instant;

/// How a scripted attempt behaves as soon as it is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Behavior {
    /// Never reports anything; only the connect timeout ends it
    Hang,
    /// Reports open straight away
    Open,
    /// Reports an error followed by close
    Refuse,
}

pub(crate) struct Attempt {
    pub(crate) at: Instant,
    pub(crate) events: TransportEvents,
    pub(crate) outbound: Option<mpsc::UnboundedReceiver<String>>,
}

struct ScriptState {
    script: VecDeque<Behavior>,
    fallback: Behavior,
    attempts: Vec<Attempt>,
}

/// In-memory connector whose attempts follow a script.
#[derive(Clone)]
pub(crate) struct ScriptedConnector {
    inner: Arc<Mutex<ScriptState>>,
}

impl ScriptedConnector {
    pub(crate) fn new(fallback: Behavior) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ScriptState {
                script: VecDeque::new(),
                fallback,
                attempts: Vec::new(),
            })),
        }
    }

    /// Queue a behavior for the next unscripted attempt
    pub(crate) fn then(self, behavior: Behavior) -> Self {
        self.inner.lock().unwrap().script.push_back(behavior);
        self
    }

    pub(crate) fn attempts(&self) -> usize {
        self.inner.lock().unwrap().attempts.len()
    }

    pub(crate) fn opened_at(&self) -> Vec<Instant> {
        self.inner
            .lock()
            .unwrap()
            .attempts
            .iter()
            .map(|attempt| attempt.at)
            .collect()
    }

    pub(crate) fn events(&self, index: usize) -> TransportEvents {
        self.inner.lock().unwrap().attempts[index].events.clone()
    }

    pub(crate) fn take_outbound(&self, index: usize) -> mpsc::UnboundedReceiver<String> {
        self.inner.lock().unwrap().attempts[index]
            .outbound
            .take()
            .expect("outbound receiver already taken")
    }

    /// Drain every frame written to attempt `index` so far
    pub(crate) fn sent_frames(&self, index: usize) -> Vec<String> {
        let mut state = self.inner.lock().unwrap();
        let receiver = state.attempts[index]
            .outbound
            .as_mut()
            .expect("outbound receiver already taken");
        let mut frames = Vec::new();
        while let Ok(frame) = receiver.try_recv() {
            frames.push(frame);
        }
        frames
    }
}

impl Connector for ScriptedConnector {
    fn open(&self, _endpoint: &str, events: TransportEvents) -> TransportHandle {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let mut state = self.inner.lock().unwrap();
        let behavior = state.script.pop_front().unwrap_or(state.fallback);

        match behavior {
            Behavior::Hang => {}
            Behavior::Open => events.opened(),
            Behavior::Refuse => {
                events.error("connection refused");
                events.closed();
            }
        }

        state.attempts.push(Attempt {
            at: Instant::now(),
            events,
            outbound: Some(outbound_rx),
        });

        TransportHandle::new(outbound_tx, TaskManager::new())
    }
}
