use super::{ConnectionState, ConnectionStatus, RetryPolicy};
use crate::infrastructure::{Backoff, ScheduledTimer};
use crate::messaging::{ConnectionEvent, EventDispatcher};
use crate::types::{ConnectionError, InboundFrame};
use crate::websocket::{Connector, TransportEvent, TransportEvents, TransportHandle};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::SendError;

/// Operations requested through a `ConnectionManager` handle
#[derive(Debug)]
pub(crate) enum Command {
    Start,
    Send(String),
    Reconnect,
    Stop,
}

/// Everything the manager task reacts to, in arrival order
#[derive(Debug)]
pub(crate) enum Input {
    Command(Command),
    Transport {
        generation: u64,
        event: TransportEvent,
    },
    ConnectTimeout {
        generation: u64,
    },
    RetryDue {
        generation: u64,
    },
}

struct LiveTransport {
    generation: u64,
    handle: TransportHandle,
}

/// State machine owned exclusively by the manager task.
///
/// Each attempt gets a fresh generation. Transport events and connect
/// timeouts carrying any other generation, or arriving after the attempt's
/// handle was detached, are ignored.
pub(crate) struct ManagerState {
    endpoint: String,
    policy: RetryPolicy,
    connector: Arc<dyn Connector>,
    inbox: mpsc::WeakUnboundedSender<Input>,
    dispatcher: EventDispatcher,

    state: ConnectionState,
    generation: u64,
    live: Option<LiveTransport>,
    connect_timer: Option<ScheduledTimer>,
    retry_timer: Option<ScheduledTimer>,
    backoff: Backoff,
    queue: VecDeque<String>,
    last_error: Option<ConnectionError>,
    last_message: Option<InboundFrame>,

    /// Set by `stop()`; suppresses automatic reconnection
    was_manual_disconnect: bool,
}

impl ManagerState {
    pub(crate) fn new(
        endpoint: String,
        policy: RetryPolicy,
        connector: Arc<dyn Connector>,
        inbox: mpsc::WeakUnboundedSender<Input>,
        dispatcher: EventDispatcher,
    ) -> Self {
        Self {
            endpoint,
            backoff: policy.backoff(),
            policy,
            connector,
            inbox,
            dispatcher,
            state: ConnectionState::Idle,
            generation: 0,
            live: None,
            connect_timer: None,
            retry_timer: None,
            queue: VecDeque::new(),
            last_error: None,
            last_message: None,
            was_manual_disconnect: false,
        }
    }

    pub(crate) fn handle(&mut self, input: Input) {
        match input {
            Input::Command(Command::Start) => self.start(),
            Input::Command(Command::Send(frame)) => self.send(frame),
            Input::Command(Command::Reconnect) => self.reconnect(),
            Input::Command(Command::Stop) => self.stop(),
            Input::Transport { generation, event } => self.on_transport_event(generation, event),
            Input::ConnectTimeout { generation } => self.on_connect_timeout(generation),
            Input::RetryDue { generation } => self.on_retry_due(generation),
        }
        self.publish();
    }

    /// Tear everything down when the last handle is gone
    pub(crate) fn shutdown(&mut self) {
        self.retry_timer = None;
        self.connect_timer = None;
        if let Some(live) = self.live.take() {
            Self::release(live, self.state == ConnectionState::Open);
        }
        self.state = ConnectionState::Closed;
        self.publish();
    }

    fn start(&mut self) {
        if self.state.is_active() {
            tracing::debug!("start() ignored, connection already {}", self.state);
            return;
        }

        // Mid-backoff the pending retry is simply pulled forward. From rest
        // (idle, stopped, or given up) a fresh ladder begins.
        if self.retry_timer.take().is_none() {
            self.backoff.reset();
        }
        self.was_manual_disconnect = false;
        self.begin_attempt();
    }

    fn send(&mut self, frame: String) {
        if self.state == ConnectionState::Open
            && let Some(live) = &self.live
        {
            tracing::debug!("Sending frame: {}", frame);
            if let Err(SendError(_)) = live.handle.send(frame) {
                self.report(ConnectionError::SendFailed(
                    "transport writer has stopped".to_string(),
                ));
            }
            return;
        }

        self.queue.push_back(frame);
        tracing::debug!(
            "Queued frame while {} ({} waiting)",
            self.state,
            self.queue.len()
        );
    }

    fn reconnect(&mut self) {
        tracing::info!("Manual reconnect requested");
        self.retry_timer = None;
        self.connect_timer = None;

        if let Some(live) = self.live.take() {
            Self::release(live, self.state == ConnectionState::Open);
            self.state = ConnectionState::Closed;
            self.dispatcher.dispatch(ConnectionEvent::Closed);
        }

        self.backoff.reset();
        self.last_error = None;
        self.was_manual_disconnect = false;
        self.begin_attempt();
    }

    fn stop(&mut self) {
        self.retry_timer = None;
        self.connect_timer = None;
        self.was_manual_disconnect = true;

        if let Some(live) = self.live.take() {
            tracing::info!("Disconnecting from {}", self.endpoint);
            let was_open = self.state == ConnectionState::Open;
            self.state = ConnectionState::Closing;
            self.publish();

            Self::release(live, was_open);
            self.state = ConnectionState::Closed;
            self.dispatcher.dispatch(ConnectionEvent::Closed);
            tracing::info!("Disconnected from {}", self.endpoint);
        } else {
            self.state = ConnectionState::Closed;
        }
    }

    fn begin_attempt(&mut self) {
        self.generation += 1;
        let generation = self.generation;
        self.state = ConnectionState::Connecting;
        tracing::info!(
            "Connecting to {} (generation {}, retry {}/{})",
            self.endpoint,
            generation,
            self.backoff.attempts(),
            self.policy.max_attempts
        );
        self.publish();

        let events = TransportEvents::new(generation, self.inbox.clone());
        let handle = self.connector.open(&self.endpoint, events);
        self.live = Some(LiveTransport { generation, handle });

        self.connect_timer = Some(ScheduledTimer::spawn(
            self.policy.connect_timeout,
            generation,
            self.inbox.clone(),
            Input::ConnectTimeout { generation },
        ));
    }

    fn is_live(&self, generation: u64) -> bool {
        self.live
            .as_ref()
            .is_some_and(|live| live.generation == generation)
    }

    fn on_transport_event(&mut self, generation: u64, event: TransportEvent) {
        if !self.is_live(generation) {
            tracing::debug!(
                "Ignoring {:?} from stale attempt {} (current {})",
                event,
                generation,
                self.generation
            );
            return;
        }

        match event {
            TransportEvent::Opened => self.on_open(),
            TransportEvent::Message(text) => self.on_message(&text),
            TransportEvent::Error(description) => {
                tracing::error!("Transport error: {}", description);
                self.report(ConnectionError::Transport(description));
            }
            TransportEvent::SendFailed(description) => {
                self.report(ConnectionError::SendFailed(description));
            }
            TransportEvent::Closed => self.on_close(),
        }
    }

    fn on_open(&mut self) {
        if self.state != ConnectionState::Connecting {
            tracing::debug!("Ignoring open while {}", self.state);
            return;
        }

        self.connect_timer = None;
        self.state = ConnectionState::Open;
        self.backoff.reset();
        self.last_error = None;
        self.flush_queue();
        self.publish();

        tracing::info!("Connected to {}", self.endpoint);
        self.dispatcher.dispatch(ConnectionEvent::Opened);
    }

    /// Deliver queued frames in FIFO order. A frame the writer refuses goes
    /// back to the front of the queue.
    fn flush_queue(&mut self) {
        let Some(live) = &self.live else {
            return;
        };

        let mut flushed = 0usize;
        let mut refused = false;
        while let Some(frame) = self.queue.pop_front() {
            if let Err(SendError(frame)) = live.handle.send(frame) {
                self.queue.push_front(frame);
                refused = true;
                break;
            }
            flushed += 1;
        }

        if flushed > 0 {
            tracing::debug!("Flushed {} queued frames", flushed);
        }
        if refused {
            self.report(ConnectionError::SendFailed(format!(
                "transport writer stopped with {} frames still queued",
                self.queue.len()
            )));
        }
    }

    fn on_message(&mut self, text: &str) {
        match InboundFrame::parse(text) {
            Ok(frame) => {
                tracing::debug!("Received '{}' event", frame.event);
                self.last_message = Some(frame.clone());
                self.publish();
                self.dispatcher.dispatch(ConnectionEvent::Message(frame));
            }
            Err(e) => {
                tracing::error!("Failed to parse message: {} - Raw: {}", e, text);
                self.report(ConnectionError::MalformedMessage(e.to_string()));
            }
        }
    }

    fn on_connect_timeout(&mut self, generation: u64) {
        if !self.is_live(generation) || self.state != ConnectionState::Connecting {
            tracing::debug!("Ignoring stale connect timeout for attempt {}", generation);
            return;
        }

        tracing::warn!(
            "Connection attempt {} timed out after {:?}",
            generation,
            self.policy.connect_timeout
        );
        self.report(ConnectionError::Timeout(self.policy.connect_timeout));
        self.on_close();
    }

    /// Single close path for remote close, transport error and timeout alike
    fn on_close(&mut self) {
        self.connect_timer = None;
        if let Some(live) = self.live.take() {
            live.handle.abort();
        }
        self.state = ConnectionState::Closed;
        tracing::info!("Connection closed (generation {})", self.generation);
        self.dispatcher.dispatch(ConnectionEvent::Closed);

        self.schedule_reconnect();
    }

    fn schedule_reconnect(&mut self) {
        if self.was_manual_disconnect || !self.policy.should_reconnect {
            tracing::info!("Automatic reconnection disabled, staying closed");
            return;
        }

        match self.backoff.next_delay() {
            Some(delay) => {
                tracing::info!(
                    "Scheduling reconnect attempt {}/{} in {:?}",
                    self.backoff.attempts(),
                    self.policy.max_attempts,
                    delay
                );
                self.retry_timer = Some(ScheduledTimer::spawn(
                    delay,
                    self.generation,
                    self.inbox.clone(),
                    Input::RetryDue {
                        generation: self.generation,
                    },
                ));
            }
            None => {
                tracing::warn!(
                    "Giving up after {} reconnect attempts",
                    self.backoff.attempts()
                );
                self.report(ConnectionError::RetriesExhausted {
                    attempts: self.backoff.attempts(),
                });
            }
        }
    }

    fn on_retry_due(&mut self, generation: u64) {
        let current = self
            .retry_timer
            .as_ref()
            .is_some_and(|timer| timer.generation() == generation);
        if !current {
            tracing::debug!("Ignoring stale retry timer for attempt {}", generation);
            return;
        }

        self.retry_timer = None;
        self.begin_attempt();
    }

    /// Detach a transport outside the close path: graceful when it was open,
    /// forced otherwise
    fn release(live: LiveTransport, was_open: bool) {
        if was_open {
            live.handle.close();
        } else {
            live.handle.abort();
        }
    }

    fn report(&mut self, error: ConnectionError) {
        if error.is_connection_level() {
            self.last_error = Some(error.clone());
        }
        self.publish();
        self.dispatcher.dispatch(ConnectionEvent::Error(error));
    }

    fn status(&self) -> ConnectionStatus {
        ConnectionStatus {
            state: self.state,
            last_error: self.last_error.clone(),
            last_message: self.last_message.clone(),
            retry_attempt: self.backoff.attempts(),
            queued: self.queue.len(),
        }
    }

    fn publish(&self) {
        self.dispatcher.publish(self.status());
    }
}
