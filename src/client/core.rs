use super::state::{Command, Input, ManagerState};
use super::{ConnectionManagerBuilder, ConnectionOptions, ConnectionState, ConnectionStatus};
use crate::messaging::ConnectionEvent;
use crate::types::{ConnectionError, InboundFrame, Result, StreamError};
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, watch};

/// Owns one logical streaming connection and keeps it alive.
///
/// The manager runs as a background task. This handle only enqueues
/// commands, so [`start`](Self::start), [`send`](Self::send),
/// [`reconnect`](Self::reconnect) and [`stop`](Self::stop) return immediately.
/// Outcomes are pushed through [`watch_status`](Self::watch_status),
/// [`subscribe`](Self::subscribe) and the builder's callbacks.
///
/// The task exits once every clone of the handle is dropped.
///
/// # Example
///
/// ```no_run
/// use alarm_feed::{ConnectionManager, ConnectionOptions, OutboundFrame};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let manager = ConnectionManager::new(
///     "wss://monitor.example.com/alarms",
///     ConnectionOptions {
///         max_attempts: Some(3),
///         base_delay: Some(2000),
///         connect_timeout: Some(5000),
///         ..Default::default()
///     },
/// )?;
///
/// // Queued until the connection opens
/// manager.send(&OutboundFrame::ping())?;
/// manager.start();
///
/// let mut status = manager.watch_status();
/// status.wait_for(|s| s.is_usable()).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ConnectionManager {
    endpoint: String,
    inbox: mpsc::UnboundedSender<Input>,
    status_rx: watch::Receiver<ConnectionStatus>,
    events_tx: broadcast::Sender<ConnectionEvent>,
}

impl ConnectionManager {
    /// Creates a manager for `endpoint` with the default WebSocket transport
    /// and spawns its task. Nothing connects until [`start`](Self::start).
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::UrlParse`] or [`StreamError::InvalidEndpoint`] if
    /// the endpoint is not a `ws://`/`wss://` URL.
    pub fn new(endpoint: impl Into<String>, options: ConnectionOptions) -> Result<Self> {
        ConnectionManagerBuilder::new(endpoint, options).map(|builder| builder.build())
    }

    /// Start configuring a manager (custom connector, callbacks)
    pub fn builder(
        endpoint: impl Into<String>,
        options: ConnectionOptions,
    ) -> Result<ConnectionManagerBuilder> {
        ConnectionManagerBuilder::new(endpoint, options)
    }

    pub(crate) fn from_parts(
        endpoint: String,
        inbox: mpsc::UnboundedSender<Input>,
        status_rx: watch::Receiver<ConnectionStatus>,
        events_tx: broadcast::Sender<ConnectionEvent>,
    ) -> Self {
        Self {
            endpoint,
            inbox,
            status_rx,
            events_tx,
        }
    }

    /// Begin connecting. No-op while already connecting or open.
    pub fn start(&self) {
        self.command(Command::Start);
    }

    /// Serialize `message` and send it, or queue it until the next open.
    ///
    /// Not being connected is never an error. Transmission failures are
    /// reported as [`ConnectionError::SendFailed`] events.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::Serialization`] if `message` cannot be turned
    /// into JSON, or [`StreamError::ManagerClosed`] if the task has exited.
    pub fn send<T: Serialize + ?Sized>(&self, message: &T) -> Result<()> {
        let frame = serde_json::to_string(message)?;
        self.inbox
            .send(Input::Command(Command::Send(frame)))
            .map_err(|_| StreamError::ManagerClosed)
    }

    /// Discard the current connection and any pending retry, reset the backoff
    /// ladder and connect again right away. Queued frames are kept.
    pub fn reconnect(&self) {
        self.command(Command::Reconnect);
    }

    /// Close the connection and suppress automatic reconnection until the next
    /// [`start`](Self::start) or [`reconnect`](Self::reconnect).
    pub fn stop(&self) {
        self.command(Command::Stop);
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn state(&self) -> ConnectionState {
        self.status_rx.borrow().state
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status_rx.borrow().clone()
    }

    /// Checks whether `send` would transmit immediately.
    pub fn is_connected(&self) -> bool {
        self.status_rx.borrow().is_usable()
    }

    pub fn last_error(&self) -> Option<ConnectionError> {
        self.status_rx.borrow().last_error.clone()
    }

    pub fn last_message(&self) -> Option<InboundFrame> {
        self.status_rx.borrow().last_message.clone()
    }

    /// Watch the status snapshot; only changes wake the receiver
    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_rx.clone()
    }

    /// Receive lifecycle events emitted after this call
    pub fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.events_tx.subscribe()
    }

    fn command(&self, command: Command) {
        if let Err(e) = self.inbox.send(Input::Command(command)) {
            tracing::warn!("Connection manager task has exited, dropping {:?}", e.0);
        }
    }
}

/// Manager task: applies inputs one at a time until every handle is dropped.
pub(crate) async fn run(mut machine: ManagerState, mut inbox: mpsc::UnboundedReceiver<Input>) {
    tracing::debug!("Connection manager task started");
    while let Some(input) = inbox.recv().await {
        machine.handle(input);
    }
    machine.shutdown();
    tracing::info!("Connection manager task finished");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::websocket::testing::{Behavior, ScriptedConnector};
    use serde_json::{Value, json};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::time::{Instant, sleep};

    const ENDPOINT: &str = "ws://localhost:9000/alarms";

    fn options(max_attempts: u32, base_delay: u64, connect_timeout: u64) -> ConnectionOptions {
        ConnectionOptions {
            should_reconnect: true,
            max_attempts: Some(max_attempts),
            base_delay: Some(base_delay),
            connect_timeout: Some(connect_timeout),
        }
    }

    fn manager_with(options: ConnectionOptions, connector: &ScriptedConnector) -> ConnectionManager {
        ConnectionManagerBuilder::new(ENDPOINT, options)
            .unwrap()
            .with_connector(connector.clone())
            .build()
    }

    async fn wait_until(
        manager: &ConnectionManager,
        predicate: impl FnMut(&ConnectionStatus) -> bool,
    ) -> ConnectionStatus {
        let mut status = manager.watch_status();
        let snapshot = status.wait_for(predicate).await.unwrap();
        snapshot.clone()
    }

    /// Let the manager task drain its inbox
    async fn settle() {
        sleep(Duration::from_millis(1)).await;
    }

    fn assert_near(actual: Duration, expected_ms: u64) {
        let expected = Duration::from_millis(expected_ms);
        assert!(
            actual >= expected && actual < expected + Duration::from_millis(50),
            "expected ~{}ms, got {:?}",
            expected_ms,
            actual
        );
    }

    fn offsets(connector: &ScriptedConnector, origin: Instant) -> Vec<Duration> {
        connector
            .opened_at()
            .into_iter()
            .map(|at| at.duration_since(origin))
            .collect()
    }

    fn frames(raw: Vec<String>) -> Vec<Value> {
        raw.iter()
            .map(|frame| serde_json::from_str(frame).unwrap())
            .collect()
    }

    fn drain(events: &mut broadcast::Receiver<ConnectionEvent>) -> Vec<ConnectionEvent> {
        let mut seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            seen.push(event);
        }
        seen
    }

    #[tokio::test(start_paused = true)]
    async fn test_pings_sent_while_idle_flush_in_order_on_open() {
        let connector = ScriptedConnector::new(Behavior::Open);
        let manager = manager_with(options(3, 2000, 5000), &connector);

        manager.send(&json!({"action": "ping", "seq": 1})).unwrap();
        manager.send(&json!({"action": "ping", "seq": 2})).unwrap();
        assert_eq!(wait_until(&manager, |s| s.queued == 2).await.state, ConnectionState::Idle);

        manager.start();
        let status = wait_until(&manager, |s| s.is_usable()).await;
        assert_eq!(status.queued, 0);

        manager.send(&json!({"action": "ping", "seq": 3})).unwrap();
        settle().await;

        let sent = frames(connector.sent_frames(0));
        let seqs: Vec<&Value> = sent.iter().map(|frame| &frame["seq"]).collect();
        assert_eq!(seqs, vec![&json!(1), &json!(2), &json!(3)]);
        assert!(sent.iter().all(|frame| frame["action"] == "ping"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_ladder_then_retries_exhausted() {
        let connector = ScriptedConnector::new(Behavior::Hang);
        let manager = manager_with(options(3, 2000, 5000), &connector);

        let origin = Instant::now();
        manager.start();
        let status = wait_until(&manager, |s| s.has_given_up()).await;
        let gave_up_after = origin.elapsed();

        // One initial attempt plus exactly three automatic retries, each
        // waiting base_delay * 2^(k-1) after a 5s timeout.
        let opened = offsets(&connector, origin);
        assert_eq!(opened.len(), 4);
        for (actual, expected) in opened.into_iter().zip([0, 7000, 16000, 29000]) {
            assert_near(actual, expected);
        }
        assert_near(gave_up_after, 34000);

        assert_eq!(status.state, ConnectionState::Closed);
        assert_eq!(status.retry_attempt, 3);
        assert_eq!(
            status.last_error,
            Some(ConnectionError::RetriesExhausted { attempts: 3 })
        );

        // Terminal: nothing else happens on its own
        sleep(Duration::from_secs(600)).await;
        assert_eq!(connector.attempts(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_reconnect_during_backoff_restarts_ladder() {
        let connector = ScriptedConnector::new(Behavior::Hang);
        let manager = manager_with(options(3, 2000, 5000), &connector);

        let origin = Instant::now();
        manager.start();
        // Second failure at 12s; retry 2 is pending for 16s
        wait_until(&manager, |s| {
            s.retry_attempt == 2 && s.state == ConnectionState::Closed
        })
        .await;
        sleep(Duration::from_millis(1000)).await;

        let reconnect_at = origin.elapsed();
        manager.reconnect();
        let status = wait_until(&manager, |s| {
            s.retry_attempt == 0 && s.state == ConnectionState::Connecting
        })
        .await;
        assert_eq!(status.last_error, None);

        // The fresh attempt times out and the ladder starts again at base_delay
        wait_until(&manager, |s| {
            s.retry_attempt == 2 && s.state == ConnectionState::Closed
        })
        .await;

        let opened = offsets(&connector, origin);
        assert_eq!(opened.len(), 4, "stale 16s retry must not have fired");
        assert_near(opened[2], reconnect_at.as_millis() as u64);
        assert_near(opened[3] - opened[2], 7000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_pending_retry() {
        let connector = ScriptedConnector::new(Behavior::Refuse);
        let manager = manager_with(options(5, 1000, 5000), &connector);

        manager.start();
        wait_until(&manager, |s| {
            s.retry_attempt == 1 && s.state == ConnectionState::Closed
        })
        .await;

        manager.stop();
        sleep(Duration::from_secs(60)).await;
        assert_eq!(connector.attempts(), 1);
        assert_eq!(manager.state(), ConnectionState::Closed);

        // An explicit start resumes activity
        manager.start();
        settle().await;
        assert_eq!(connector.attempts(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_closes_open_connection_without_reconnecting() {
        let connector = ScriptedConnector::new(Behavior::Open);
        let manager = manager_with(options(5, 1000, 5000), &connector);
        let mut events = manager.subscribe();

        manager.start();
        wait_until(&manager, |s| s.is_usable()).await;
        manager.stop();
        let status = wait_until(&manager, |s| s.state == ConnectionState::Closed).await;
        assert_eq!(status.last_error, None);

        // Late close from the discarded socket changes nothing
        connector.events(0).closed();
        sleep(Duration::from_secs(60)).await;
        assert_eq!(connector.attempts(), 1);
        assert_eq!(
            drain(&mut events),
            vec![ConnectionEvent::Opened, ConnectionEvent::Closed]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_produces_single_close_cycle() {
        let connector = ScriptedConnector::new(Behavior::Hang);
        let manager = manager_with(options(3, 1000, 500), &connector);
        let mut events = manager.subscribe();

        manager.start();
        wait_until(&manager, |s| s.retry_attempt == 1).await;

        // The timed-out socket reports its own error and close afterwards
        let stale = connector.events(0);
        stale.error("socket hang up");
        stale.closed();
        settle().await;

        let status = manager.status();
        assert_eq!(status.retry_attempt, 1);
        assert_eq!(
            status.last_error,
            Some(ConnectionError::Timeout(Duration::from_millis(500)))
        );
        assert_eq!(connector.attempts(), 1);
        assert_eq!(
            drain(&mut events),
            vec![
                ConnectionEvent::Error(ConnectionError::Timeout(Duration::from_millis(500))),
                ConnectionEvent::Closed,
            ]
        );

        // The single scheduled retry still runs at 500ms + 1000ms
        wait_until(&manager, |s| s.state == ConnectionState::Connecting).await;
        assert_eq!(connector.attempts(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_error_schedules_retry_only_from_close() {
        let connector = ScriptedConnector::new(Behavior::Open);
        let manager = manager_with(options(3, 1000, 5000), &connector);

        manager.start();
        wait_until(&manager, |s| s.is_usable()).await;

        connector.events(0).error("connection reset");
        let status = wait_until(&manager, |s| s.last_error.is_some()).await;
        assert_eq!(status.state, ConnectionState::Open);
        assert_eq!(status.retry_attempt, 0);

        connector.events(0).closed();
        let status = wait_until(&manager, |s| s.state == ConnectionState::Closed).await;
        assert_eq!(status.retry_attempt, 1);
        assert_eq!(
            status.last_error,
            Some(ConnectionError::Transport("connection reset".to_string()))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_message_keeps_connection_open() {
        let connector = ScriptedConnector::new(Behavior::Open);
        let manager = manager_with(options(3, 1000, 5000), &connector);

        manager.start();
        wait_until(&manager, |s| s.is_usable()).await;
        let mut events = manager.subscribe();

        connector.events(0).message("{not json");
        match events.recv().await.unwrap() {
            ConnectionEvent::Error(ConnectionError::MalformedMessage(_)) => {}
            other => panic!("expected malformed message error, got {:?}", other),
        }
        let status = manager.status();
        assert_eq!(status.state, ConnectionState::Open);
        assert_eq!(status.last_error, None);

        connector
            .events(0)
            .message(r#"{"event":"alarm_created","data":{"id":"a1"}}"#);
        let status = wait_until(&manager, |s| s.last_message.is_some()).await;
        assert_eq!(
            status.last_message,
            Some(InboundFrame::new("alarm_created", json!({"id": "a1"})))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_is_idempotent_while_connecting() {
        let connector = ScriptedConnector::new(Behavior::Hang);
        let manager = manager_with(options(3, 1000, 5000), &connector);

        manager.start();
        manager.start();
        settle().await;
        manager.start();
        settle().await;

        assert_eq!(connector.attempts(), 1);
        assert_eq!(manager.state(), ConnectionState::Connecting);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_retry_when_reconnect_disabled() {
        let connector = ScriptedConnector::new(Behavior::Refuse);
        let manager = manager_with(
            ConnectionOptions {
                should_reconnect: false,
                ..options(3, 1000, 5000)
            },
            &connector,
        );

        manager.start();
        let status = wait_until(&manager, |s| s.state == ConnectionState::Closed).await;
        assert_eq!(
            status.last_error,
            Some(ConnectionError::Transport("connection refused".to_string()))
        );

        sleep(Duration::from_secs(60)).await;
        assert_eq!(connector.attempts(), 1);
        assert_eq!(manager.status().retry_attempt, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_successful_open_resets_counter_and_error() {
        let connector = ScriptedConnector::new(Behavior::Open)
            .then(Behavior::Refuse)
            .then(Behavior::Refuse);
        let manager = manager_with(options(3, 100, 5000), &connector);

        manager.start();
        let status = wait_until(&manager, |s| s.is_usable()).await;
        assert_eq!(connector.attempts(), 3);
        assert_eq!(status.retry_attempt, 0);
        assert_eq!(status.last_error, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_after_exhaustion_begins_fresh_ladder() {
        let connector = ScriptedConnector::new(Behavior::Refuse);
        let manager = manager_with(options(1, 100, 5000), &connector);

        manager.start();
        wait_until(&manager, |s| s.has_given_up()).await;
        assert_eq!(connector.attempts(), 2);

        manager.start();
        sleep(Duration::from_secs(10)).await;
        assert_eq!(connector.attempts(), 4);
        assert!(manager.status().has_given_up());
    }

    #[tokio::test(start_paused = true)]
    async fn test_queue_survives_manual_reconnect() {
        let connector = ScriptedConnector::new(Behavior::Hang);
        let manager = manager_with(options(3, 1000, 5000), &connector);

        manager.send(&json!({"action": "acknowledge", "alarm_id": "a1"})).unwrap();
        manager.start();
        settle().await;
        manager.reconnect();
        settle().await;
        assert_eq!(connector.attempts(), 2);

        // The discarded attempt opening late must not receive the queue
        connector.events(0).opened();
        settle().await;
        assert_eq!(manager.state(), ConnectionState::Connecting);

        connector.events(1).opened();
        wait_until(&manager, |s| s.is_usable()).await;
        assert!(connector.sent_frames(0).is_empty());
        assert_eq!(
            frames(connector.sent_frames(1)),
            vec![json!({"action": "acknowledge", "alarm_id": "a1"})]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_failure_is_reported_without_state_change() {
        let connector = ScriptedConnector::new(Behavior::Open);
        let manager = manager_with(options(3, 1000, 5000), &connector);

        manager.start();
        wait_until(&manager, |s| s.is_usable()).await;
        let mut events = manager.subscribe();

        drop(connector.take_outbound(0));
        manager.send(&json!({"action": "ping"})).unwrap();

        match events.recv().await.unwrap() {
            ConnectionEvent::Error(ConnectionError::SendFailed(_)) => {}
            other => panic!("expected send failure, got {:?}", other),
        }
        let status = manager.status();
        assert_eq!(status.state, ConnectionState::Open);
        assert_eq!(status.last_error, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_callbacks_fire_for_lifecycle() {
        let connector = ScriptedConnector::new(Behavior::Open);
        let opened = Arc::new(AtomicUsize::new(0));
        let closed = Arc::new(AtomicUsize::new(0));
        let messages = Arc::new(AtomicUsize::new(0));
        let errors = Arc::new(AtomicUsize::new(0));

        let manager = {
            let (o, c, m, e) = (opened.clone(), closed.clone(), messages.clone(), errors.clone());
            ConnectionManagerBuilder::new(ENDPOINT, options(3, 1000, 5000))
                .unwrap()
                .with_connector(connector.clone())
                .on_open(move || {
                    o.fetch_add(1, Ordering::SeqCst);
                })
                .on_close(move || {
                    c.fetch_add(1, Ordering::SeqCst);
                })
                .on_message(move |_| {
                    m.fetch_add(1, Ordering::SeqCst);
                })
                .on_error(move |_| {
                    e.fetch_add(1, Ordering::SeqCst);
                })
                .build()
        };

        manager.start();
        wait_until(&manager, |s| s.is_usable()).await;
        connector.events(0).message(r#"{"event":"alarm_updated","data":{}}"#);
        connector.events(0).message("garbage");
        manager.stop();
        settle().await;

        assert_eq!(opened.load(Ordering::SeqCst), 1);
        assert_eq!(messages.load(Ordering::SeqCst), 1);
        assert_eq!(errors.load(Ordering::SeqCst), 1);
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_send_rejects_unserializable_payload() {
        let connector = ScriptedConnector::new(Behavior::Hang);
        let manager = manager_with(options(3, 1000, 5000), &connector);

        let mut map = std::collections::HashMap::new();
        map.insert(vec![1u8], "non-string key");
        assert!(matches!(
            manager.send(&map),
            Err(StreamError::Serialization(_))
        ));
    }
}
