use crate::client::Input;
use crate::infrastructure::TaskManager;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::SendError;

/// Something a transport reports back to its connection manager.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Opened,
    Message(String),
    Error(String),
    SendFailed(String),
    Closed,
}

/// Opens physical connections on behalf of a `ConnectionManager`.
///
/// `open` must return immediately. The outcome of the attempt (open, frames,
/// errors, close) is reported later through the supplied [`TransportEvents`].
pub trait Connector: Send + Sync + 'static {
    fn open(&self, endpoint: &str, events: TransportEvents) -> TransportHandle;
}

/// Event sink handed to a transport for one connection attempt.
///
/// Every event is tagged with the attempt's generation; the manager ignores
/// events from attempts it has already moved past.
#[derive(Clone)]
pub struct TransportEvents {
    generation: u64,
    inbox: mpsc::WeakUnboundedSender<Input>,
}

impl TransportEvents {
    pub(crate) fn new(generation: u64, inbox: mpsc::WeakUnboundedSender<Input>) -> Self {
        Self { generation, inbox }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn opened(&self) {
        self.emit(TransportEvent::Opened);
    }

    pub fn message(&self, text: impl Into<String>) {
        self.emit(TransportEvent::Message(text.into()));
    }

    pub fn error(&self, description: impl Into<String>) {
        self.emit(TransportEvent::Error(description.into()));
    }

    pub fn send_failed(&self, description: impl Into<String>) {
        self.emit(TransportEvent::SendFailed(description.into()));
    }

    pub fn closed(&self) {
        self.emit(TransportEvent::Closed);
    }

    fn emit(&self, event: TransportEvent) {
        let Some(tx) = self.inbox.upgrade() else {
            tracing::debug!(
                "Connection manager gone, dropping transport event {:?}",
                event
            );
            return;
        };

        if tx
            .send(Input::Transport {
                generation: self.generation,
                event,
            })
            .is_err()
        {
            tracing::debug!("Connection manager inbox closed");
        }
    }
}

/// Live handle on one physical connection.
pub struct TransportHandle {
    outbound: mpsc::UnboundedSender<String>,
    tasks: TaskManager,
}

impl TransportHandle {
    pub fn new(outbound: mpsc::UnboundedSender<String>, tasks: TaskManager) -> Self {
        Self { outbound, tasks }
    }

    /// Hand a serialized frame to the writer; the frame comes back if the
    /// writer has stopped
    pub fn send(&self, frame: String) -> Result<(), SendError<String>> {
        self.outbound.send(frame)
    }

    /// Graceful close: the writer sends a close frame and the tasks wind down
    pub fn close(mut self) {
        self.tasks.detach_all();
        drop(self.outbound);
    }

    /// Forced teardown, used when the attempt never opened or already died
    pub fn abort(mut self) {
        self.tasks.abort_all();
    }
}
