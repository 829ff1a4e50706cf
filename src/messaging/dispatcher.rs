use super::{Callbacks, ConnectionEvent};
use crate::client::ConnectionStatus;
use tokio::sync::{broadcast, watch};

/// Pushes connection outputs to every kind of consumer: the status watch,
/// the event broadcast and the registered callbacks.
pub(crate) struct EventDispatcher {
    status_tx: watch::Sender<ConnectionStatus>,
    events_tx: broadcast::Sender<ConnectionEvent>,
    callbacks: Callbacks,
}

impl EventDispatcher {
    pub(crate) fn new(
        status_tx: watch::Sender<ConnectionStatus>,
        events_tx: broadcast::Sender<ConnectionEvent>,
        callbacks: Callbacks,
    ) -> Self {
        Self {
            status_tx,
            events_tx,
            callbacks,
        }
    }

    pub(crate) fn dispatch(&self, event: ConnectionEvent) {
        tracing::debug!("Dispatching {} event", event.as_str());
        self.callbacks.trigger(&event);

        if self.events_tx.send(event).is_err() {
            tracing::trace!("No event subscribers");
        }
    }

    /// Replace the published status, waking watchers only on change
    pub(crate) fn publish(&self, status: ConnectionStatus) {
        self.status_tx.send_if_modified(|current| {
            if *current == status {
                return false;
            }
            *current = status;
            true
        });
    }
}
