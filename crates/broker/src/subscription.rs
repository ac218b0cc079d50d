//! Subscriber-side handle for one channel/event binding.

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// What a subscription reports, in broker-delivery order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BrokerEvent {
    /// Handshake with the broker completed.
    Connected,
    /// The broker connection dropped. Messages published until the next `Connected` are lost.
    Disconnected,
    /// Raw payload of one event on the bound channel, as the JSON text the publisher sent.
    Message(String),
}

/// A live channel binding owning its broker connection.
///
/// Dropping the handle (or calling [`Subscription::close`]) signals the connection task to
/// unsubscribe and disconnect, so no listener outlives the view that created it.
#[derive(Debug)]
pub struct Subscription {
    events: mpsc::Receiver<BrokerEvent>,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn new(
        events: mpsc::Receiver<BrokerEvent>,
        shutdown: oneshot::Sender<()>,
        task: JoinHandle<()>,
    ) -> Self {
        Self {
            events,
            shutdown: Some(shutdown),
            task: Some(task),
        }
    }

    /// Next event, or `None` once the connection task has ended.
    pub async fn next(&mut self) -> Option<BrokerEvent> {
        self.events.recv().await
    }

    pub fn is_closed(&self) -> bool {
        self.shutdown.is_none()
    }

    /// Signals the connection task to unsubscribe. Calling it again is a no-op.
    pub fn close(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        self.events.close();
    }

    /// Closes the subscription and waits for the connection task to finish.
    pub async fn unsubscribe(mut self) {
        self.close();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    tracing::warn!("subscription task ended abnormally: {e}");
                }
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.close();
    }
}
