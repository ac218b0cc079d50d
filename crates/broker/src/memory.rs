//! In-process broker.
//!
//! Implements both [`Broker`] and [`Subscribe`] on top of a `tokio::sync::broadcast` channel, with
//! the same delivery model as the hosted service: subscribers only see what is published while
//! they are bound and connected. The connection can be toggled with
//! [`InMemoryBroker::set_online`] and publishing can be refused with
//! [`InMemoryBroker::set_accepting`], which makes outage paths reproducible.
//!
//! Delivery is decided when a message is published: anything triggered while offline is
//! recorded in the history but never reaches a subscriber, even one that reconnects before it
//! would have been forwarded.

use crate::subscription::{BrokerEvent, Subscription};
use crate::{Broker, BrokerError, BrokerResult, Subscribe};
use async_trait::async_trait;
use parking_lot::Mutex;
use relay_core::Topic;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, oneshot, watch};

const FANOUT_CAPACITY: usize = 256;
const EVENT_BUFFER: usize = 64;
const HISTORY_CAP: usize = 1024;

/// One accepted publish, as recorded by the broker.
#[derive(Clone, Debug, PartialEq)]
pub struct PublishedMessage {
    pub channel: String,
    pub event: String,
    pub payload: serde_json::Value,
}

struct Inner {
    fanout: broadcast::Sender<Arc<PublishedMessage>>,
    online: watch::Sender<bool>,
    accepting: AtomicBool,
    history: Mutex<VecDeque<PublishedMessage>>,
}

#[derive(Clone)]
pub struct InMemoryBroker {
    inner: Arc<Inner>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        let (fanout, _) = broadcast::channel(FANOUT_CAPACITY);
        let (online, _) = watch::channel(true);
        Self {
            inner: Arc::new(Inner {
                fanout,
                online,
                accepting: AtomicBool::new(true),
                history: Mutex::new(VecDeque::new()),
            }),
        }
    }

    /// Connects or disconnects every subscriber. Publishes made while offline still succeed
    /// but are not delivered.
    pub fn set_online(&self, online: bool) {
        self.inner.online.send_replace(online);
    }

    /// When not accepting, [`Broker::trigger`] fails with a 503 rejection.
    pub fn set_accepting(&self, accepting: bool) {
        self.inner.accepting.store(accepting, Ordering::SeqCst);
    }

    /// Publishes accepted so far, oldest first. Only the most recent 1024 are kept.
    pub fn published(&self) -> Vec<PublishedMessage> {
        self.inner.history.lock().iter().cloned().collect()
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.fanout.receiver_count()
    }
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Broker for InMemoryBroker {
    async fn trigger(&self, topic: &Topic, payload: &serde_json::Value) -> BrokerResult<()> {
        if !self.inner.accepting.load(Ordering::SeqCst) {
            return Err(BrokerError::rejected(503, "broker unavailable"));
        }

        let message = PublishedMessage {
            channel: topic.channel().to_owned(),
            event: topic.event().to_owned(),
            payload: payload.clone(),
        };
        {
            let mut history = self.inner.history.lock();
            if history.len() == HISTORY_CAP {
                history.pop_front();
            }
            history.push_back(message.clone());
        }

        if !*self.inner.online.borrow() {
            tracing::debug!(
                "broker offline; {} on {} not delivered",
                message.event,
                message.channel
            );
            return Ok(());
        }
        // No receivers is not an error: nobody is listening right now.
        let _ = self.inner.fanout.send(Arc::new(message));
        Ok(())
    }
}

#[async_trait]
impl Subscribe for InMemoryBroker {
    async fn subscribe(&self, topic: &Topic) -> BrokerResult<Subscription> {
        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        // Bind before returning so nothing published after `subscribe` resolves is missed.
        let fanout = self.inner.fanout.subscribe();
        let online = self.inner.online.subscribe();
        let task = tokio::spawn(forward(
            topic.clone(),
            fanout,
            online,
            events_tx,
            shutdown_rx,
        ));
        Ok(Subscription::new(events_rx, shutdown_tx, task))
    }
}

async fn forward(
    topic: Topic,
    mut fanout: broadcast::Receiver<Arc<PublishedMessage>>,
    mut online: watch::Receiver<bool>,
    events: mpsc::Sender<BrokerEvent>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let mut connected = *online.borrow_and_update();
    if connected && events.send(BrokerEvent::Connected).await.is_err() {
        return;
    }

    loop {
        // Connection changes first: a message is only queued after the state it was published
        // under, so this order keeps `connected` current when the message is read.
        tokio::select! {
            biased;
            _ = &mut shutdown => return,
            changed = online.changed() => {
                if changed.is_err() {
                    return;
                }
                let now = *online.borrow_and_update();
                if now == connected {
                    continue;
                }
                connected = now;
                let event = if now { BrokerEvent::Connected } else { BrokerEvent::Disconnected };
                if events.send(event).await.is_err() {
                    return;
                }
            }
            received = fanout.recv() => match received {
                Ok(message) => {
                    if !connected
                        || message.channel != topic.channel()
                        || message.event != topic.event()
                    {
                        continue;
                    }
                    let data = message.payload.to_string();
                    if events.send(BrokerEvent::Message(data)).await.is_err() {
                        return;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("in-memory subscriber lagged, {skipped} messages dropped");
                }
                Err(RecvError::Closed) => return,
            },
        }
    }
}
