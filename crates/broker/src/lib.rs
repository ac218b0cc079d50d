//! # Relay Broker
//!
//! Adapters for the hosted publish/subscribe broker that fans envelopes out to dashboards.
//!
//! Two seams are defined here:
//! - [`Broker`]: publish one payload on a topic (used by the relay publish endpoint)
//! - [`Subscribe`]: bind to a topic and receive connection-state changes plus payloads (used by
//!   the dashboard)
//!
//! Implementations:
//! - [`PusherBroker`] / [`PusherSubscriber`]: the hosted Pusher Channels service (or any
//!   protocol-compatible server via `PUSHER_HOST`)
//! - [`InMemoryBroker`]: an in-process fan-out implementing both seams

pub mod error;
pub mod memory;
pub mod rest;
pub mod signing;
pub mod socket;
pub mod subscription;

use async_trait::async_trait;
use relay_core::Topic;

pub use error::{BrokerError, BrokerResult};
pub use memory::{InMemoryBroker, PublishedMessage};
pub use rest::PusherBroker;
pub use socket::{PusherSubscriber, ReconnectPolicy};
pub use subscription::{BrokerEvent, Subscription};

/// Publishing side of the broker.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Publishes `payload` unchanged as one event on `topic`.
    ///
    /// Resolves once the broker has accepted the request. Delivery to subscribers is not
    /// awaited or guaranteed.
    async fn trigger(&self, topic: &Topic, payload: &serde_json::Value) -> BrokerResult<()>;
}

/// Subscribing side of the broker.
#[async_trait]
pub trait Subscribe: Send + Sync {
    /// Binds to `topic`. The returned handle starts in the connecting state; a
    /// [`BrokerEvent::Connected`] arrives once the handshake completes.
    async fn subscribe(&self, topic: &Topic) -> BrokerResult<Subscription>;
}
