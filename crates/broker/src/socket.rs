//! Subscribing through the broker's WebSocket protocol.
//!
//! Connection lifecycle:
//! 1. Connect to `/app/{key}` and wait for `pusher:connection_established` (reported as
//!    [`BrokerEvent::Connected`]), then send `pusher:subscribe` for the channel.
//! 2. Forward every event on the bound channel with the bound event name.
//! 3. Answer `pusher:ping` with `pusher:pong`.
//! 4. On close or error report [`BrokerEvent::Disconnected`] and reconnect after a backoff
//!    delay. Nothing published during the gap is replayed.
//!
//! Error codes 4000-4099 from the broker mean "do not reconnect" (bad key, app disabled, ...);
//! the task ends and the subscription's event stream closes.

use crate::subscription::{BrokerEvent, Subscription};
use crate::{BrokerError, BrokerResult, Subscribe};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use relay_core::{SubscriberConfig, Topic};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

const PROTOCOL_VERSION: u8 = 7;
const CLIENT_NAME: &str = "relay-rs";
const EVENT_BUFFER: usize = 64;

/// Exponential reconnect delays.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub initial: Duration,
    pub max: Duration,
}

impl ReconnectPolicy {
    pub fn next_delay(&self, current: Duration) -> Duration {
        (current * 2).min(self.max)
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(30),
        }
    }
}

/// WebSocket subscriber for the hosted broker.
///
/// Each call to [`Subscribe::subscribe`] opens its own connection owned by the returned
/// [`Subscription`]; there is no process-wide client.
#[derive(Clone, Debug)]
pub struct PusherSubscriber {
    config: SubscriberConfig,
    reconnect: ReconnectPolicy,
}

impl PusherSubscriber {
    pub fn new(config: SubscriberConfig) -> Self {
        Self {
            config,
            reconnect: ReconnectPolicy::default(),
        }
    }

    pub fn with_reconnect_policy(mut self, reconnect: ReconnectPolicy) -> Self {
        self.reconnect = reconnect;
        self
    }

    pub fn socket_url(&self) -> String {
        format!(
            "{}/app/{}?protocol={}&client={}&version={}&flash=false",
            self.config.endpoint().ws_base_url(),
            self.config.key(),
            PROTOCOL_VERSION,
            CLIENT_NAME,
            env!("CARGO_PKG_VERSION"),
        )
    }
}

#[async_trait]
impl Subscribe for PusherSubscriber {
    async fn subscribe(&self, topic: &Topic) -> BrokerResult<Subscription> {
        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(run_connection(
            self.socket_url(),
            topic.clone(),
            self.reconnect,
            events_tx,
            shutdown_rx,
        ));
        Ok(Subscription::new(events_rx, shutdown_tx, task))
    }
}

/// Frames the subscriber understands. Anything else is ignored.
#[derive(Debug, PartialEq)]
pub(crate) enum Frame {
    ConnectionEstablished { socket_id: Option<String> },
    SubscriptionSucceeded { channel: Option<String> },
    Ping,
    Error { code: Option<u16>, message: String },
    Event {
        event: String,
        channel: Option<String>,
        data: String,
    },
}

#[derive(Deserialize)]
struct RawFrame {
    event: String,
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    data: Option<serde_json::Value>,
}

/// The protocol double-encodes `data` as a JSON string; tolerate servers that send an object.
fn data_object(data: &Option<serde_json::Value>) -> serde_json::Value {
    match data {
        Some(serde_json::Value::String(s)) => {
            serde_json::from_str(s).unwrap_or(serde_json::Value::Null)
        }
        Some(other) => other.clone(),
        None => serde_json::Value::Null,
    }
}

pub(crate) fn parse_frame(text: &str) -> BrokerResult<Frame> {
    let raw: RawFrame = serde_json::from_str(text)
        .map_err(|e| BrokerError::Protocol(format!("malformed frame: {e}")))?;

    let frame = match raw.event.as_str() {
        "pusher:connection_established" => Frame::ConnectionEstablished {
            socket_id: data_object(&raw.data)
                .get("socket_id")
                .and_then(|v| v.as_str())
                .map(str::to_owned),
        },
        "pusher_internal:subscription_succeeded" => Frame::SubscriptionSucceeded {
            channel: raw.channel,
        },
        "pusher:ping" => Frame::Ping,
        "pusher:error" => {
            let data = data_object(&raw.data);
            Frame::Error {
                code: data
                    .get("code")
                    .and_then(|v| v.as_u64())
                    .and_then(|c| u16::try_from(c).ok()),
                message: data
                    .get("message")
                    .and_then(|v| v.as_str())
                    .unwrap_or("unknown error")
                    .to_owned(),
            }
        }
        _ => Frame::Event {
            data: match raw.data {
                Some(serde_json::Value::String(s)) => s,
                Some(other) => other.to_string(),
                None => String::new(),
            },
            event: raw.event,
            channel: raw.channel,
        },
    };
    Ok(frame)
}

fn subscribe_frame(channel: &str) -> Message {
    Message::text(json!({ "event": "pusher:subscribe", "data": { "channel": channel } }).to_string())
}

fn unsubscribe_frame(channel: &str) -> Message {
    Message::text(
        json!({ "event": "pusher:unsubscribe", "data": { "channel": channel } }).to_string(),
    )
}

fn pong_frame() -> Message {
    Message::text(json!({ "event": "pusher:pong", "data": {} }).to_string())
}

/// How one connected session ended.
enum SessionEnd {
    /// The subscription was closed or dropped.
    Shutdown,
    /// The connection was lost; `connected` tells whether the handshake had completed.
    Lost { connected: bool, reason: String },
    /// The broker refused us permanently.
    Refused { code: u16, message: String },
}

async fn run_connection(
    url: String,
    topic: Topic,
    reconnect: ReconnectPolicy,
    events: mpsc::Sender<BrokerEvent>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let mut delay = reconnect.initial;

    loop {
        tracing::debug!("connecting to broker for channel {}", topic.channel());
        let attempt = tokio::select! {
            _ = &mut shutdown => return,
            attempt = connect_async(url.as_str()) => attempt,
        };

        match attempt {
            Ok((socket, _)) => match session(socket, &topic, &events, &mut shutdown).await {
                SessionEnd::Shutdown => return,
                SessionEnd::Refused { code, message } => {
                    tracing::error!("broker refused connection ({code}): {message}");
                    let _ = events.send(BrokerEvent::Disconnected).await;
                    return;
                }
                SessionEnd::Lost { connected, reason } => {
                    tracing::warn!("broker connection lost: {reason}");
                    if connected {
                        delay = reconnect.initial;
                        if events.send(BrokerEvent::Disconnected).await.is_err() {
                            return;
                        }
                    }
                }
            },
            Err(e) => tracing::warn!("broker connection failed: {e}"),
        }

        tokio::select! {
            _ = &mut shutdown => return,
            _ = tokio::time::sleep(delay) => {}
        }
        delay = reconnect.next_delay(delay);
    }
}

async fn session(
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
    topic: &Topic,
    events: &mpsc::Sender<BrokerEvent>,
    shutdown: &mut oneshot::Receiver<()>,
) -> SessionEnd {
    let (mut sink, mut stream) = socket.split();
    let mut connected = false;

    let lost = |connected: bool, reason: String| SessionEnd::Lost { connected, reason };

    loop {
        let incoming = tokio::select! {
            _ = &mut *shutdown => {
                if connected {
                    let _ = sink.send(unsubscribe_frame(topic.channel())).await;
                }
                let _ = sink.send(Message::Close(None)).await;
                return SessionEnd::Shutdown;
            }
            incoming = stream.next() => incoming,
        };

        let text = match incoming {
            Some(Ok(Message::Text(text))) => text,
            Some(Ok(Message::Close(frame))) => {
                let reason = frame
                    .map(|f| format!("closed by broker ({}): {}", u16::from(f.code), &*f.reason))
                    .unwrap_or_else(|| "closed by broker".into());
                return lost(connected, reason);
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => return lost(connected, BrokerError::from(e).to_string()),
            None => return lost(connected, "stream ended".into()),
        };

        let frame = match parse_frame(text.as_str()) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!("ignoring broker frame: {e}");
                continue;
            }
        };

        match frame {
            Frame::ConnectionEstablished { socket_id } => {
                tracing::info!(
                    "connected to broker (socket {})",
                    socket_id.as_deref().unwrap_or("?")
                );
                connected = true;
                if events.send(BrokerEvent::Connected).await.is_err() {
                    return SessionEnd::Shutdown;
                }
                if let Err(e) = sink.send(subscribe_frame(topic.channel())).await {
                    return lost(connected, BrokerError::from(e).to_string());
                }
            }
            Frame::SubscriptionSucceeded { channel } => {
                tracing::debug!("subscribed to {}", channel.as_deref().unwrap_or("?"));
            }
            Frame::Ping => {
                if let Err(e) = sink.send(pong_frame()).await {
                    return lost(connected, BrokerError::from(e).to_string());
                }
            }
            Frame::Error { code, message } => match code {
                Some(code) if (4000..4100).contains(&code) => {
                    return SessionEnd::Refused { code, message };
                }
                _ => tracing::warn!("broker error {:?}: {message}", code),
            },
            Frame::Event {
                event,
                channel,
                data,
            } => {
                if event == topic.event() && channel.as_deref() == Some(topic.channel()) {
                    // Never wait on the consumer here: pings must keep being answered.
                    match events.try_send(BrokerEvent::Message(data)) {
                        Ok(()) => {}
                        Err(mpsc::error::TrySendError::Full(_)) => {
                            tracing::warn!(
                                "subscriber not keeping up; dropped an event on {}",
                                topic.channel()
                            );
                        }
                        Err(mpsc::error::TrySendError::Closed(_)) => return SessionEnd::Shutdown,
                    }
                } else {
                    tracing::debug!("ignoring event {event} on {channel:?}");
                }
            }
        }
    }
}
