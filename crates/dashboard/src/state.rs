//! Dashboard state machine.
//!
//! Two independent pieces of state:
//! - connection: `Connecting -> Connected <-> Disconnected`, driven by the broker
//! - display: `NoData` until a `typing`/`submitted` envelope arrives, back to `NoData` on `reset`
//!
//! Each applied envelope replaces the displayed record wholesale. An envelope whose timestamp is
//! strictly older than the newest one applied so far is ignored, so out-of-order delivery can
//! never regress the view. The newest timestamp is remembered across resets.

use chrono::{DateTime, Local, Utc};
use relay_broker::BrokerEvent;
use relay_core::{SyncEnvelope, SyncStatus};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Connecting,
    Connected,
    Disconnected,
}

impl ConnectionState {
    /// Text of the connection badge.
    pub fn label(self) -> &'static str {
        match self {
            ConnectionState::Connecting => "Connecting...",
            ConnectionState::Connected => "Connected (Live)",
            ConnectionState::Disconnected => "Disconnected",
        }
    }

    pub fn is_live(self) -> bool {
        self == ConnectionState::Connected
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisplayState {
    NoData,
    HasData,
}

/// The envelope on screen and when it arrived.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Snapshot {
    pub envelope: SyncEnvelope,
    pub received_at: DateTime<Local>,
}

/// What applying one broker event did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    ConnectionChanged(ConnectionState),
    /// A `typing` or `submitted` envelope replaced the display.
    Applied(SyncStatus),
    /// A `reset` envelope cleared the display.
    Cleared,
    /// Older than what is already applied.
    IgnoredStale,
    /// Not a valid envelope.
    Rejected,
}

#[derive(Clone, Debug, Default)]
pub struct DashboardState {
    connection: ConnectionState,
    current: Option<Snapshot>,
    newest: Option<DateTime<Utc>>,
}

impl DashboardState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection(&self) -> ConnectionState {
        self.connection
    }

    pub fn display(&self) -> DisplayState {
        match self.current {
            Some(_) => DisplayState::HasData,
            None => DisplayState::NoData,
        }
    }

    pub fn current(&self) -> Option<&Snapshot> {
        self.current.as_ref()
    }

    /// Timestamp of the newest envelope applied this session, including resets.
    pub fn newest_timestamp(&self) -> Option<DateTime<Utc>> {
        self.newest
    }

    /// Applies one broker event. `received_at` becomes the "last updated" time if the event
    /// changes what is displayed.
    pub fn apply(&mut self, event: BrokerEvent, received_at: DateTime<Local>) -> Outcome {
        match event {
            BrokerEvent::Connected => self.set_connection(ConnectionState::Connected),
            BrokerEvent::Disconnected => self.set_connection(ConnectionState::Disconnected),
            BrokerEvent::Message(raw) => match SyncEnvelope::from_json_str(&raw) {
                Ok(envelope) => self.apply_envelope(envelope, received_at),
                Err(e) => {
                    tracing::warn!("ignoring malformed envelope: {e}");
                    Outcome::Rejected
                }
            },
        }
    }

    pub fn apply_envelope(&mut self, envelope: SyncEnvelope, received_at: DateTime<Local>) -> Outcome {
        if let Some(newest) = self.newest {
            if envelope.is_older_than(newest) {
                tracing::warn!(
                    "ignoring stale {} envelope from {} (showing {})",
                    envelope.status,
                    envelope.timestamp,
                    newest
                );
                return Outcome::IgnoredStale;
            }
        }
        self.newest = Some(envelope.timestamp);
        tracing::debug!("applying {} envelope from {}", envelope.status, envelope.timestamp);

        match envelope.status {
            SyncStatus::Reset => {
                self.current = None;
                Outcome::Cleared
            }
            status @ (SyncStatus::Typing | SyncStatus::Submitted) => {
                self.current = Some(Snapshot {
                    envelope,
                    received_at,
                });
                Outcome::Applied(status)
            }
        }
    }

    /// Connection changes never touch what is displayed.
    fn set_connection(&mut self, connection: ConnectionState) -> Outcome {
        self.connection = connection;
        Outcome::ConnectionChanged(connection)
    }
}
