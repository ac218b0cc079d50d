//! Error types for the broker adapters.

/// Errors raised while publishing to or subscribing through the broker.
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    /// Transport failure talking to the publish API
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The broker answered the publish request with a non-success status
    #[error("broker rejected publish ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("failed to serialize payload: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// A frame from the broker did not follow the channel protocol
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("invalid signing key")]
    InvalidKey,
}

impl BrokerError {
    pub fn rejected(status: u16, body: impl Into<String>) -> Self {
        Self::Rejected {
            status,
            body: body.into(),
        }
    }
}

/// Type alias for Results that can fail with a [`BrokerError`].
pub type BrokerResult<T> = Result<T, BrokerError>;
