//! Where envelopes are sent.

use crate::PublishError;
use api_shared::SyncRes;
use async_trait::async_trait;
use relay_core::SyncEnvelope;
use std::time::Duration;

/// Default timeout for publish requests.
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Destination for envelopes leaving the form.
#[async_trait]
pub trait Publisher: Send + Sync + 'static {
    /// Sends one envelope and waits for the relay's acknowledgement.
    async fn publish(&self, envelope: &SyncEnvelope) -> Result<(), PublishError>;
}

/// Posts envelopes as JSON to the relay publish endpoint.
#[derive(Clone, Debug)]
pub struct HttpPublisher {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpPublisher {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, PublishError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Publisher for HttpPublisher {
    async fn publish(&self, envelope: &SyncEnvelope) -> Result<(), PublishError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(envelope)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        // A body that is not a SyncRes still tells us something: pass it through as the message.
        let ack = serde_json::from_str::<SyncRes>(&text).ok();

        match ack {
            Some(SyncRes { success: true, .. }) if status.is_success() => Ok(()),
            Some(SyncRes { error, .. }) => Err(PublishError::Rejected {
                status: status.as_u16(),
                message: error.unwrap_or_else(|| status.to_string()),
            }),
            None => Err(PublishError::Rejected {
                status: status.as_u16(),
                message: if text.is_empty() { status.to_string() } else { text },
            }),
        }
    }
}
