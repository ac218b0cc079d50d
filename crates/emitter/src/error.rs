use relay_core::ValidationErrors;

/// A publish that did not reach the broker.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The relay endpoint answered but reported failure
    #[error("relay rejected envelope ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// The sync task has shut down
    #[error("form sync is closed")]
    Closed,
}

/// Why a submission did not go through.
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    /// The form failed validation; nothing was published.
    #[error(transparent)]
    Invalid(#[from] ValidationErrors),

    #[error("failed to publish submission: {0}")]
    Publish(#[from] PublishError),
}
