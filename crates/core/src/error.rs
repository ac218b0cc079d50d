#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("missing required configuration: {0}")]
    MissingConfig(&'static str),
    #[error("invalid configuration for {name}: {reason}")]
    InvalidConfig { name: &'static str, reason: String },
    #[error("failed to serialize envelope: {0}")]
    Serialization(serde_json::Error),
    #[error("failed to deserialize envelope: {0}")]
    Deserialization(serde_json::Error),
}

pub type RelayResult<T> = std::result::Result<T, RelayError>;
