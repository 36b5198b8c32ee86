use thiserror::Error;

/// Failures of the browser messaging primitives.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// A message channel could not be allocated.
    #[error("message channel unavailable: {0}")]
    ChannelUnavailable(String),

    /// A post on a window or port was rejected.
    #[error("post failed: {0}")]
    PostFailed(String),
}

/// Errors that can occur in exercise-iframe operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Messaging error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Configuration values are inconsistent.
    #[error("invalid config: {0}")]
    Config(String),

    /// Configuration is not valid TOML.
    #[error("toml parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    /// JSON (de)serialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for exercise-iframe operations.
pub type Result<T> = std::result::Result<T, Error>;
