use thiserror::Error;

/// Reasons a payload failed to narrow to a typed protocol message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The payload is not a JSON object.
    #[error("payload is not an object")]
    NotAnObject,

    /// The payload has no string `message` discriminator.
    #[error("payload has no `message` discriminator")]
    MissingTag,

    /// The discriminator is not part of the protocol for this direction.
    #[error("unknown message type: {0}")]
    UnknownTag(String),

    /// The discriminator is known but the fields do not match its shape.
    #[error("invalid {tag} message: {reason}")]
    InvalidShape {
        /// Discriminator of the arm that was validated.
        tag: String,
        /// Description of the first structural mismatch.
        reason: String,
    },

    /// The window-level payload is not the literal `"ready"` string.
    #[error("payload is not the ready signal")]
    NotReady,
}

impl ValidationError {
    pub(crate) fn invalid(tag: &str, reason: impl ToString) -> Self {
        ValidationError::InvalidShape {
            tag: tag.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Errors raised while checking message documents.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The document is not valid JSON.
    #[error("json parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// A message failed validation.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),
}

/// Result type for exercise-protocol operations.
pub type Result<T> = std::result::Result<T, Error>;
