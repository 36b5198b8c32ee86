//! Messages posted by the guest to the host on the dedicated channel.
//!
//! Guest code is untrusted, so nothing here assumes a payload is well formed:
//! classification returns a typed message or a [`ValidationError`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::wire::{decode_arm, message_tag};
use crate::ValidationError;

/// Discriminator of [`MessageFromIframe::CurrentState`].
pub const CURRENT_STATE: &str = "current-state";
/// Discriminator of [`MessageFromIframe::FileUpload`].
pub const FILE_UPLOAD: &str = "file-upload";
/// Discriminator of [`MessageFromIframe::HeightChanged`].
pub const HEIGHT_CHANGED: &str = "height-changed";

/// Every discriminator the guest may send.
pub const FROM_IFRAME_TAGS: [&str; 3] = [CURRENT_STATE, FILE_UPLOAD, HEIGHT_CHANGED];

/// Guest to host message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "message", rename_all = "kebab-case")]
pub enum MessageFromIframe {
    /// The guest's current answer or editor content.
    CurrentState(CurrentStateMessage),
    /// The guest asks the host to upload a file.
    FileUpload(FileUploadMessage),
    /// The guest's rendered height changed.
    HeightChanged(HeightChangedMessage),
}

/// Body of a `current-state` message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentStateMessage {
    #[serde(default)]
    pub data: Value,
    /// Whether the content is ready to be submitted.
    pub valid: bool,
}

/// Body of a `file-upload` message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileUploadMessage {
    pub url: String,
    #[serde(default)]
    pub data: Value,
}

/// Body of a `height-changed` message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeightChangedMessage {
    /// Rendered content height in pixels.
    pub data: f64,
}

impl HeightChangedMessage {
    /// Value for the iframe `height` attribute.
    pub fn css_height(&self) -> String {
        format!("{}px", self.data)
    }
}

impl MessageFromIframe {
    /// Wire discriminator of the message.
    pub fn tag(&self) -> &'static str {
        match self {
            MessageFromIframe::CurrentState(_) => CURRENT_STATE,
            MessageFromIframe::FileUpload(_) => FILE_UPLOAD,
            MessageFromIframe::HeightChanged(_) => HEIGHT_CHANGED,
        }
    }

    /// Encode the message as its JSON wire shape.
    pub fn to_value(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }
}

/// Narrow an untyped payload to a guest to host message.
pub fn classify_from_iframe(value: &Value) -> Result<MessageFromIframe, ValidationError> {
    let tag = message_tag(value)?;
    match tag {
        CURRENT_STATE => decode_arm(tag, value).map(MessageFromIframe::CurrentState),
        FILE_UPLOAD => decode_arm(tag, value).map(MessageFromIframe::FileUpload),
        HEIGHT_CHANGED => decode_arm(tag, value).map(MessageFromIframe::HeightChanged),
        other => Err(ValidationError::UnknownTag(other.to_string())),
    }
}

/// Whether a payload is a valid `current-state` message.
pub fn is_current_state_message(value: &Value) -> bool {
    matches!(classify_from_iframe(value), Ok(MessageFromIframe::CurrentState(_)))
}

/// Whether a payload is a valid `file-upload` message.
pub fn is_file_upload_message(value: &Value) -> bool {
    matches!(classify_from_iframe(value), Ok(MessageFromIframe::FileUpload(_)))
}

/// Whether a payload is a valid `height-changed` message.
pub fn is_height_changed_message(value: &Value) -> bool {
    matches!(classify_from_iframe(value), Ok(MessageFromIframe::HeightChanged(_)))
}

/// Whether a payload is any valid guest to host message.
pub fn is_message_from_iframe(value: &Value) -> bool {
    classify_from_iframe(value).is_ok()
}
