//! Messages posted by the host to the guest on the dedicated channel.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::state::IframeState;
use crate::wire::{decode_arm, message_tag};
use crate::ValidationError;

/// Discriminator of [`MessageToIframe::SetLanguage`].
pub const SET_LANGUAGE: &str = "set-language";
/// Discriminator of [`MessageToIframe::SetState`].
pub const SET_STATE: &str = "set-state";
/// Discriminator of [`MessageToIframe::UploadResult`].
pub const UPLOAD_RESULT: &str = "upload-result";

/// Every discriminator the host may send.
pub const TO_IFRAME_TAGS: [&str; 3] = [SET_LANGUAGE, SET_STATE, UPLOAD_RESULT];

/// Host to guest message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "message", rename_all = "kebab-case")]
pub enum MessageToIframe {
    /// Current UI locale.
    SetLanguage(SetLanguageMessage),
    /// State the guest should render.
    SetState(IframeState),
    /// Outcome of an upload the guest asked for.
    UploadResult(UploadResult),
}

/// Body of a `set-language` message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetLanguageMessage {
    /// BCP-47 locale, e.g. `en-US`.
    pub data: String,
}

/// Body of an `upload-result` message.
///
/// On the wire this is `{ success: true, url }` or `{ success: false, error }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawUploadResult", into = "RawUploadResult")]
pub enum UploadResult {
    /// The file is available at `url`.
    Success { url: String },
    /// The upload failed.
    Failure { error: String },
}

#[derive(Serialize, Deserialize)]
struct RawUploadResult {
    success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl TryFrom<RawUploadResult> for UploadResult {
    type Error = String;

    fn try_from(raw: RawUploadResult) -> Result<Self, Self::Error> {
        match (raw.success, raw.url, raw.error) {
            (true, Some(url), _) => Ok(UploadResult::Success { url }),
            (true, None, _) => Err("successful upload result requires url".to_string()),
            (false, _, Some(error)) => Ok(UploadResult::Failure { error }),
            (false, _, None) => Err("failed upload result requires error".to_string()),
        }
    }
}

impl From<UploadResult> for RawUploadResult {
    fn from(result: UploadResult) -> Self {
        match result {
            UploadResult::Success { url } => RawUploadResult {
                success: true,
                url: Some(url),
                error: None,
            },
            UploadResult::Failure { error } => RawUploadResult {
                success: false,
                url: None,
                error: Some(error),
            },
        }
    }
}

impl MessageToIframe {
    /// Build a `set-language` message.
    pub fn set_language(language: impl Into<String>) -> Self {
        MessageToIframe::SetLanguage(SetLanguageMessage {
            data: language.into(),
        })
    }

    /// Build a `set-state` message.
    pub fn set_state(state: IframeState) -> Self {
        MessageToIframe::SetState(state)
    }

    /// Build a successful `upload-result` message.
    pub fn upload_succeeded(url: impl Into<String>) -> Self {
        MessageToIframe::UploadResult(UploadResult::Success { url: url.into() })
    }

    /// Build a failed `upload-result` message.
    pub fn upload_failed(error: impl Into<String>) -> Self {
        MessageToIframe::UploadResult(UploadResult::Failure {
            error: error.into(),
        })
    }

    /// Wire discriminator of the message.
    pub fn tag(&self) -> &'static str {
        match self {
            MessageToIframe::SetLanguage(_) => SET_LANGUAGE,
            MessageToIframe::SetState(_) => SET_STATE,
            MessageToIframe::UploadResult(_) => UPLOAD_RESULT,
        }
    }

    /// Encode the message as its JSON wire shape.
    pub fn to_value(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }
}

/// Narrow an untyped payload to a host to guest message.
///
/// The `message` discriminator selects one arm and only that arm's shape is
/// checked.
pub fn classify_to_iframe(value: &Value) -> Result<MessageToIframe, ValidationError> {
    let tag = message_tag(value)?;
    match tag {
        SET_LANGUAGE => decode_arm(tag, value).map(MessageToIframe::SetLanguage),
        SET_STATE => IframeState::validate(value, tag).map(MessageToIframe::SetState),
        UPLOAD_RESULT => decode_arm(tag, value).map(MessageToIframe::UploadResult),
        other => Err(ValidationError::UnknownTag(other.to_string())),
    }
}

/// Whether a payload is a valid `set-language` message.
pub fn is_set_language_message(value: &Value) -> bool {
    matches!(classify_to_iframe(value), Ok(MessageToIframe::SetLanguage(_)))
}

/// Whether a payload is a valid `set-state` message.
pub fn is_set_state_message(value: &Value) -> bool {
    matches!(classify_to_iframe(value), Ok(MessageToIframe::SetState(_)))
}

/// Whether a payload is a valid `upload-result` message.
pub fn is_upload_result_message(value: &Value) -> bool {
    matches!(classify_to_iframe(value), Ok(MessageToIframe::UploadResult(_)))
}

/// Whether a payload is any valid host to guest message.
pub fn is_message_to_iframe(value: &Value) -> bool {
    classify_to_iframe(value).is_ok()
}
