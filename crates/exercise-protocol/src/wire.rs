//! Literal values exchanged on the window-level bridge.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::ValidationError;

/// Sent by the guest on the window bridge once it can receive its port.
pub const READY_MESSAGE: &str = "ready";

/// Sent by the host together with the transferred port.
pub const COMMUNICATION_PORT_MESSAGE: &str = "communication-port";

/// Origin reported for documents sandboxed without `allow-same-origin`.
pub const SANDBOXED_ORIGIN: &str = "null";

/// Target origin used for the port hand-off; the guest origin is opaque.
pub const ANY_TARGET_ORIGIN: &str = "*";

/// Sandbox attribute applied to exercise iframes.
pub const IFRAME_SANDBOX: &str = "allow-scripts allow-forms allow-downloads";

/// Additional sandbox token allowed in development builds only.
pub const SANDBOX_ALLOW_SAME_ORIGIN: &str = "allow-same-origin";

/// Translation key rendered when the iframe has no URL.
pub const MISSING_URL_KEY: &str = "error-cannot-render-dynamic-content-missing-url";

/// Check that a window-level payload is exactly the `"ready"` string.
///
/// Objects such as `{"message": "ready"}` are rejected.
pub fn expect_ready(value: &Value) -> Result<(), ValidationError> {
    match value.as_str() {
        Some(READY_MESSAGE) => Ok(()),
        _ => Err(ValidationError::NotReady),
    }
}

/// Whether a window-level payload is the `"ready"` signal.
pub fn is_ready_message(value: &Value) -> bool {
    expect_ready(value).is_ok()
}

/// Whether a window-level payload announces the transferred port.
pub fn is_communication_port_message(value: &Value) -> bool {
    value.as_str() == Some(COMMUNICATION_PORT_MESSAGE)
}

/// Decode one arm of a tagged union, reporting mismatches against `tag`.
pub(crate) fn decode_arm<T: DeserializeOwned>(tag: &str, value: &Value) -> Result<T, ValidationError> {
    T::deserialize(value).map_err(|e| ValidationError::invalid(tag, e))
}

/// Read the string discriminator of a channel message.
pub(crate) fn message_tag(value: &Value) -> Result<&str, ValidationError> {
    let object = value.as_object().ok_or(ValidationError::NotAnObject)?;
    object
        .get("message")
        .and_then(Value::as_str)
        .ok_or(ValidationError::MissingTag)
}
