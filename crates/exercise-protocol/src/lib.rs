//! # exercise-protocol
//!
//! Message schema for the host page and exercise iframe channel.
//!
//! This crate provides:
//! - Typed host to guest messages (`set-language`, `set-state`, `upload-result`)
//! - Typed guest to host messages (`current-state`, `file-upload`, `height-changed`)
//! - Structural validators that narrow untyped JSON to those types
//! - Window-level handshake literals (`"ready"`, `"communication-port"`)
//! - A fixture checker used by the `exercise-msg-check` binary
//!
//! ## Features
//!
//! - `cli`: builds the `exercise-msg-check` binary
//!
//! ## Example
//!
//! ```ignore
//! use exercise_protocol::{classify_from_iframe, MessageFromIframe};
//!
//! match classify_from_iframe(&payload)? {
//!     MessageFromIframe::HeightChanged(msg) => frame.set_height(&msg.css_height()),
//!     other => consumer(other),
//! }
//! ```

pub mod check;
mod error;
mod from_iframe;
mod state;
mod to_iframe;
pub mod wire;

pub use error::{Error, Result, ValidationError};
pub use from_iframe::{
    classify_from_iframe, is_current_state_message, is_file_upload_message,
    is_height_changed_message, is_message_from_iframe, CurrentStateMessage, FileUploadMessage,
    HeightChangedMessage, MessageFromIframe, CURRENT_STATE, FILE_UPLOAD, FROM_IFRAME_TAGS,
    HEIGHT_CHANGED,
};
pub use state::{
    is_iframe_state, AnswerExerciseData, AnswerExerciseState, ExerciseEditorData,
    ExerciseEditorState, ExerciseTaskSubmission, GradingProgress, GradingResult, IframeState,
    IframeViewType, RepositoryExercise, UserInformation, UserVariablesMap, ViewSubmissionData,
    ViewSubmissionState,
};
pub use to_iframe::{
    classify_to_iframe, is_message_to_iframe, is_set_language_message, is_set_state_message,
    is_upload_result_message, MessageToIframe, SetLanguageMessage, UploadResult, SET_LANGUAGE,
    SET_STATE, TO_IFRAME_TAGS, UPLOAD_RESULT,
};
pub use wire::{
    expect_ready, is_communication_port_message, is_ready_message, COMMUNICATION_PORT_MESSAGE,
    READY_MESSAGE,
};
