//! Offline checking of message fixtures.
//!
//! A document is either a single message or a JSON array of messages. Each
//! entry is classified on its own, so one bad entry does not hide the rest.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use log::debug;
use serde_json::Value;

use crate::from_iframe::{classify_from_iframe, MessageFromIframe};
use crate::to_iframe::{classify_to_iframe, MessageToIframe};
use crate::wire::{is_communication_port_message, is_ready_message};
use crate::{Result, ValidationError};

/// Which side of the channel the checked messages travel on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    /// Host to guest.
    ToIframe,
    /// Guest to host.
    FromIframe,
    /// Either channel direction, or a window-level literal.
    #[default]
    Auto,
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "to-iframe" => Ok(Direction::ToIframe),
            "from-iframe" => Ok(Direction::FromIframe),
            "auto" => Ok(Direction::Auto),
            other => Err(format!(
                "unknown direction `{}` (expected to-iframe, from-iframe or auto)",
                other
            )),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Direction::ToIframe => "to-iframe",
            Direction::FromIframe => "from-iframe",
            Direction::Auto => "auto",
        };
        f.write_str(name)
    }
}

/// A successfully classified entry.
#[derive(Debug, Clone, PartialEq)]
pub enum Classified {
    ToIframe(MessageToIframe),
    FromIframe(MessageFromIframe),
    /// The window-level `"ready"` literal.
    Ready,
    /// The window-level `"communication-port"` literal.
    CommunicationPort,
}

impl Classified {
    /// Short label used in reports.
    pub fn label(&self) -> String {
        match self {
            Classified::ToIframe(message) => format!("to-iframe {}", message.tag()),
            Classified::FromIframe(message) => format!("from-iframe {}", message.tag()),
            Classified::Ready => "window ready".to_string(),
            Classified::CommunicationPort => "window communication-port".to_string(),
        }
    }
}

/// Classify one payload in the given direction.
///
/// In [`Direction::Auto`] the window literals are tried first, then the
/// message tag decides the channel direction.
pub fn classify(value: &Value, direction: Direction) -> std::result::Result<Classified, ValidationError> {
    match direction {
        Direction::ToIframe => classify_to_iframe(value).map(Classified::ToIframe),
        Direction::FromIframe => classify_from_iframe(value).map(Classified::FromIframe),
        Direction::Auto => {
            if is_ready_message(value) {
                return Ok(Classified::Ready);
            }
            if is_communication_port_message(value) {
                return Ok(Classified::CommunicationPort);
            }
            match classify_to_iframe(value) {
                Err(ValidationError::UnknownTag(_)) => {
                    classify_from_iframe(value).map(Classified::FromIframe)
                }
                other => other.map(Classified::ToIframe),
            }
        }
    }
}

/// Outcome for one entry of a document.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckedEntry {
    /// Position in the document; 0 for a single-message document.
    pub index: usize,
    pub outcome: std::result::Result<Classified, ValidationError>,
}

/// Outcome for a whole document.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CheckReport {
    pub entries: Vec<CheckedEntry>,
}

impl CheckReport {
    /// True when every entry classified.
    pub fn is_valid(&self) -> bool {
        self.invalid_count() == 0
    }

    /// Number of entries that failed validation.
    pub fn invalid_count(&self) -> usize {
        self.entries.iter().filter(|e| e.outcome.is_err()).count()
    }
}

/// Check a JSON document held in memory.
pub fn check_document(text: &str, direction: Direction) -> Result<CheckReport> {
    let document: Value = serde_json::from_str(text)?;
    let values = match document {
        Value::Array(items) => items,
        single => vec![single],
    };
    debug!("checking {} entries as {}", values.len(), direction);

    let entries = values
        .iter()
        .enumerate()
        .map(|(index, value)| CheckedEntry {
            index,
            outcome: classify(value, direction),
        })
        .collect();
    Ok(CheckReport { entries })
}

/// Check a JSON document on disk.
pub fn check_file(path: impl AsRef<Path>, direction: Direction) -> Result<CheckReport> {
    let text = std::fs::read_to_string(path.as_ref())?;
    check_document(&text, direction)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn auto_picks_direction_from_tag() {
        let to = classify(&json!({ "message": "set-language", "data": "en" }), Direction::Auto);
        assert!(matches!(to, Ok(Classified::ToIframe(_))));

        let from = classify(&json!({ "message": "height-changed", "data": 1 }), Direction::Auto);
        assert!(matches!(from, Ok(Classified::FromIframe(_))));

        assert_eq!(classify(&json!("ready"), Direction::Auto), Ok(Classified::Ready));
    }

    #[test]
    fn auto_keeps_shape_errors_of_known_tags() {
        let err = classify(&json!({ "message": "set-language" }), Direction::Auto).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidShape { ref tag, .. } if tag == "set-language"));
    }

    #[test]
    fn direction_parses_cli_names() {
        assert_eq!("from-iframe".parse::<Direction>(), Ok(Direction::FromIframe));
        assert!("sideways".parse::<Direction>().is_err());
    }
}
